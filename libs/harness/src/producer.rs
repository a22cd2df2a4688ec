use bench_api::entity::{encode_entity, encode_entity_set, timestamp_now};
use bench_api::topic::{SINGLE_TOPIC, sub_topic};
use bench_api::{BenchError, EntitySize, PublishSocket, RunConfig, TopicMode};

/// Стратегия emit'а одного paced unit'а (одного entity set'а).
pub trait UnitProducer {
    fn produce_unit(&mut self, socket: &mut dyn PublishSocket) -> Result<(), BenchError>;
}

/// Один message на topic `entity` со всем set'ом и общим timestamp.
pub struct SingleTopicProducer {
    entities_in_set: usize,
    size: EntitySize,
}

impl SingleTopicProducer {
    pub fn new(entities_in_set: usize, size: EntitySize) -> Self {
        Self { entities_in_set, size }
    }
}

impl UnitProducer for SingleTopicProducer {
    fn produce_unit(&mut self, socket: &mut dyn PublishSocket) -> Result<(), BenchError> {
        let payload = encode_entity_set(self.entities_in_set, self.size, &timestamp_now());
        socket.send(SINGLE_TOPIC, &payload)
    }
}

/// Burst из `entities_in_set` message'ей, по одному на sub-topic.
///
/// Topics строятся один раз; timestamp у каждой entity свой.
pub struct SubTopicProducer {
    topics: Vec<Vec<u8>>,
    size: EntitySize,
}

impl SubTopicProducer {
    pub fn new(entities_in_set: u16, size: EntitySize) -> Self {
        Self {
            topics: (1..=entities_in_set).map(sub_topic).collect(),
            size,
        }
    }
}

impl UnitProducer for SubTopicProducer {
    fn produce_unit(&mut self, socket: &mut dyn PublishSocket) -> Result<(), BenchError> {
        for (id, topic) in (1u32..).zip(&self.topics) {
            let payload = encode_entity(id, self.size, &timestamp_now());
            socket.send(topic, &payload)?;
        }
        Ok(())
    }
}

pub fn producer_for(mode: TopicMode, config: &RunConfig) -> Result<Box<dyn UnitProducer>, BenchError> {
    Ok(match mode {
        TopicMode::Single => Box::new(SingleTopicProducer::new(
            config.entities_in_set,
            config.entity_size,
        )),
        TopicMode::Sub => {
            let n = u16::try_from(config.entities_in_set).map_err(|_| {
                BenchError::config("entities_in_set must fit a 2-byte sub-topic index")
            })?;
            Box::new(SubTopicProducer::new(n, config.entity_size))
        }
    })
}
