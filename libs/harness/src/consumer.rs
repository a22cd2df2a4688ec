use std::time::Duration;

use bench_api::entity::{decode_entity, decode_entity_set, latency_between};
use bench_api::{BenchError, Message, TopicMode};
use chrono::NaiveTime;

/// Превращает входящие message'и в latency entity set'ов.
pub trait UnitConsumer {
    /// `Some(latency)`, когда message закрыл entity set.
    fn consume(&mut self, message: &Message, received_at: NaiveTime)
    -> Result<Option<Duration>, BenchError>;

    /// Сбросить незаконченную группу.
    fn reset(&mut self);
}

/// Один message = один set; latency от timestamp первой entity.
#[derive(Default)]
pub struct SingleTopicConsumer;

impl UnitConsumer for SingleTopicConsumer {
    fn consume(
        &mut self,
        message: &Message,
        received_at: NaiveTime,
    ) -> Result<Option<Duration>, BenchError> {
        let set = decode_entity_set(&message.payload)?;
        Ok(Some(latency_between(set.sent_at()?, received_at)))
    }

    fn reset(&mut self) {}
}

/// Группирует `entities_in_set` подряд идущих entity в один set.
///
/// Latency группы: приём последней entity минус отправка первой. Границы
/// групп не сверяются с set'ами publisher'а, это приближение.
pub struct SubTopicConsumer {
    entities_in_set: usize,
    first_sent: Option<NaiveTime>,
    received: usize,
}

impl SubTopicConsumer {
    pub fn new(entities_in_set: usize) -> Self {
        Self { entities_in_set, first_sent: None, received: 0 }
    }
}

impl UnitConsumer for SubTopicConsumer {
    fn consume(
        &mut self,
        message: &Message,
        received_at: NaiveTime,
    ) -> Result<Option<Duration>, BenchError> {
        let sent = decode_entity(&message.payload)?.sent_at()?;
        let first = *self.first_sent.get_or_insert(sent);
        self.received += 1;

        if self.received < self.entities_in_set {
            return Ok(None);
        }
        self.reset();
        Ok(Some(latency_between(first, received_at)))
    }

    fn reset(&mut self) {
        self.first_sent = None;
        self.received = 0;
    }
}

pub fn consumer_for(mode: TopicMode, entities_in_set: usize) -> Box<dyn UnitConsumer> {
    match mode {
        TopicMode::Single => Box::new(SingleTopicConsumer),
        TopicMode::Sub => Box::new(SubTopicConsumer::new(entities_in_set)),
    }
}

#[cfg(test)]
mod tests {
    use bench_api::EntitySize;
    use bench_api::entity::{encode_entity, encode_entity_set, format_timestamp};
    use bench_api::topic::{SINGLE_TOPIC, sub_topic};

    use super::*;

    fn at(ms: u32) -> NaiveTime {
        NaiveTime::from_hms_milli_opt(12, 0, 0, ms).unwrap()
    }

    #[test]
    fn single_topic_latency_per_message() {
        let payload = encode_entity_set(4, EntitySize::Large, &format_timestamp(at(100)));
        let message = Message::new(SINGLE_TOPIC, payload);

        let mut consumer = SingleTopicConsumer;
        let latency = consumer.consume(&message, at(103)).unwrap();
        assert_eq!(latency, Some(Duration::from_millis(3)));
    }

    #[test]
    fn sub_topic_groups_entities_into_sets() {
        let mut consumer = SubTopicConsumer::new(3);
        let entity = |id: u16, sent: u32| {
            Message::new(
                sub_topic(id),
                encode_entity(u32::from(id), EntitySize::Small, &format_timestamp(at(sent))),
            )
        };

        assert_eq!(consumer.consume(&entity(1, 10), at(11)).unwrap(), None);
        assert_eq!(consumer.consume(&entity(2, 12), at(13)).unwrap(), None);
        // last receive minus first send
        assert_eq!(
            consumer.consume(&entity(3, 14), at(20)).unwrap(),
            Some(Duration::from_millis(10))
        );

        // next group starts fresh
        assert_eq!(consumer.consume(&entity(1, 30), at(31)).unwrap(), None);
        consumer.reset();
        assert_eq!(consumer.consume(&entity(1, 40), at(41)).unwrap(), None);
        assert_eq!(consumer.consume(&entity(2, 40), at(42)).unwrap(), None);
        assert_eq!(
            consumer.consume(&entity(3, 40), at(45)).unwrap(),
            Some(Duration::from_millis(5))
        );
    }

    #[test]
    fn undecodable_payload_is_codec_error() {
        let mut consumer = consumer_for(TopicMode::Single, 10);
        let err = consumer
            .consume(&Message::new(SINGLE_TOPIC, vec![0xff, 0xff]), at(0))
            .unwrap_err();
        assert_eq!(err.kind(), bench_api::ErrorKind::Codec);
    }
}
