use crate::config::{EntitySize, TopicMode};

// ════════════════════════════════════════════════════════════════
//  Topics
// ════════════════════════════════════════════════════════════════

/// Единственный topic single-topic режима.
pub const SINGLE_TOPIC: &[u8] = b"entity";

/// Prefix sub-topic режима; за ним следует 2-байтовый LE индекс entity.
pub const SUB_TOPIC_PREFIX: &[u8] = b"ent.";

/// Длина индекса entity в sub-topic.
pub const SUB_TOPIC_INDEX_BYTES: usize = 2;

/// Topic entity с индексом `index`: prefix + index (little-endian).
pub fn sub_topic(index: u16) -> Vec<u8> {
    let mut topic = Vec::with_capacity(SUB_TOPIC_PREFIX.len() + SUB_TOPIC_INDEX_BYTES);
    topic.extend_from_slice(SUB_TOPIC_PREFIX);
    topic.extend_from_slice(&index.to_le_bytes());
    topic
}

/// Обратное к [`sub_topic`]. None, если topic не из sub-topic пространства.
pub fn sub_topic_index(topic: &[u8]) -> Option<u16> {
    let index = topic.strip_prefix(SUB_TOPIC_PREFIX)?;
    let bytes: [u8; SUB_TOPIC_INDEX_BYTES] = index.try_into().ok()?;
    Some(u16::from_le_bytes(bytes))
}

/// Ожидаемый размер одного entity set на проводе, в байтах.
///
/// Single: topic + N entity + N байт framing'а вложенных сообщений.
/// Sub: N сообщений, каждое со своим topic (prefix + индекс).
pub fn entity_set_bytes(mode: TopicMode, size: EntitySize, entities_in_set: usize) -> usize {
    match mode {
        TopicMode::Single => {
            SINGLE_TOPIC.len()
                + entities_in_set * size.wire_bytes()
                + entities_in_set * size.framing_overhead()
        }
        TopicMode::Sub => {
            let topic_bytes = SUB_TOPIC_PREFIX.len() + SUB_TOPIC_INDEX_BYTES;
            (topic_bytes + size.wire_bytes()) * entities_in_set
        }
    }
}
