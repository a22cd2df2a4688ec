use std::time::Duration;

use chrono::{Local, NaiveTime};
use prost::Message;

use crate::config::EntitySize;
use crate::error::BenchError;

// ════════════════════════════════════════════════════════════════
//  Wire messages
// ════════════════════════════════════════════════════════════════

/// Entity на проводе: id, время отправки, padding до целевого размера.
#[derive(Clone, PartialEq, Message)]
pub struct Entity {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// Время отправки (time of day), см. [`TIMESTAMP_FORMAT`].
    #[prost(bytes = "vec", tag = "2")]
    pub timestamp: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub padding: Vec<u8>,
}

/// Entity set single-topic режима.
#[derive(Clone, PartialEq, Message)]
pub struct EntitySet {
    #[prost(message, repeated, tag = "1")]
    pub entities: Vec<Entity>,
}

// ════════════════════════════════════════════════════════════════
//  Timestamps
// ════════════════════════════════════════════════════════════════

/// `HH:MM:SS.ffffff`, 15 байт.
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.6f";

const TIMESTAMP_PARSE_FORMAT: &str = "%H:%M:%S%.f";

const MICROS_PER_DAY: i64 = 86_400 * 1_000_000;

pub fn format_timestamp(time: NaiveTime) -> Vec<u8> {
    time.format(TIMESTAMP_FORMAT).to_string().into_bytes()
}

/// Текущее локальное время в wire-формате.
pub fn timestamp_now() -> Vec<u8> {
    format_timestamp(Local::now().time())
}

pub fn parse_timestamp(raw: &[u8]) -> Result<NaiveTime, BenchError> {
    let text = std::str::from_utf8(raw)?;
    Ok(NaiveTime::parse_from_str(text, TIMESTAMP_PARSE_FORMAT)?)
}

/// Задержка между отправкой и получением.
///
/// Timestamps несут только время суток, поэтому разница берётся по
/// модулю суток: отправка в 23:59:59 и приём в 00:00:01 дают 2 s.
pub fn latency_between(sent: NaiveTime, received: NaiveTime) -> Duration {
    let micros = received
        .signed_duration_since(sent)
        .num_microseconds()
        .unwrap_or(0)
        .rem_euclid(MICROS_PER_DAY);
    Duration::from_micros(micros as u64)
}

// ════════════════════════════════════════════════════════════════
//  Encode / decode
// ════════════════════════════════════════════════════════════════

impl Entity {
    pub fn new(id: u32, size: EntitySize, timestamp: &[u8]) -> Self {
        Self {
            id,
            timestamp: timestamp.to_vec(),
            padding: vec![0; size.padding_bytes()],
        }
    }

    pub fn sent_at(&self) -> Result<NaiveTime, BenchError> {
        parse_timestamp(&self.timestamp)
    }
}

impl EntitySet {
    /// Время отправки set'а: timestamp первой entity.
    pub fn sent_at(&self) -> Result<NaiveTime, BenchError> {
        self.entities
            .first()
            .ok_or_else(|| BenchError::codec("entity set is empty"))?
            .sent_at()
    }
}

pub fn encode_entity(id: u32, size: EntitySize, timestamp: &[u8]) -> Vec<u8> {
    Entity::new(id, size, timestamp).encode_to_vec()
}

/// Set из `count` entity с id `1..=count` и общим timestamp.
pub fn encode_entity_set(count: usize, size: EntitySize, timestamp: &[u8]) -> Vec<u8> {
    let entities = (1..=count as u32)
        .map(|id| Entity::new(id, size, timestamp))
        .collect();
    EntitySet { entities }.encode_to_vec()
}

pub fn decode_entity(payload: &[u8]) -> Result<Entity, BenchError> {
    Ok(Entity::decode(payload)?)
}

pub fn decode_entity_set(payload: &[u8]) -> Result<EntitySet, BenchError> {
    Ok(EntitySet::decode(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(h: u32, m: u32, s: u32, us: u32) -> NaiveTime {
        NaiveTime::from_hms_micro_opt(h, m, s, us).unwrap()
    }

    #[test]
    fn timestamp_is_fifteen_bytes_and_parses_back() {
        let t = ts(9, 5, 7, 42);
        let raw = format_timestamp(t);
        assert_eq!(raw, b"09:05:07.000042");
        assert_eq!(parse_timestamp(&raw).unwrap(), t);
        assert_eq!(timestamp_now().len(), 15);
    }

    #[test]
    fn bad_timestamp_is_codec_error() {
        let err = parse_timestamp(b"not a time").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Codec);
    }

    #[test]
    fn latency_wraps_midnight() {
        assert_eq!(
            latency_between(ts(12, 0, 0, 0), ts(12, 0, 0, 1_500)),
            Duration::from_micros(1_500)
        );
        assert_eq!(
            latency_between(ts(23, 59, 59, 0), ts(0, 0, 1, 0)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn entity_wire_sizes() {
        let raw = format_timestamp(ts(1, 2, 3, 4));
        assert_eq!(encode_entity(1, EntitySize::Small, &raw).len(), 61);
        assert_eq!(encode_entity(1, EntitySize::Large, &raw).len(), 509);
        // nested framing: +2 bytes per small entity, +3 per large
        assert_eq!(encode_entity_set(100, EntitySize::Small, &raw).len(), 100 * (61 + 2));
        assert_eq!(encode_entity_set(100, EntitySize::Large, &raw).len(), 100 * (509 + 3));
    }

    #[test]
    fn entity_set_carries_ids_and_first_timestamp() {
        let t = ts(10, 11, 12, 13);
        let payload = encode_entity_set(3, EntitySize::Small, &format_timestamp(t));
        let set = decode_entity_set(&payload).unwrap();
        let ids: Vec<u32> = set.entities.iter().map(|e| e.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(set.sent_at().unwrap(), t);

        let empty = EntitySet::default();
        assert!(empty.sent_at().is_err());
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        assert!(decode_entity(&[0xff, 0xff, 0xff]).is_err());
    }
}
