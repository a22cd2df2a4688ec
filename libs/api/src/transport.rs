use std::time::Duration;

use crate::error::BenchError;

// ════════════════════════════════════════════════════════════════
//  Wire units
// ════════════════════════════════════════════════════════════════

/// Multipart-сообщение из двух фреймов: topic + payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(topic: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self { topic: topic.into(), payload: payload.into() }
    }

    /// Собрать из multipart-фреймов. Ровно два фрейма, иначе ошибка.
    pub fn from_frames(frames: Vec<Vec<u8>>) -> Result<Self, BenchError> {
        let count = frames.len();
        let mut it = frames.into_iter();
        match (it.next(), it.next(), it.next()) {
            (Some(topic), Some(payload), None) => Ok(Self { topic, payload }),
            _ => Err(BenchError::codec(format!("expected 2 frames (topic, payload), got {count}"))),
        }
    }
}

/// Уведомление о (от)подписке, которое XPUB отдаёт наверх:
/// первый байт: флаг (1 = subscribe, 0 = unsubscribe), дальше prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Subscribe(Vec<u8>),
    Unsubscribe(Vec<u8>),
}

impl SubscriptionEvent {
    /// None для пустого фрейма (нет даже флага).
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let (&flag, prefix) = frame.split_first()?;
        Some(if flag == 1 {
            SubscriptionEvent::Subscribe(prefix.to_vec())
        } else {
            SubscriptionEvent::Unsubscribe(prefix.to_vec())
        })
    }

    pub fn prefix(&self) -> &[u8] {
        match self {
            SubscriptionEvent::Subscribe(p) | SubscriptionEvent::Unsubscribe(p) => p,
        }
    }
}

/// Какие стороны broker'а готовы к чтению после poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub frontend: bool,
    pub backend: bool,
}

// ════════════════════════════════════════════════════════════════
//  Socket traits
// ════════════════════════════════════════════════════════════════

/// Сторона publisher'а: отправка `(topic, payload)`.
pub trait PublishSocket {
    fn send(&mut self, topic: &[u8], payload: &[u8]) -> Result<(), BenchError>;
}

/// Сторона subscriber'а: неблокирующее чтение + ожидание готовности.
pub trait SubscribeSocket {
    /// `Ok(None)`: сейчас ничего нет (would block), это не ошибка.
    fn try_recv(&mut self) -> Result<Option<Message>, BenchError>;

    /// Ждать входящее сообщение не дольше `timeout`. `true`, если есть что читать.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, BenchError>;
}

/// Пара сокетов broker'а: frontend (от publisher'ов) и backend (к subscriber'ам).
pub trait BrokerSockets {
    /// Ждать готовности любой из сторон не дольше `timeout`.
    fn poll(&mut self, timeout: Duration) -> Result<Readiness, BenchError>;

    /// Одно publish-сообщение с frontend. `Ok(None)`: would block.
    fn recv_publish(&mut self) -> Result<Option<Message>, BenchError>;

    /// Один сырой фрейм (от)подписки с backend. `Ok(None)`: would block.
    fn recv_subscription(&mut self) -> Result<Option<Vec<u8>>, BenchError>;

    /// Отправить `(topic, payload)` подписчикам через backend.
    fn forward(&mut self, topic: &[u8], payload: &[u8]) -> Result<(), BenchError>;
}
