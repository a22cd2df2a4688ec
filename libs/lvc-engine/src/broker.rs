use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use bench_api::{BenchError, BrokerSockets, Message, SubscriptionEvent};

use crate::cache::LastValueCache;
use crate::error::BrokerError;

/// Верхняя граница событий с одной стороны за проход в режиме `Exhaust`:
/// вторая сторона обслуживается на каждом проходе даже под постоянным потоком.
pub const EXHAUST_LIMIT: usize = 4096;

// ═══════════════════════════════════════════════════════════════
//  Options
// ═══════════════════════════════════════════════════════════════

/// Сколько событий забирать с готовой стороны за один проход poll-loop'а.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Bounded round-robin with periodic poll: одно событие с каждой
    /// готовой стороны, затем снова poll.
    #[default]
    OnePerPass,
    /// Выбирать сторону до would-block (не больше [`EXHAUST_LIMIT`]).
    Exhaust,
}

impl DrainPolicy {
    fn budget(self) -> usize {
        match self {
            DrainPolicy::OnePerPass => 1,
            DrainPolicy::Exhaust => EXHAUST_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BrokerOptions {
    /// Максимальное ожидание в poll между проверками отмены.
    pub poll_interval: Duration,
    pub drain: DrainPolicy,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            drain: DrainPolicy::OnePerPass,
        }
    }
}

/// Счётчики broker'а, логируются при остановке.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub published: u64,
    pub forwarded: u64,
    pub subscribes: u64,
    pub unsubscribes: u64,
    pub replayed: u64,
    pub errors: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Broker
// ═══════════════════════════════════════════════════════════════

/// LVC broker: пересылает publish'и подписчикам и при каждой подписке
/// отдаёт подписчику последние значения всех topic'ов под её prefix.
///
/// Cache принадлежит только loop'у broker'а, блокировки не нужны.
pub struct Broker<S> {
    sockets: S,
    cache: LastValueCache,
    options: BrokerOptions,
    stats: BrokerStats,
}

impl<S: BrokerSockets> Broker<S> {
    pub fn new(sockets: S, options: BrokerOptions) -> Self {
        Self {
            sockets,
            cache: LastValueCache::new(),
            options,
            stats: BrokerStats::default(),
        }
    }

    pub fn cache(&self) -> &LastValueCache {
        &self.cache
    }

    pub fn stats(&self) -> BrokerStats {
        self.stats
    }

    pub fn sockets(&self) -> &S {
        &self.sockets
    }

    /// Publish: `cache[topic] = payload`, затем forward всем подписчикам.
    /// Forward не повторяется при ошибке; cache обновлён в любом случае.
    pub fn on_publish(&mut self, message: Message) -> Result<(), BenchError> {
        let Message { topic, payload } = message;
        self.stats.published += 1;
        let stored = self.cache.store(topic.clone(), payload);
        self.sockets.forward(&topic, stored)?;
        self.stats.forwarded += 1;
        Ok(())
    }

    /// Событие (от)подписки. На subscribe отдаёт все совпавшие по prefix
    /// записи cache'а, на unsubscribe ничего не делает.
    /// Возвращает количество отправленных replay-сообщений.
    pub fn on_subscription_event(&mut self, frame: &[u8]) -> Result<usize, BenchError> {
        let Some(event) = SubscriptionEvent::parse(frame) else {
            tracing::warn!("empty subscription frame, ignoring");
            return Ok(0);
        };

        let prefix = match event {
            SubscriptionEvent::Subscribe(prefix) => prefix,
            SubscriptionEvent::Unsubscribe(prefix) => {
                self.stats.unsubscribes += 1;
                tracing::debug!(prefix = %String::from_utf8_lossy(&prefix), "unsubscribe");
                return Ok(0);
            }
        };
        self.stats.subscribes += 1;

        let mut sent = 0;
        for (topic, payload) in self.cache.matching(&prefix) {
            self.sockets.forward(topic, payload)?;
            sent += 1;
            self.stats.replayed += 1;
        }
        tracing::debug!(
            prefix = %String::from_utf8_lossy(&prefix),
            replayed = sent,
            "subscribe"
        );
        Ok(sent)
    }

    /// Один проход loop'а: poll обеих сторон, затем обработка готовых.
    pub fn poll_once(&mut self) -> Result<(), BrokerError> {
        let ready = match self.sockets.poll(self.options.poll_interval) {
            Ok(ready) => ready,
            Err(e) => {
                self.handle_error("poll", e)?;
                return Ok(());
            }
        };

        if ready.frontend {
            self.drain_frontend()?;
        }
        if ready.backend {
            self.drain_backend()?;
        }
        Ok(())
    }

    /// Крутить poll-loop до отмены `token`. Отмена проверяется между
    /// проходами, то есть не реже чем раз в `poll_interval`.
    ///
    /// Сокеты освобождаются вместе с broker'ом по выходу.
    pub fn run(mut self, token: &CancellationToken) -> Result<BrokerStats, BrokerError> {
        tracing::info!(
            poll_ms = self.options.poll_interval.as_millis() as u64,
            drain = ?self.options.drain,
            "broker loop started"
        );
        while !token.is_cancelled() {
            self.poll_once()?;
        }
        tracing::info!(
            published = self.stats.published,
            forwarded = self.stats.forwarded,
            subscribes = self.stats.subscribes,
            unsubscribes = self.stats.unsubscribes,
            replayed = self.stats.replayed,
            errors = self.stats.errors,
            cached_topics = self.cache.len(),
            "broker loop stopped"
        );
        Ok(self.stats)
    }

    fn drain_frontend(&mut self) -> Result<(), BrokerError> {
        for _ in 0..self.options.drain.budget() {
            match self.sockets.recv_publish() {
                Ok(Some(message)) => {
                    if let Err(e) = self.on_publish(message) {
                        self.handle_error("forward", e)?;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.handle_error("frontend recv", e)?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn drain_backend(&mut self) -> Result<(), BrokerError> {
        for _ in 0..self.options.drain.budget() {
            match self.sockets.recv_subscription() {
                Ok(Some(frame)) => {
                    if let Err(e) = self.on_subscription_event(&frame) {
                        self.handle_error("replay", e)?;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.handle_error("backend recv", e)?;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Закрытый транспорт фатален, остальное логируется и loop продолжается.
    fn handle_error(&mut self, stage: &'static str, e: BenchError) -> Result<(), BrokerError> {
        if e.is_closed() {
            return Err(BrokerError::Closed(e));
        }
        self.stats.errors += 1;
        tracing::error!(stage, error = ?e, "transport error, continuing");
        Ok(())
    }
}
