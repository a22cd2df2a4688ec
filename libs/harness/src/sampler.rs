use std::time::{Duration, Instant};

use bench_api::{ErrorKind, RunConfig, SubscribeSocket, TopicMode};
use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::consumer::{UnitConsumer, consumer_for};
use crate::error::HarnessError;

/// Максимальный шаг ожидания: между шагами проверяется отмена.
pub const POLL_SLICE: Duration = Duration::from_millis(100);

/// Итог попытки получить следующий entity set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReceiveOutcome {
    Delivered(Duration),
    /// Тишина дольше timeout'а с последнего принятого entity.
    Stalled,
    Cancelled,
}

/// Результат одной итерации subscriber'а.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberIteration {
    /// Номер итерации, с 1.
    pub iteration: usize,
    pub avg_latency_ms: f64,
    pub entity_sets_received: usize,
    pub delta_ms: f64,
    pub throughput_sets_per_s: f64,
    pub throughput_kbps: f64,
    /// Latency каждого set'а итерации в порядке приёма.
    pub latencies_ms: Vec<f64>,
}

/// Принимает трафик итерациями по `iteration_entity_sets` set'ов.
///
/// Прогон заканчивается, когда поток замолкает дольше timeout'а; данные
/// недобранной итерации отбрасываются.
pub struct LatencySampler {
    config: RunConfig,
    mode: TopicMode,
    consumer: Box<dyn UnitConsumer>,
    results: Vec<SubscriberIteration>,
}

impl LatencySampler {
    pub fn new(config: RunConfig, mode: TopicMode) -> Self {
        let consumer = consumer_for(mode, config.entities_in_set);
        Self { config, mode, consumer, results: Vec::new() }
    }

    pub fn results(&self) -> &[SubscriberIteration] {
        &self.results
    }

    pub fn into_results(self) -> Vec<SubscriberIteration> {
        self.results
    }

    pub fn listen(
        &mut self,
        socket: &mut dyn SubscribeSocket,
        token: &CancellationToken,
    ) -> Result<(), HarnessError> {
        let sets = self.config.iteration_entity_sets;

        loop {
            if !self.await_traffic(socket, token)? {
                break;
            }

            let start = Instant::now();
            let mut latencies = Vec::with_capacity(sets);
            while latencies.len() < sets {
                match self.receive_unit(socket, token)? {
                    ReceiveOutcome::Delivered(latency) => {
                        latencies.push(latency.as_secs_f64() * 1_000.0)
                    }
                    ReceiveOutcome::Stalled => {
                        if !latencies.is_empty() {
                            tracing::info!(
                                received = latencies.len(),
                                expected = sets,
                                "stream stalled, dropping partial iteration"
                            );
                        }
                        return Ok(());
                    }
                    ReceiveOutcome::Cancelled => return Ok(()),
                }
            }

            let result = self.summarize(latencies, start.elapsed());
            tracing::info!(
                iteration = result.iteration,
                avg_latency_ms = result.avg_latency_ms,
                sets_per_s = result.throughput_sets_per_s,
                "iteration received"
            );
            self.results.push(result);
        }
        Ok(())
    }

    /// Ждёт первый message итерации не дольше timeout'а.
    fn await_traffic(
        &mut self,
        socket: &mut dyn SubscribeSocket,
        token: &CancellationToken,
    ) -> Result<bool, HarnessError> {
        let timeout = self.config.timeout();
        let start = Instant::now();
        loop {
            if token.is_cancelled() {
                return Ok(false);
            }
            let waited = start.elapsed();
            if waited >= timeout {
                tracing::info!(iterations = self.results.len(), ?timeout, "no traffic, listen finished");
                return Ok(false);
            }
            if socket.wait_readable((timeout - waited).min(POLL_SLICE))? {
                return Ok(true);
            }
        }
    }

    /// Следующий entity set. Таймер тишины перезапускает только принятая
    /// entity; битые message'и пропускаются и таймер не трогают.
    pub fn receive_unit(
        &mut self,
        socket: &mut dyn SubscribeSocket,
        token: &CancellationToken,
    ) -> Result<ReceiveOutcome, HarnessError> {
        let timeout = self.config.timeout();
        let mut last_accepted = Instant::now();

        loop {
            if token.is_cancelled() {
                return Ok(ReceiveOutcome::Cancelled);
            }

            match socket.try_recv() {
                Ok(Some(message)) => {
                    let received_at = Local::now().time();
                    match self.consumer.consume(&message, received_at) {
                        Ok(Some(latency)) => return Ok(ReceiveOutcome::Delivered(latency)),
                        Ok(None) => {
                            last_accepted = Instant::now();
                            continue;
                        }
                        Err(e) => tracing::warn!(
                            topic = %String::from_utf8_lossy(&message.topic),
                            error = %e,
                            "skipping undecodable message"
                        ),
                    }
                }
                Ok(None) => {
                    let idle = last_accepted.elapsed();
                    if idle >= timeout {
                        self.consumer.reset();
                        return Ok(ReceiveOutcome::Stalled);
                    }
                    socket.wait_readable((timeout - idle).min(POLL_SLICE))?;
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Codec => {
                    tracing::warn!(error = %e, "skipping malformed message")
                }
                Err(e) => return Err(e.into()),
            }

            if last_accepted.elapsed() >= timeout {
                self.consumer.reset();
                return Ok(ReceiveOutcome::Stalled);
            }
        }
    }

    fn summarize(&self, latencies_ms: Vec<f64>, delta: Duration) -> SubscriberIteration {
        let received = latencies_ms.len();
        let avg_latency_ms = if received == 0 {
            0.0
        } else {
            latencies_ms.iter().sum::<f64>() / received as f64
        };
        let delta_us = (delta.as_secs_f64() * 1_000_000.0).max(1.0);
        let set_bytes = self.config.entity_set_bytes(self.mode) as f64;

        SubscriberIteration {
            iteration: self.results.len() + 1,
            avg_latency_ms,
            entity_sets_received: received,
            delta_ms: delta_us / 1_000.0,
            throughput_sets_per_s: received as f64 / (delta_us / 1_000_000.0),
            throughput_kbps: received as f64 * set_bytes / (delta_us / 1_000.0),
            latencies_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use bench_api::entity::{encode_entity, encode_entity_set, timestamp_now};
    use bench_api::topic::{SINGLE_TOPIC, sub_topic};
    use bench_api::{BenchError, EntitySize, Message};

    use super::*;

    /// Очередь готовых message'ей; пустая очередь выжидает весь timeout.
    #[derive(Default)]
    struct Scripted {
        queue: VecDeque<Message>,
        waits: usize,
    }

    impl SubscribeSocket for Scripted {
        fn try_recv(&mut self) -> Result<Option<Message>, BenchError> {
            Ok(self.queue.pop_front())
        }

        fn wait_readable(&mut self, timeout: Duration) -> Result<bool, BenchError> {
            self.waits += 1;
            if self.queue.is_empty() {
                std::thread::sleep(timeout);
            }
            Ok(!self.queue.is_empty())
        }
    }

    fn config(entities: usize, sets: usize) -> RunConfig {
        RunConfig {
            entities_in_set: entities,
            iteration_entity_sets: sets,
            entity_size: EntitySize::Small,
            timeout_ms: 30,
            ..Default::default()
        }
    }

    fn single_sets(count: usize) -> VecDeque<Message> {
        (0..count)
            .map(|_| {
                Message::new(SINGLE_TOPIC, encode_entity_set(2, EntitySize::Small, &timestamp_now()))
            })
            .collect()
    }

    #[test]
    fn stall_ends_run_with_completed_iterations_only() {
        let mut socket = Scripted { queue: single_sets(7), ..Default::default() };
        let mut sampler = LatencySampler::new(config(2, 3), TopicMode::Single);

        sampler.listen(&mut socket, &CancellationToken::new()).unwrap();

        let results = sampler.results();
        assert_eq!(results.len(), 2);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.iteration, i + 1);
            assert_eq!(r.entity_sets_received, 3);
            assert_eq!(r.latencies_ms.len(), 3);
            assert!(r.avg_latency_ms >= 0.0);
            assert!(r.throughput_sets_per_s > 0.0);
        }
        assert!(socket.queue.is_empty());
    }

    #[test]
    fn silent_stream_yields_no_iterations() {
        let mut socket = Scripted::default();
        let mut sampler = LatencySampler::new(config(2, 3), TopicMode::Single);

        let start = Instant::now();
        sampler.listen(&mut socket, &CancellationToken::new()).unwrap();

        assert!(sampler.results().is_empty());
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(socket.waits >= 1);
    }

    #[test]
    fn sub_topic_entities_are_grouped_per_iteration() {
        let queue = (0..2 * 4)
            .flat_map(|_| {
                (1..=4u16).map(|id| {
                    Message::new(
                        sub_topic(id),
                        encode_entity(u32::from(id), EntitySize::Small, &timestamp_now()),
                    )
                })
            })
            .collect();
        let mut socket = Scripted { queue, ..Default::default() };
        let mut sampler = LatencySampler::new(config(4, 4), TopicMode::Sub);

        sampler.listen(&mut socket, &CancellationToken::new()).unwrap();

        let results = sampler.into_results();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.entity_sets_received == 4));
    }

    #[test]
    fn garbage_is_skipped_not_counted() {
        let mut queue = single_sets(2);
        queue.insert(1, Message::new(SINGLE_TOPIC, vec![0xff, 0xff]));
        let mut socket = Scripted { queue, ..Default::default() };
        let mut sampler = LatencySampler::new(config(2, 2), TopicMode::Single);

        sampler.listen(&mut socket, &CancellationToken::new()).unwrap();

        assert_eq!(sampler.results().len(), 1);
        assert_eq!(sampler.results()[0].entity_sets_received, 2);
    }

    #[test]
    fn malformed_frames_are_skipped() {
        /// Первые `broken` чтений отдают message с неверным числом фреймов.
        struct Misframed {
            broken: usize,
            inner: Scripted,
        }

        impl SubscribeSocket for Misframed {
            fn try_recv(&mut self) -> Result<Option<Message>, BenchError> {
                if self.broken > 0 {
                    self.broken -= 1;
                    return Message::from_frames(vec![b"x".to_vec()]).map(Some);
                }
                self.inner.try_recv()
            }

            fn wait_readable(&mut self, timeout: Duration) -> Result<bool, BenchError> {
                self.inner.wait_readable(timeout)
            }
        }

        let mut socket = Misframed {
            broken: 3,
            inner: Scripted { queue: single_sets(2), ..Default::default() },
        };
        let mut sampler = LatencySampler::new(config(2, 2), TopicMode::Single);

        sampler.listen(&mut socket, &CancellationToken::new()).unwrap();

        assert_eq!(socket.broken, 0);
        assert_eq!(sampler.results().len(), 1);
        assert_eq!(sampler.results()[0].entity_sets_received, 2);
    }

    #[test]
    fn steady_garbage_does_not_hold_off_stall() {
        /// Мусор каждые 2 ms, после `until` тишина.
        struct Flood {
            until: Instant,
            reads: usize,
        }

        impl SubscribeSocket for Flood {
            fn try_recv(&mut self) -> Result<Option<Message>, BenchError> {
                if Instant::now() >= self.until {
                    return Ok(None);
                }
                std::thread::sleep(Duration::from_millis(2));
                self.reads += 1;
                if self.reads % 2 == 0 {
                    Message::from_frames(Vec::new()).map(Some)
                } else {
                    Ok(Some(Message::new(SINGLE_TOPIC, vec![0xff, 0xff])))
                }
            }

            fn wait_readable(&mut self, timeout: Duration) -> Result<bool, BenchError> {
                if Instant::now() >= self.until {
                    std::thread::sleep(timeout);
                    return Ok(false);
                }
                Ok(true)
            }
        }

        let mut socket = Flood { until: Instant::now() + Duration::from_secs(2), reads: 0 };
        let mut sampler = LatencySampler::new(config(2, 3), TopicMode::Single);

        let start = Instant::now();
        sampler.listen(&mut socket, &CancellationToken::new()).unwrap();

        assert!(sampler.results().is_empty());
        assert!(socket.reads > 1);
        assert!(start.elapsed() < Duration::from_millis(500), "{:?}", start.elapsed());
    }

    #[test]
    fn slow_iteration_within_gap_timeout_completes() {
        /// Отдаёт по одному message'у не чаще раза в `gap`.
        struct Trickle {
            queue: VecDeque<Message>,
            gap: Duration,
            next_at: Instant,
        }

        impl SubscribeSocket for Trickle {
            fn try_recv(&mut self) -> Result<Option<Message>, BenchError> {
                let now = Instant::now();
                if now < self.next_at {
                    return Ok(None);
                }
                let message = self.queue.pop_front();
                if message.is_some() {
                    self.next_at = now + self.gap;
                }
                Ok(message)
            }

            fn wait_readable(&mut self, timeout: Duration) -> Result<bool, BenchError> {
                if self.queue.is_empty() {
                    std::thread::sleep(timeout);
                    return Ok(false);
                }
                let until_next = self.next_at.saturating_duration_since(Instant::now());
                std::thread::sleep(until_next.min(timeout));
                Ok(until_next <= timeout)
            }
        }

        let mut socket = Trickle {
            queue: single_sets(12),
            gap: Duration::from_millis(10),
            next_at: Instant::now(),
        };
        let mut cfg = config(2, 12);
        cfg.timeout_ms = 60;
        let mut sampler = LatencySampler::new(cfg, TopicMode::Single);

        sampler.listen(&mut socket, &CancellationToken::new()).unwrap();

        let results = sampler.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_sets_received, 12);
        // whole iteration outlasts the timeout, no single gap does
        assert!(results[0].delta_ms > 60.0, "{}", results[0].delta_ms);
    }

    #[test]
    fn cancelled_listen_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let mut socket = Scripted { queue: single_sets(3), ..Default::default() };
        let mut sampler = LatencySampler::new(config(2, 3), TopicMode::Single);

        sampler.listen(&mut socket, &token).unwrap();
        assert!(sampler.results().is_empty());
        assert_eq!(socket.queue.len(), 3);
    }

    #[test]
    fn summary_math() {
        let sampler = LatencySampler::new(config(100, 4), TopicMode::Single);
        let r = sampler.summarize(vec![1.0, 2.0, 3.0, 6.0], Duration::from_millis(2));

        let set_bytes = (6 + 100 * 64 + 100 * 2) as f64;
        assert_eq!(r.avg_latency_ms, 3.0);
        assert!((r.delta_ms - 2.0).abs() < 1e-9);
        assert!((r.throughput_sets_per_s - 2_000.0).abs() < 1e-6);
        assert!((r.throughput_kbps - 4.0 * set_bytes / 2.0).abs() < 1e-6);

        let empty = sampler.summarize(Vec::new(), Duration::from_millis(2));
        assert_eq!(empty.avg_latency_ms, 0.0);
    }
}
