use bench_api::{PublishSocket, RunConfig, TopicMode};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::HarnessError;
use crate::pacing::Pacer;
use crate::producer::{UnitProducer, producer_for};

// ═══════════════════════════════════════════════════════════════
//  Results
// ═══════════════════════════════════════════════════════════════

/// Результат одной итерации publisher'а.
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherIteration {
    /// Номер итерации, с 1.
    pub iteration: usize,
    pub duration_ms: f64,
    pub entity_sets_sent: usize,
    pub programmed_frequency: f64,
    pub actual_frequency: f64,
    pub programmed_throughput_kbps: f64,
    pub actual_throughput_kbps: f64,
    /// Дрейф pacing'а на конец итерации, µs.
    pub drift_us: f64,
}

impl PublisherIteration {
    /// actual / programmed throughput.
    pub fn throughput_ratio(&self) -> f64 {
        self.actual_throughput_kbps / self.programmed_throughput_kbps
    }
}

// ═══════════════════════════════════════════════════════════════
//  PacedPublisher
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Idle,
    Open,
    Iterating,
    Closed,
}

/// Публикует итерации по `iteration_entity_sets` unit'ов, поднимая частоту
/// на `frequency_step` после каждой, пока канал держит нагрузку.
pub struct PacedPublisher {
    config: RunConfig,
    mode: TopicMode,
    state: PublisherState,
    results: Vec<PublisherIteration>,
}

impl PacedPublisher {
    pub fn new(config: RunConfig, mode: TopicMode) -> Self {
        Self {
            config,
            mode,
            state: PublisherState::Idle,
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn results(&self) -> &[PublisherIteration] {
        &self.results
    }

    pub fn into_results(self) -> Vec<PublisherIteration> {
        self.results
    }

    /// Прогон до падения throughput ratio ниже cutoff или до отмены.
    ///
    /// Отмена прерывает текущую итерацию между unit'ами; завершённые
    /// итерации остаются в `results`. Ошибка транспорта фатальна.
    pub fn run(
        &mut self,
        socket: &mut dyn PublishSocket,
        clock: &dyn Clock,
        token: &CancellationToken,
    ) -> Result<(), HarnessError> {
        self.state = PublisherState::Open;
        let outcome = self.ramp(socket, clock, token);
        self.state = PublisherState::Closed;
        outcome
    }

    fn ramp(
        &mut self,
        socket: &mut dyn PublishSocket,
        clock: &dyn Clock,
        token: &CancellationToken,
    ) -> Result<(), HarnessError> {
        let mut producer = producer_for(self.mode, &self.config)?;
        let mut frequency = self.config.frequency;
        let mut ratio = 1.0;

        // first iteration always runs, even with cutoff 1.0
        loop {
            clock.pause(self.config.iteration_pause());
            if token.is_cancelled() {
                break;
            }

            self.state = PublisherState::Iterating;
            let Some(result) = self.iterate(producer.as_mut(), socket, clock, token, frequency)?
            else {
                tracing::info!(iteration = self.results.len() + 1, "publisher cancelled mid-iteration");
                break;
            };

            ratio = result.throughput_ratio();
            tracing::info!(
                iteration = result.iteration,
                frequency = result.programmed_frequency,
                actual_frequency = result.actual_frequency,
                ratio,
                drift_us = result.drift_us,
                "iteration published"
            );
            self.results.push(result);
            frequency += self.config.frequency_step;

            if ratio <= self.config.throughput_ratio_cutoff {
                break;
            }
        }

        tracing::info!(iterations = self.results.len(), last_ratio = ratio, "publisher finished");
        Ok(())
    }

    /// `None`: итерацию прервала отмена.
    fn iterate(
        &self,
        producer: &mut dyn UnitProducer,
        socket: &mut dyn PublishSocket,
        clock: &dyn Clock,
        token: &CancellationToken,
        frequency: f64,
    ) -> Result<Option<PublisherIteration>, HarnessError> {
        let sets = self.config.iteration_entity_sets;
        let mut pacer = Pacer::new(frequency);
        let start = clock.now();

        for _ in 0..sets {
            if token.is_cancelled() {
                return Ok(None);
            }
            let unit_start = clock.now();
            producer.produce_unit(socket)?;
            if let Some(wait) = pacer.next_wait() {
                clock.wait(wait);
            }
            pacer.unit_finished(clock.now().saturating_sub(unit_start));
        }

        let elapsed_us = (clock.now().saturating_sub(start).as_secs_f64() * 1_000_000.0).max(1.0);
        let set_bytes = self.config.entity_set_bytes(self.mode) as f64;
        let sent = sets as f64;
        let duration_ms = elapsed_us / 1_000.0;

        Ok(Some(PublisherIteration {
            iteration: self.results.len() + 1,
            duration_ms,
            entity_sets_sent: sets,
            programmed_frequency: frequency,
            actual_frequency: 1_000.0 * sent / duration_ms,
            programmed_throughput_kbps: set_bytes / 1_000.0 * frequency,
            actual_throughput_kbps: sent * set_bytes / elapsed_us * 1_000.0,
            drift_us: pacer.drift_us(),
        }))
    }
}
