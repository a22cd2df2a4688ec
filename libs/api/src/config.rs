use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::topic;

// ════════════════════════════════════════════════════════════════
//  Entity size / topic mode
// ════════════════════════════════════════════════════════════════

/// Класс размера entity на проводе.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntitySize {
    /// 64 байта: id + timestamp + 40 байт padding.
    Small,
    /// 512 байт: id + timestamp + 487 байт padding.
    #[default]
    Large,
}

impl EntitySize {
    /// Номинальный размер entity в байтах (для throughput-расчётов).
    pub const fn wire_bytes(self) -> usize {
        match self {
            EntitySize::Small => 64,
            EntitySize::Large => 512,
        }
    }

    pub const fn padding_bytes(self) -> usize {
        match self {
            EntitySize::Small => 40,
            EntitySize::Large => 487,
        }
    }

    /// Накладные расходы вложенного сообщения в entity set
    /// (tag + varint длины).
    pub const fn framing_overhead(self) -> usize {
        match self {
            EntitySize::Small => 2,
            EntitySize::Large => 3,
        }
    }
}

impl std::fmt::Display for EntitySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntitySize::Small => f.write_str("small"),
            EntitySize::Large => f.write_str("large"),
        }
    }
}

/// Стратегия адресации: один topic на весь set или topic на каждую entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopicMode {
    #[default]
    Single,
    Sub,
}

impl TopicMode {
    /// Метка режима в именах файлов результатов.
    pub const fn label(self) -> &'static str {
        match self {
            TopicMode::Single => "SINGLE",
            TopicMode::Sub => "SUB",
        }
    }

    /// Prefix, на который подписывается subscriber.
    pub const fn subscription_prefix(self) -> &'static [u8] {
        match self {
            TopicMode::Single => topic::SINGLE_TOPIC,
            TopicMode::Sub => topic::SUB_TOPIC_PREFIX,
        }
    }
}

impl std::fmt::Display for TopicMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopicMode::Single => f.write_str("single"),
            TopicMode::Sub => f.write_str("sub"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Wait strategy
// ════════════════════════════════════════════════════════════════

/// Как publisher выжидает остаток интервала между unit'ами.
///
/// `Spin` точен до микросекунд, но занимает ядро целиком.
/// `SleepThenSpin` спит до `margin_us` перед дедлайном и докручивает spin'ом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitStrategy {
    #[default]
    Spin,
    SleepThenSpin {
        #[serde(default = "default_spin_margin_us")]
        margin_us: u64,
    },
}

fn default_spin_margin_us() -> u64 {
    2_000
}

impl WaitStrategy {
    /// `SleepThenSpin` с margin по умолчанию, как при `kind = "sleep_then_spin"` без margin_us.
    pub fn sleep_then_spin() -> Self {
        WaitStrategy::SleepThenSpin { margin_us: default_spin_margin_us() }
    }
}

// ════════════════════════════════════════════════════════════════
//  RunConfig
// ════════════════════════════════════════════════════════════════

/// Неизменяемая конфигурация прогона, общая для publisher и subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Количество entity в одном entity set.
    #[serde(default = "default_entities_in_set")]
    pub entities_in_set: usize,
    /// Стартовая частота, entity sets/s.
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    /// Прирост частоты после каждой итерации.
    #[serde(default = "default_frequency_step")]
    pub frequency_step: f64,
    /// Entity sets на итерацию.
    #[serde(default = "default_iteration_entity_sets")]
    pub iteration_entity_sets: usize,
    /// Отношение actual/programmed throughput, ниже которого прогон останавливается.
    #[serde(default = "default_throughput_ratio_cutoff")]
    pub throughput_ratio_cutoff: f64,
    #[serde(default)]
    pub entity_size: EntitySize,
    /// Окно тишины, после которого subscriber считает прогон законченным.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Пауза publisher'а перед каждой итерацией.
    #[serde(default = "default_iteration_pause_ms")]
    pub iteration_pause_ms: u64,
    #[serde(default)]
    pub wait: WaitStrategy,
}

fn default_entities_in_set() -> usize {
    100
}
fn default_frequency() -> f64 {
    100.0
}
fn default_frequency_step() -> f64 {
    50.0
}
fn default_iteration_entity_sets() -> usize {
    1000
}
fn default_throughput_ratio_cutoff() -> f64 {
    0.5
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_iteration_pause_ms() -> u64 {
    1_000
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            entities_in_set: default_entities_in_set(),
            frequency: default_frequency(),
            frequency_step: default_frequency_step(),
            iteration_entity_sets: default_iteration_entity_sets(),
            throughput_ratio_cutoff: default_throughput_ratio_cutoff(),
            entity_size: EntitySize::default(),
            timeout_ms: default_timeout_ms(),
            iteration_pause_ms: default_iteration_pause_ms(),
            wait: WaitStrategy::default(),
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn iteration_pause(&self) -> Duration {
        Duration::from_millis(self.iteration_pause_ms)
    }

    /// Размер entity set на проводе для данного режима.
    pub fn entity_set_bytes(&self, mode: TopicMode) -> usize {
        topic::entity_set_bytes(mode, self.entity_size, self.entities_in_set)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.entities_in_set == 0 {
            return Err(BenchError::config("entities_in_set must be > 0"));
        }
        if self.entities_in_set > usize::from(u16::MAX) {
            return Err(BenchError::config(format!(
                "entities_in_set must fit a 2-byte sub-topic index (max {})",
                u16::MAX
            )));
        }
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(BenchError::config("frequency must be > 0"));
        }
        if !(self.frequency_step.is_finite() && self.frequency_step >= 0.0) {
            return Err(BenchError::config("frequency_step must be >= 0"));
        }
        if self.iteration_entity_sets == 0 {
            return Err(BenchError::config("iteration_entity_sets must be > 0"));
        }
        if !(self.throughput_ratio_cutoff > 0.0 && self.throughput_ratio_cutoff <= 1.0) {
            return Err(BenchError::config("throughput_ratio_cutoff must be in (0, 1]"));
        }
        if self.timeout_ms == 0 {
            return Err(BenchError::config("timeout_ms must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.entities_in_set, 100);
        assert_eq!(cfg.frequency, 100.0);
        assert_eq!(cfg.frequency_step, 50.0);
        assert_eq!(cfg.iteration_entity_sets, 1000);
        assert_eq!(cfg.throughput_ratio_cutoff, 0.5);
        assert_eq!(cfg.entity_size, EntitySize::Large);
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.wait, WaitStrategy::Spin);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            RunConfig { entities_in_set: 0, ..RunConfig::default() },
            RunConfig { entities_in_set: 70_000, ..RunConfig::default() },
            RunConfig { frequency: 0.0, ..RunConfig::default() },
            RunConfig { frequency: f64::NAN, ..RunConfig::default() },
            RunConfig { iteration_entity_sets: 0, ..RunConfig::default() },
            RunConfig { throughput_ratio_cutoff: 1.5, ..RunConfig::default() },
            RunConfig { throughput_ratio_cutoff: 0.0, ..RunConfig::default() },
            RunConfig { timeout_ms: 0, ..RunConfig::default() },
        ];
        for cfg in bad {
            let err = cfg.validate().unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Config, "{cfg:?}");
        }
    }

    #[test]
    fn mode_prefixes() {
        assert_eq!(TopicMode::Single.subscription_prefix(), b"entity");
        assert_eq!(TopicMode::Sub.subscription_prefix(), b"ent.");
        assert_eq!(TopicMode::Sub.label(), "SUB");
    }
}
