use std::time::{Duration, Instant};

use bench_api::WaitStrategy;

// ═══════════════════════════════════════════════════════════════
//  Wait primitives
// ═══════════════════════════════════════════════════════════════

/// Точное ожидание: крутится на `Instant::now()` до дедлайна.
///
/// `thread::sleep` не гарантирует субмиллисекундную точность, поэтому
/// pacing по умолчанию платит за точность целым ядром.
pub fn spin_wait(duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// Гибрид: спать до `margin` перед дедлайном, остаток докрутить spin'ом.
pub fn sleep_then_spin(duration: Duration, margin: Duration) {
    let deadline = Instant::now() + duration;
    if let Some(coarse) = duration.checked_sub(margin) {
        std::thread::sleep(coarse);
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

pub fn wait_with(strategy: WaitStrategy, duration: Duration) {
    match strategy {
        WaitStrategy::Spin => spin_wait(duration),
        WaitStrategy::SleepThenSpin { margin_us } => {
            sleep_then_spin(duration, Duration::from_micros(margin_us))
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Pacer: drift-compensated interval
// ═══════════════════════════════════════════════════════════════

/// Выдерживает интервал `T = 1e6 / frequency` µs между unit'ами,
/// накапливая ошибку планирования за всю итерацию.
///
/// После emit'а unit'а `i`: `drift += observed(i-1) - T`, ожидание
/// `T - drift`. Опоздавший unit сокращает ожидание следующих, так что
/// одиночный jitter компенсируется, а не накапливается.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval_us: f64,
    drift_us: f64,
    last_unit_us: f64,
}

impl Pacer {
    pub fn new(frequency: f64) -> Self {
        let interval_us = 1_000_000.0 / frequency;
        Self {
            interval_us,
            drift_us: 0.0,
            last_unit_us: interval_us,
        }
    }

    pub fn interval_us(&self) -> f64 {
        self.interval_us
    }

    /// Накопленный дрейф, µs. Положительный: итерация отстаёт.
    pub fn drift_us(&self) -> f64 {
        self.drift_us
    }

    /// Вызывается сразу после emit'а. `None`: ждать не нужно, отстаём.
    pub fn next_wait(&mut self) -> Option<Duration> {
        self.drift_us += self.last_unit_us - self.interval_us;
        let wait_us = self.interval_us - self.drift_us;
        (wait_us > 0.0).then(|| Duration::from_secs_f64(wait_us / 1_000_000.0))
    }

    /// Полная длительность только что законченного unit'а (emit + wait).
    pub fn unit_finished(&mut self, observed: Duration) {
        self.last_unit_us = observed.as_secs_f64() * 1_000_000.0;
    }
}
