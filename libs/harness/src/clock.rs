use std::time::{Duration, Instant};

use bench_api::WaitStrategy;

use crate::pacing;

/// Источник времени publisher'а.
///
/// Реальные часы крутят spin/sleep, тестовые сдвигают время вручную, так
/// что ramp-up проверяется без реального ожидания.
pub trait Clock {
    /// Время от произвольной, но фиксированной точки отсчёта.
    fn now(&self) -> Duration;

    /// Точное ожидание остатка интервала pacing'а.
    fn wait(&self, duration: Duration);

    /// Грубая пауза между итерациями.
    fn pause(&self, duration: Duration);
}

pub struct MonotonicClock {
    origin: Instant,
    strategy: WaitStrategy,
}

impl MonotonicClock {
    pub fn new(strategy: WaitStrategy) -> Self {
        Self { origin: Instant::now(), strategy }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wait(&self, duration: Duration) {
        pacing::wait_with(self.strategy, duration);
    }

    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod manual {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::Clock;

    /// Часы, которые двигаются только через `advance`, `wait` и `pause`.
    #[derive(Clone, Default)]
    pub struct ManualClock {
        now: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        pub fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            self.now.get()
        }

        fn wait(&self, duration: Duration) {
            self.advance(duration);
        }

        fn pause(&self, duration: Duration) {
            self.advance(duration);
        }
    }
}
