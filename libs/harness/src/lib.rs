//! Нагрузочный стенд LVC: paced publisher с ramp-up частоты и
//! subscriber, который меряет latency и throughput по итерациям.

pub mod clock;
pub mod consumer;
pub mod error;
pub mod pacing;
pub mod producer;
pub mod publisher;
pub mod report;
pub mod sampler;

pub use clock::{Clock, MonotonicClock};
pub use error::HarnessError;
pub use publisher::{PacedPublisher, PublisherIteration, PublisherState};
pub use report::LogPaths;
pub use sampler::{LatencySampler, ReceiveOutcome, SubscriberIteration};
