pub mod error;
mod broker;
mod cache;

pub use broker::{Broker, BrokerOptions, BrokerStats, DrainPolicy, EXHAUST_LIMIT};
pub use cache::LastValueCache;
pub use error::BrokerError;
