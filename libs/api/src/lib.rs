pub mod config;
pub mod entity;
pub mod error;
pub mod topic;
pub mod transport;

pub use config::{EntitySize, RunConfig, TopicMode, WaitStrategy};
pub use error::{BenchError, ErrorKind};
pub use transport::{
    BrokerSockets, Message, PublishSocket, Readiness, SubscribeSocket, SubscriptionEvent,
};
