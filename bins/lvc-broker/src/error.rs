#[derive(Debug, thiserror::Error)]
pub enum LvcBrokerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("transport: {0}")]
    Transport(#[from] bench_api::BenchError),

    #[error("{0}")]
    Broker(#[from] lvc_engine::BrokerError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),

    #[error("broker thread: {0}")]
    Join(#[from] tokio::task::JoinError),
}
