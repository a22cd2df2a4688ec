#[derive(Debug, thiserror::Error)]
pub enum LvcBenchError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Bench(#[from] bench_api::BenchError),

    #[error("{0}")]
    Harness(#[from] harness::HarnessError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),

    #[error("worker thread: {0}")]
    Join(#[from] tokio::task::JoinError),
}
