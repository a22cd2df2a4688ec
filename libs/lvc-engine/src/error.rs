use bench_api::BenchError;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Транспортный контекст закрыт: loop дальше работать не может.
    #[error("transport closed: {0}")]
    Closed(BenchError),
}
