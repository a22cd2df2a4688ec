use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Bench(#[from] bench_api::BenchError),

    #[error("report ({path}): {source}")]
    Report { path: PathBuf, source: std::io::Error },
}
