pub mod publish;
pub mod subscribe;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LvcBenchError;

/// Дождаться worker'а; Ctrl+C отменяет `token`, и worker завершается
/// между unit'ами, отдавая законченные итерации.
async fn until_ctrl_c<T>(
    mut handle: JoinHandle<Result<T, LvcBenchError>>,
    token: CancellationToken,
) -> Result<T, LvcBenchError> {
    tokio::select! {
        res = &mut handle => res?,
        sig = tokio::signal::ctrl_c() => {
            sig?;
            tracing::info!("interrupted, finishing...");
            token.cancel();
            handle.await?
        }
    }
}
