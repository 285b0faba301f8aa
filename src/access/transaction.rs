//! Transactional executor: commit on success, roll back on failure.

use crate::error::DataGateError;
use crate::store::StoreHandle;

/// Runs `op` inside a transaction on `handle`.
///
/// Commits and returns `op`'s value when it succeeds. When it fails the
/// transaction is rolled back and the original error is returned
/// unchanged; a rollback failure is logged and does not replace it. If the
/// commit itself fails, a rollback is attempted and the commit error is
/// returned.
///
/// # Errors
///
/// Returns the error from `begin`, from `op`, or from `commit`.
pub async fn run<H, F, T>(handle: &mut H, op: F) -> Result<T, DataGateError>
where
    H: StoreHandle,
    F: AsyncFnOnce(&mut H) -> Result<T, DataGateError>,
{
    handle.begin().await?;

    match op(&mut *handle).await {
        Ok(value) => match handle.commit().await {
            Ok(()) => {
                tracing::info!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, "commit failed; rolling back");
                if let Err(rollback_err) = handle.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
                }
                Err(err)
            }
        },
        Err(err) => {
            match handle.rollback().await {
                Ok(()) => tracing::info!(error = %err, "transaction rolled back"),
                Err(rollback_err) => tracing::warn!(
                    error = %err,
                    rollback_error = %rollback_err,
                    "transaction rollback failed"
                ),
            }
            Err(err)
        }
    }
}
