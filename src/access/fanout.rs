//! Concurrent fan-out over independent read operations.

use std::future::Future;

use futures_util::future::try_join_all;

use crate::error::DataGateError;

/// Runs `operations` concurrently and collects their results.
///
/// Results keep the input order regardless of which operation completes
/// first. The caller waits until every operation has finished, unless one
/// fails: then the remaining operations are dropped and the first error is
/// returned, with no partial results.
///
/// Operations are polled cooperatively on the calling task. Each should own
/// its connection scope; none may share a handle.
///
/// # Errors
///
/// Returns the first error raised by any operation.
pub async fn gather<I, Fut, T>(operations: I) -> Result<Vec<T>, DataGateError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, DataGateError>>,
{
    let operations: Vec<Fut> = operations.into_iter().collect();
    let count = operations.len();
    tracing::debug!(operations = count, "fan-out started");

    let results = try_join_all(operations).await.inspect_err(|err| {
        tracing::warn!(operations = count, error = %err, "fan-out failed");
    })?;

    tracing::debug!(operations = count, "fan-out completed");
    Ok(results)
}
