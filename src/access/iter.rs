//! Lazy, bounded-memory traversal of large result sets.
//!
//! Three shapes, all finite and not restartable; calling again starts over
//! with a fresh connection scope:
//!
//! - [`stream_rows`]: one record at a time from the driver's cursor.
//! - [`stream_batches`]: `LIMIT n OFFSET k*n` windows on one connection.
//! - [`paginate`]: the same windows surfaced as pages, each fetched on its
//!   own connection by [`fetch_page`].
//!
//! Offset windows are not snapshot-consistent: if the underlying rows
//! change between fetches, records may be skipped or repeated.

use futures_util::stream::{self, Stream};
use futures_util::{StreamExt, TryStreamExt};

use async_stream::try_stream;

use super::scope::{ConnectionScope, with_connection};
use crate::domain::{Batch, Page, Query, Row, RowSet};
use crate::error::DataGateError;
use crate::store::{Store, StoreHandle};

fn ensure_window(size: u64, what: &str) -> Result<(), DataGateError> {
    if size == 0 {
        return Err(DataGateError::InvalidConfig(format!(
            "{what} must be at least 1"
        )));
    }
    Ok(())
}

/// Rejects a window holding more rows than were asked for, which means the
/// store did not apply the appended `LIMIT`.
fn ensure_bounded(fetched: usize, size: u64, what: &str) -> Result<(), DataGateError> {
    if u64::try_from(fetched).unwrap_or(u64::MAX) > size {
        return Err(DataGateError::Query(format!(
            "window returned {fetched} rows, more than {what} {size}; \
             the query text may hide the appended LIMIT"
        )));
    }
    Ok(())
}

/// Streams the rows of `query` one at a time.
///
/// Holds one connection for the life of the stream. At most one decoded
/// row is alive at a time on this side of the driver.
pub fn stream_rows<S: Store>(
    store: &S,
    query: Query,
) -> impl Stream<Item = Result<Row, DataGateError>> + '_ {
    try_stream! {
        let mut scope = ConnectionScope::enter(store).await?;
        let mut failure = None;
        let mut count: u64 = 0;
        {
            let mut rows = scope.handle()?.fetch(&query);
            while let Some(item) = rows.next().await {
                match item {
                    Ok(row) => {
                        count += 1;
                        yield row;
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }
        tracing::debug!(scope = %scope.id(), rows = count, "row stream finished");
        scope.exit().await;
        if let Some(err) = failure {
            Err::<(), _>(err)?;
        }
    }
}

/// Streams `query` in batches of at most `batch_size` rows.
///
/// Batch `n` is fetched with `LIMIT batch_size OFFSET n * batch_size` on
/// the stream's single connection. The stream ends at the first empty
/// batch.
pub fn stream_batches<S: Store>(
    store: &S,
    query: Query,
    batch_size: u64,
) -> impl Stream<Item = Result<Batch, DataGateError>> + '_ {
    try_stream! {
        ensure_window(batch_size, "batch_size")?;
        let mut scope = ConnectionScope::enter(store).await?;
        let mut index: u64 = 0;
        let mut failure = None;
        loop {
            let window = query.windowed(batch_size, index.saturating_mul(batch_size));
            let fetched = match scope.handle() {
                Ok(handle) => handle.fetch_all(&window).await,
                Err(err) => Err(err),
            };
            let fetched = fetched.and_then(|set| {
                ensure_bounded(set.len(), batch_size, "batch_size").map(|()| set)
            });
            match fetched {
                Ok(set) if set.is_empty() => break,
                Ok(set) => {
                    tracing::debug!(scope = %scope.id(), batch = index, rows = set.len(), "batch fetched");
                    yield Batch { index, rows: set.into_rows() };
                    index += 1;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        scope.exit().await;
        if let Some(err) = failure {
            Err::<(), _>(err)?;
        }
    }
}

/// [`stream_batches`] flattened back into single rows.
pub fn stream_batched_rows<S: Store>(
    store: &S,
    query: Query,
    batch_size: u64,
) -> impl Stream<Item = Result<Row, DataGateError>> + '_ {
    stream_batches(store, query, batch_size)
        .map_ok(|batch| stream::iter(batch.rows.into_iter().map(Ok::<Row, DataGateError>)))
        .try_flatten()
}

/// Fetches one page of `query` on its own connection.
///
/// # Errors
///
/// Returns [`DataGateError::InvalidConfig`] for a zero `page_size`,
/// [`DataGateError::Query`] if the store returns more than `page_size`
/// rows, otherwise any connection or query error.
pub async fn fetch_page<S: Store>(
    store: &S,
    query: &Query,
    page_size: u64,
    offset: u64,
) -> Result<Vec<Row>, DataGateError> {
    ensure_window(page_size, "page_size")?;
    let window = query.windowed(page_size, offset);
    let rows = with_connection(store, async |handle| handle.fetch_all(&window).await)
        .await
        .map(RowSet::into_rows)?;
    ensure_bounded(rows.len(), page_size, "page_size")?;
    Ok(rows)
}

/// Streams `query` page by page, `page_size` rows per page.
///
/// No connection is held between pages. The stream ends at the first
/// empty page.
pub fn paginate<S: Store>(
    store: &S,
    query: Query,
    page_size: u64,
) -> impl Stream<Item = Result<Page, DataGateError>> + '_ {
    try_stream! {
        ensure_window(page_size, "page_size")?;
        let mut offset: u64 = 0;
        let mut number: u64 = 1;
        loop {
            let rows = fetch_page(store, &query, page_size, offset).await?;
            if rows.is_empty() {
                break;
            }
            tracing::debug!(page = number, offset, rows = rows.len(), "page fetched");
            yield Page { number, offset, rows };
            offset = offset.saturating_add(page_size);
            number += 1;
        }
    }
}
