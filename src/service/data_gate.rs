//! Data gate: the access layer composed over one store.

use std::sync::Arc;

use futures_util::stream::Stream;

use crate::access::{self, ResultCache, RetryPolicy, transaction};
use crate::config::DataGateConfig;
use crate::domain::{Batch, Page, Query, Row, RowSet};
use crate::error::DataGateError;
use crate::store::{SqliteStore, Store, StoreHandle};

/// Entry point for application code.
///
/// Owns the [`Store`], the [`RetryPolicy`] and the [`ResultCache`]. Every
/// method opens its own connection scope; writes follow the pattern
/// retry → transaction → scope, reads go cache → scope. Clones share the
/// cache.
#[derive(Debug, Clone)]
pub struct DataGate<S> {
    store: S,
    cache: Arc<ResultCache<Arc<RowSet>>>,
    retry: RetryPolicy,
    batch_size: u64,
}

impl<S: Store> DataGate<S> {
    /// Creates a new `DataGate` with an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::InvalidConfig`] if `batch_size` is zero.
    pub fn new(store: S, retry: RetryPolicy, batch_size: u64) -> Result<Self, DataGateError> {
        if batch_size == 0 {
            return Err(DataGateError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            store,
            cache: Arc::new(ResultCache::new()),
            retry,
            batch_size,
        })
    }

    /// Returns a reference to the inner [`Store`].
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns a reference to the shared [`ResultCache`].
    #[must_use]
    pub fn cache(&self) -> &ResultCache<Arc<RowSet>> {
        &self.cache
    }

    /// Returns the retry policy applied by the `*_with_retry` methods.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Default batch size for [`DataGate::stream_batches`].
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Runs `op` on a fresh connection, closing it afterwards.
    ///
    /// # Errors
    ///
    /// Returns a connection error or `op`'s error.
    pub async fn with_connection<F, T>(&self, op: F) -> Result<T, DataGateError>
    where
        F: AsyncFnOnce(&mut S::Handle) -> Result<T, DataGateError>,
    {
        access::with_connection(&self.store, op).await
    }

    /// Runs `op` in a transaction on a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns a connection error, `op`'s error after rollback, or a commit
    /// error.
    pub async fn transaction<F, T>(&self, op: F) -> Result<T, DataGateError>
    where
        F: AsyncFnOnce(&mut S::Handle) -> Result<T, DataGateError>,
    {
        access::with_connection(&self.store, async move |handle| {
            transaction::run(handle, op).await
        })
        .await
    }

    /// Runs `op` in a transaction, retrying the whole unit on failure.
    ///
    /// Each attempt gets a new connection and a new transaction; a failed
    /// attempt is rolled back before the next begins.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::RetryExhausted`] wrapping the last failure.
    pub async fn transaction_with_retry<F, T>(&self, op: F) -> Result<T, DataGateError>
    where
        F: AsyncFn(&mut S::Handle) -> Result<T, DataGateError>,
    {
        let op = &op;
        self.retry
            .run(move || self.transaction(async move |handle| op(handle).await))
            .await
    }

    /// Runs a single write statement in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns a connection or query error.
    pub async fn execute(&self, query: &Query) -> Result<u64, DataGateError> {
        let affected = self
            .transaction(async |tx| tx.execute(query).await)
            .await?;
        tracing::info!(query = query.text(), affected, "statement executed");
        Ok(affected)
    }

    /// Fetches every row of `query`.
    ///
    /// # Errors
    ///
    /// Returns a connection or query error.
    pub async fn fetch_all(&self, query: &Query) -> Result<RowSet, DataGateError> {
        self.with_connection(async |handle| handle.fetch_all(query).await)
            .await
    }

    /// Fetches `query` through the result cache.
    ///
    /// The first call for a signature hits the store; later calls return
    /// the same `Arc` without opening a connection.
    ///
    /// # Errors
    ///
    /// Returns a connection or query error; failures are not cached.
    pub async fn fetch_cached(&self, query: &Query) -> Result<Arc<RowSet>, DataGateError> {
        self.cache
            .get_or_compute(query, || async {
                self.fetch_all(query).await.map(Arc::new)
            })
            .await
    }

    /// Fetches `query` under the retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::RetryExhausted`] wrapping the last failure.
    pub async fn fetch_with_retry(&self, query: &Query) -> Result<RowSet, DataGateError> {
        self.retry.run(move || self.fetch_all(query)).await
    }

    /// Streams rows of `query` one at a time.
    pub fn stream_rows(&self, query: Query) -> impl Stream<Item = Result<Row, DataGateError>> + '_ {
        access::stream_rows(&self.store, query)
    }

    /// Streams `query` in batches of [`DataGate::batch_size`] rows.
    pub fn stream_batches(
        &self,
        query: Query,
    ) -> impl Stream<Item = Result<Batch, DataGateError>> + '_ {
        access::stream_batches(&self.store, query, self.batch_size)
    }

    /// Streams rows of `query`, fetched in batches of
    /// [`DataGate::batch_size`].
    pub fn stream_batched_rows(
        &self,
        query: Query,
    ) -> impl Stream<Item = Result<Row, DataGateError>> + '_ {
        access::stream_batched_rows(&self.store, query, self.batch_size)
    }

    /// Streams `query` page by page.
    pub fn paginate(
        &self,
        query: Query,
        page_size: u64,
    ) -> impl Stream<Item = Result<Page, DataGateError>> + '_ {
        access::paginate(&self.store, query, page_size)
    }

    /// Fetches a single page of `query`.
    ///
    /// # Errors
    ///
    /// Returns a configuration, connection or query error.
    pub async fn fetch_page(
        &self,
        query: &Query,
        page_size: u64,
        offset: u64,
    ) -> Result<Vec<Row>, DataGateError> {
        access::fetch_page(&self.store, query, page_size, offset).await
    }

    /// Runs every query concurrently, each on its own connection.
    ///
    /// # Errors
    ///
    /// Returns the first failure; no partial results.
    pub async fn gather_queries(&self, queries: &[Query]) -> Result<Vec<RowSet>, DataGateError> {
        let results = access::gather(queries.iter().map(|q| self.fetch_all(q))).await?;
        tracing::info!(queries = queries.len(), "concurrent fetch completed");
        Ok(results)
    }
}

impl DataGate<SqliteStore> {
    /// Builds a SQLite-backed `DataGate` from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::InvalidConfig`] for an unparseable URL or
    /// out-of-range settings.
    pub fn from_config(config: &DataGateConfig) -> Result<Self, DataGateError> {
        let store = SqliteStore::from_config(config)?;
        let retry = RetryPolicy::from_config(config)?;
        Self::new(store, retry, config.batch_size)
    }
}
