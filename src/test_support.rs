//! Shared fixtures for unit tests: seeded SQLite files and a store wrapper
//! that records every connection-level call.

#![allow(clippy::panic)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream::BoxStream;
use tempfile::TempDir;

use crate::domain::{Query, Row, RowSet};
use crate::error::DataGateError;
use crate::store::{SqliteHandle, SqliteStore, Store, StoreHandle};

/// Creates a `user_data` table with `count` users aged 20, 25, 30, ...
pub(crate) async fn seeded_store(count: i64) -> (TempDir, SqliteStore) {
    let Ok(dir) = TempDir::new() else {
        panic!("tempdir");
    };
    let store = SqliteStore::open(dir.path().join("users.db"));
    let Ok(mut handle) = store.connect().await else {
        panic!("connect failed");
    };
    let create = Query::new(
        "CREATE TABLE user_data (user_id INTEGER PRIMARY KEY, name TEXT NOT NULL, \
         email TEXT NOT NULL, age INTEGER NOT NULL)",
    );
    let Ok(_) = handle.execute(&create).await else {
        panic!("create table failed");
    };
    for i in 1..=count {
        let insert = Query::new("INSERT INTO user_data (user_id, name, email, age) VALUES (?, ?, ?, ?)")
            .bind(i)
            .bind(format!("user{i}"))
            .bind(format!("user{i}@example.com"))
            .bind(15 + 5 * i);
        let Ok(1) = handle.execute(&insert).await else {
            panic!("insert failed");
        };
    }
    let Ok(()) = handle.close().await else {
        panic!("close failed");
    };
    (dir, store)
}

/// Wraps a [`SqliteStore`], counting opens, closes and handle releases
/// and recording the order of handle calls.
#[derive(Debug)]
pub(crate) struct CountingStore {
    inner: SqliteStore,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    pub(crate) released: Arc<AtomicUsize>,
    events: Arc<Mutex<Vec<&'static str>>>,
    failing_connects: AtomicU32,
}

impl CountingStore {
    pub(crate) fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(Mutex::new(Vec::new())),
            failing_connects: AtomicU32::new(0),
        }
    }

    /// Makes the next `n` connects fail with a connection error.
    pub(crate) fn fail_next_connects(&self, n: u32) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<&'static str> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

fn record(events: &Mutex<Vec<&'static str>>, event: &'static str) {
    if let Ok(mut events) = events.lock() {
        events.push(event);
    }
}

impl Store for CountingStore {
    type Handle = CountingHandle;

    fn target(&self) -> &str {
        self.inner.target()
    }

    async fn connect(&self) -> Result<CountingHandle, DataGateError> {
        let should_fail = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(DataGateError::Connection("store unreachable".to_string()));
        }
        let inner = self.inner.connect().await?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        record(&self.events, "open");
        Ok(CountingHandle {
            inner,
            events: Arc::clone(&self.events),
            closed: Arc::clone(&self.closed),
            _release: ReleaseTracker(Arc::clone(&self.released)),
        })
    }
}

/// Increments its counter when dropped, i.e. when the handle is released
/// by any path.
#[derive(Debug)]
struct ReleaseTracker(Arc<AtomicUsize>);

impl Drop for ReleaseTracker {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub(crate) struct CountingHandle {
    inner: SqliteHandle,
    events: Arc<Mutex<Vec<&'static str>>>,
    closed: Arc<AtomicUsize>,
    _release: ReleaseTracker,
}

impl StoreHandle for CountingHandle {
    async fn execute(&mut self, query: &Query) -> Result<u64, DataGateError> {
        record(&self.events, "execute");
        self.inner.execute(query).await
    }

    async fn fetch_all(&mut self, query: &Query) -> Result<RowSet, DataGateError> {
        record(&self.events, "fetch_all");
        self.inner.fetch_all(query).await
    }

    fn fetch<'a>(&'a mut self, query: &'a Query) -> BoxStream<'a, Result<Row, DataGateError>> {
        record(&self.events, "fetch");
        self.inner.fetch(query)
    }

    async fn begin(&mut self) -> Result<(), DataGateError> {
        record(&self.events, "begin");
        self.inner.begin().await
    }

    async fn commit(&mut self) -> Result<(), DataGateError> {
        record(&self.events, "commit");
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<(), DataGateError> {
        record(&self.events, "rollback");
        self.inner.rollback().await
    }

    async fn release_statements(&mut self) -> Result<(), DataGateError> {
        record(&self.events, "release");
        self.inner.release_statements().await
    }

    async fn close(self) -> Result<(), DataGateError> {
        record(&self.events, "close");
        self.closed.fetch_add(1, Ordering::SeqCst);
        let Self { inner, .. } = self;
        inner.close().await
    }
}
