//! Store boundary: the relational data store as seen by this crate.
//!
//! [`Store`] opens connections; [`StoreHandle`] is one open, exclusive
//! connection. Everything above this module is written against these two
//! traits. The concrete backend is [`sqlite::SqliteStore`].

pub mod sqlite;

use std::future::Future;

use futures_util::stream::BoxStream;

use crate::domain::{Query, Row, RowSet};
use crate::error::DataGateError;

pub use sqlite::{SqliteHandle, SqliteStore};

/// A relational store that hands out exclusive connections.
pub trait Store: Send + Sync {
    /// Connection type produced by [`Store::connect`].
    type Handle: StoreHandle;

    /// Human-readable connection target, used in log events.
    fn target(&self) -> &str;

    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Connection`] if the store is unreachable.
    fn connect(&self) -> impl Future<Output = Result<Self::Handle, DataGateError>> + Send;
}

/// One open connection to a [`Store`].
///
/// A handle is owned by exactly one connection scope and is never shared
/// across concurrent operations.
pub trait StoreHandle: Send {
    /// Runs a statement, returning the number of rows it changed.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Query`] if the store rejects the statement.
    fn execute(&mut self, query: &Query) -> impl Future<Output = Result<u64, DataGateError>> + Send;

    /// Runs a statement and materializes every row it returns.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Query`] if the store rejects the statement
    /// and [`DataGateError::Decode`] if a value cannot be represented.
    fn fetch_all(
        &mut self,
        query: &Query,
    ) -> impl Future<Output = Result<RowSet, DataGateError>> + Send;

    /// Runs a statement and streams its rows one at a time.
    fn fetch<'a>(&'a mut self, query: &'a Query) -> BoxStream<'a, Result<Row, DataGateError>>;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store refuses to open a transaction.
    fn begin(&mut self) -> impl Future<Output = Result<(), DataGateError>> + Send;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    fn commit(&mut self) -> impl Future<Output = Result<(), DataGateError>> + Send;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    fn rollback(&mut self) -> impl Future<Output = Result<(), DataGateError>> + Send;

    /// Releases prepared statements and cursors held by the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to finalize a statement.
    fn release_statements(&mut self) -> impl Future<Output = Result<(), DataGateError>> + Send;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Connection`] if the close handshake fails.
    /// The connection is gone either way.
    fn close(self) -> impl Future<Output = Result<(), DataGateError>> + Send;
}
