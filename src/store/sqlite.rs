//! SQLite implementation of the store boundary.
//!
//! Each [`SqliteStore::connect`] opens a dedicated `sqlx::SqliteConnection`.
//! There is no pool: a handle belongs to exactly one connection scope.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row as _, Sqlite, TypeInfo, ValueRef};

use super::{Store, StoreHandle};
use crate::config::DataGateConfig;
use crate::domain::{Columns, Query, Row, RowSet, Value};
use crate::error::DataGateError;

/// SQLite-backed store opening one `SqliteConnection` per scope.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    target: String,
    options: SqliteConnectOptions,
    log_queries: bool,
}

impl SqliteStore {
    /// Creates a store from explicit connect options.
    #[must_use]
    pub fn new(options: SqliteConnectOptions) -> Self {
        Self {
            target: options.get_filename().display().to_string(),
            options,
            log_queries: false,
        }
    }

    /// Creates a store for a database file, creating it if missing.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::new(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
    }

    /// Parses a `sqlite://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::InvalidConfig`] if the URL is malformed.
    pub fn from_url(url: &str) -> Result<Self, DataGateError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DataGateError::InvalidConfig(format!("database url `{url}`: {e}")))?;
        Ok(Self::new(options))
    }

    /// Builds a store from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::InvalidConfig`] if `database_url` is
    /// malformed or names an in-memory database: every scope opens its own
    /// connection, and each would see a fresh, empty database.
    pub fn from_config(config: &DataGateConfig) -> Result<Self, DataGateError> {
        if is_in_memory(&config.database_url) {
            return Err(DataGateError::InvalidConfig(format!(
                "database url `{}` is in-memory; use a file",
                config.database_url
            )));
        }
        let store = Self::from_url(&config.database_url)?;
        let options = store
            .options
            .create_if_missing(config.create_if_missing)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
        Ok(Self::new(options).with_query_logging(config.log_queries))
    }

    /// Enables or disables logging of every statement's text and parameters.
    #[must_use]
    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }
}

impl Store for SqliteStore {
    type Handle = SqliteHandle;

    fn target(&self) -> &str {
        &self.target
    }

    async fn connect(&self) -> Result<SqliteHandle, DataGateError> {
        let conn = self
            .options
            .connect()
            .await
            .map_err(DataGateError::connection)?;
        Ok(SqliteHandle {
            conn,
            log_queries: self.log_queries,
        })
    }
}

/// One open SQLite connection.
#[derive(Debug)]
pub struct SqliteHandle {
    conn: SqliteConnection,
    log_queries: bool,
}

impl SqliteHandle {
    /// Number of prepared statements currently cached by the connection.
    #[must_use]
    pub fn cached_statements(&self) -> usize {
        self.conn.cached_statements_size()
    }

    fn log(&self, query: &Query) {
        if self.log_queries {
            tracing::info!(
                target: "datagate::query",
                sql = query.text(),
                params = ?query.params(),
                "executing query"
            );
        }
    }

    async fn control(&mut self, sql: &'static str) -> Result<(), DataGateError> {
        sqlx::query(sql)
            .execute(&mut self.conn)
            .await
            .map(|_| ())
            .map_err(DataGateError::query)
    }
}

impl StoreHandle for SqliteHandle {
    async fn execute(&mut self, query: &Query) -> Result<u64, DataGateError> {
        self.log(query);
        let result = bind_params(query)
            .execute(&mut self.conn)
            .await
            .map_err(DataGateError::query)?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, query: &Query) -> Result<RowSet, DataGateError> {
        self.log(query);
        let raw = bind_params(query)
            .fetch_all(&mut self.conn)
            .await
            .map_err(DataGateError::query)?;

        let mut columns = None;
        let rows = raw
            .iter()
            .map(|row| decode_row(row, &mut columns))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RowSet::new(rows))
    }

    fn fetch<'a>(&'a mut self, query: &'a Query) -> BoxStream<'a, Result<Row, DataGateError>> {
        self.log(query);
        let mut columns = None;
        bind_params(query)
            .fetch(&mut self.conn)
            .map(move |item| {
                item.map_err(DataGateError::query)
                    .and_then(|row| decode_row(&row, &mut columns))
            })
            .boxed()
    }

    async fn begin(&mut self) -> Result<(), DataGateError> {
        self.control("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), DataGateError> {
        self.control("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), DataGateError> {
        self.control("ROLLBACK").await
    }

    async fn release_statements(&mut self) -> Result<(), DataGateError> {
        self.conn
            .clear_cached_statements()
            .await
            .map_err(DataGateError::connection)
    }

    async fn close(self) -> Result<(), DataGateError> {
        self.conn.close().await.map_err(DataGateError::connection)
    }
}

fn is_in_memory(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Binds every parameter of `query` in placeholder order.
fn bind_params(query: &Query) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    let mut bound = sqlx::query(query.text());
    for param in query.params() {
        bound = match param {
            Value::Null => bound.bind(None::<i64>),
            Value::Integer(v) => bound.bind(*v),
            Value::Real(v) => bound.bind(*v),
            Value::Text(v) => bound.bind(v.as_str()),
            Value::Blob(v) => bound.bind(v.as_slice()),
        };
    }
    bound
}

/// Decodes one driver row, reusing the column names of earlier rows in the
/// same result set.
fn decode_row(row: &SqliteRow, columns: &mut Option<Columns>) -> Result<Row, DataGateError> {
    let names = if let Some(names) = columns.as_ref().filter(|n| n.len() == row.len()) {
        Arc::clone(names)
    } else {
        let names: Columns = row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        *columns = Some(Arc::clone(&names));
        names
    };
    let values = (0..row.len())
        .map(|i| decode_value(row, i))
        .collect::<Result<Vec<_>, _>>()?;
    Row::new(names, values)
}

/// Decodes a single column by the storage class of the value itself.
fn decode_value(row: &SqliteRow, index: usize) -> Result<Value, DataGateError> {
    let column = || {
        row.columns()
            .get(index)
            .map_or_else(|| index.to_string(), |c| c.name().to_string())
    };
    let raw = row.try_get_raw(index).map_err(DataGateError::query)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_ascii_uppercase();

    let decoded = match storage.as_str() {
        "REAL" => row.try_get::<f64, _>(index).map(Value::Real),
        "TEXT" | "DATE" | "TIME" | "DATETIME" => row.try_get::<String, _>(index).map(Value::Text),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(Value::Blob),
        _ => row
            .try_get::<i64, _>(index)
            .map(Value::Integer)
            .or_else(|_| row.try_get::<f64, _>(index).map(Value::Real))
            .or_else(|_| row.try_get::<String, _>(index).map(Value::Text)),
    };
    decoded.map_err(|e| DataGateError::Decode {
        column: column(),
        message: e.to_string(),
    })
}
