//! Connection scope: one store handle, released exactly once.
//!
//! [`ConnectionScope::enter`] opens a handle; [`ConnectionScope::exit`]
//! releases cached statements and then closes the connection. A scope that
//! is dropped without `exit` (its future was cancelled, a stream was
//! abandoned) releases the handle synchronously in `Drop`. Either way the
//! release happens once.

use std::fmt;

use uuid::Uuid;

use crate::error::DataGateError;
use crate::store::{Store, StoreHandle};

/// Exclusive owner of one open [`StoreHandle`].
pub struct ConnectionScope<H: StoreHandle> {
    id: Uuid,
    target: String,
    handle: Option<H>,
}

impl<H: StoreHandle> ConnectionScope<H> {
    /// Opens a new connection on `store`.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Connection`] if the store is unreachable.
    pub async fn enter<S>(store: &S) -> Result<Self, DataGateError>
    where
        S: Store<Handle = H>,
    {
        let id = Uuid::new_v4();
        let target = store.target().to_string();
        let handle = store.connect().await.inspect_err(|err| {
            tracing::warn!(scope = %id, target = %target, error = %err, "connection failed");
        })?;
        tracing::info!(scope = %id, target = %target, "connection opened");
        Ok(Self {
            id,
            target,
            handle: Some(handle),
        })
    }

    /// Correlation id shared by this scope's log events.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Borrows the open handle.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Connection`] if the handle has already been
    /// released.
    pub fn handle(&mut self) -> Result<&mut H, DataGateError> {
        self.handle.as_mut().ok_or_else(|| {
            DataGateError::Connection(format!("connection scope {} already exited", self.id))
        })
    }

    /// Releases statements, then closes the connection.
    ///
    /// Cleanup failures are logged and never returned: the caller's own
    /// outcome is what propagates.
    pub async fn exit(mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        if let Err(err) = handle.release_statements().await {
            tracing::warn!(scope = %self.id, error = %err, "failed to release statements");
        }
        match handle.close().await {
            Ok(()) => tracing::info!(scope = %self.id, target = %self.target, "connection closed"),
            Err(err) => {
                tracing::warn!(scope = %self.id, target = %self.target, error = %err, "error during connection close");
            }
        }
    }
}

impl<H: StoreHandle> Drop for ConnectionScope<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::warn!(
                scope = %self.id,
                target = %self.target,
                "connection scope dropped before exit; releasing handle"
            );
            drop(handle);
        }
    }
}

impl<H: StoreHandle> fmt::Debug for ConnectionScope<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionScope")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

/// Runs `op` with a freshly opened handle and closes it afterwards.
///
/// The connection is released whether `op` succeeds or fails, and `op`'s
/// result is returned unchanged.
///
/// # Errors
///
/// Returns [`DataGateError::Connection`] if the store is unreachable, or
/// whatever `op` returns.
pub async fn with_connection<S, F, T>(store: &S, op: F) -> Result<T, DataGateError>
where
    S: Store,
    F: AsyncFnOnce(&mut S::Handle) -> Result<T, DataGateError>,
{
    let mut scope = ConnectionScope::enter(store).await?;
    let result = match scope.handle() {
        Ok(handle) => op(handle).await,
        Err(err) => Err(err),
    };
    scope.exit().await;
    result
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::domain::Query;
    use crate::test_support::{CountingStore, seeded_store};

    #[tokio::test]
    async fn opens_and_closes_once_on_success() {
        let (_dir, store) = seeded_store(3).await;
        let counting = CountingStore::new(store);

        let result = with_connection(&counting, async |h| {
            h.fetch_all(&Query::new("SELECT * FROM user_data")).await
        })
        .await;

        let Ok(rows) = result else {
            panic!("select failed");
        };
        assert_eq!(rows.len(), 3);
        assert_eq!(counting.opened(), 1);
        assert_eq!(counting.closed(), 1);
        assert_eq!(counting.events(), vec!["open", "fetch_all", "release", "close"]);
    }

    #[tokio::test]
    async fn closes_once_when_operation_fails() {
        let (_dir, store) = seeded_store(1).await;
        let counting = CountingStore::new(store);

        let result: Result<(), _> = with_connection(&counting, async |h| {
            h.execute(&Query::new("INSERT INTO no_such_table VALUES (1)"))
                .await
                .map(|_| ())
        })
        .await;

        assert!(matches!(result, Err(DataGateError::Query(_))));
        assert_eq!(counting.opened(), 1);
        assert_eq!(counting.closed(), 1);
        assert_eq!(counting.released.load(Ordering::SeqCst), 1);
        assert_eq!(counting.events(), vec!["open", "execute", "release", "close"]);
    }

    #[tokio::test]
    async fn connect_failure_opens_nothing() {
        let (_dir, store) = seeded_store(1).await;
        let counting = CountingStore::new(store);
        counting.fail_next_connects(1);

        let result = with_connection(&counting, async |_h| Ok(())).await;
        assert!(matches!(result, Err(DataGateError::Connection(_))));
        assert_eq!(counting.opened(), 0);
        assert_eq!(counting.closed(), 0);
    }

    #[tokio::test]
    async fn cancelled_scope_releases_handle_once() {
        let (_dir, store) = seeded_store(1).await;
        let counting = CountingStore::new(store);

        let pending = with_connection(&counting, async |_h| {
            std::future::pending::<()>().await;
            Ok(())
        });
        let outcome = tokio::time::timeout(Duration::from_millis(300), pending).await;
        assert!(outcome.is_err());

        assert_eq!(counting.opened(), 1);
        assert_eq!(counting.closed(), 0);
        assert_eq!(counting.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn explicit_enter_and_exit() {
        let (_dir, store) = seeded_store(2).await;
        let counting = CountingStore::new(store);

        let Ok(mut scope) = ConnectionScope::enter(&counting).await else {
            panic!("enter failed");
        };
        assert!(format!("{scope:?}").contains("open: true"));
        let Ok(handle) = scope.handle() else {
            panic!("handle available while open");
        };
        let Ok(rows) = handle.fetch_all(&Query::new("SELECT name FROM user_data")).await else {
            panic!("select failed");
        };
        assert_eq!(rows.len(), 2);
        scope.exit().await;

        assert_eq!(counting.closed(), 1);
        assert_eq!(counting.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pure_read_is_repeatable_across_scopes() {
        let (_dir, store) = seeded_store(4).await;
        let query = Query::new("SELECT user_id, name, age FROM user_data ORDER BY user_id");

        let first = with_connection(&store, async |h| h.fetch_all(&query).await).await;
        let second = with_connection(&store, async |h| h.fetch_all(&query).await).await;
        let (Ok(first), Ok(second)) = (first, second) else {
            panic!("reads failed");
        };
        assert_eq!(first, second);
    }
}
