//! Access layer: the guarantees wrapped around every store operation.
//!
//! Writes compose as retry, then transaction, then connection scope, with
//! the scope innermost. Reads go through the [`ResultCache`] over a
//! connection scope. Large result sets are walked with the iterators in
//! [`iter`], and independent reads run together with [`gather`].

pub mod cache;
pub mod fanout;
pub mod iter;
pub mod retry;
pub mod scope;
pub mod transaction;

pub use cache::{CacheEntry, ResultCache};
pub use fanout::gather;
pub use iter::{fetch_page, paginate, stream_batched_rows, stream_batches, stream_rows};
pub use retry::{RetryPolicy, with_retry};
pub use scope::{ConnectionScope, with_connection};
