//! # datagate
//!
//! Resilient data-access layer over a relational store.
//!
//! Every store operation runs inside a connection scope that is released
//! exactly once. On top of that sit a transactional executor, a fixed-delay
//! retry policy, a result cache keyed by query signature, lazy row, batch
//! and page streams, and a concurrent fan-out for independent reads.
//!
//! ## Architecture
//!
//! ```text
//! Application code
//!     │
//!     ├── DataGate (service/)
//!     │
//!     ├── RetryPolicy ─► transaction::run ─► ConnectionScope (access/)
//!     ├── ResultCache ─► ConnectionScope
//!     ├── row / batch / page streams, gather
//!     │
//!     ├── Query, Row, Value (domain/)
//!     │
//!     └── Store / StoreHandle ─► SQLite via sqlx (store/)
//! ```

pub mod access;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;

#[cfg(test)]
mod test_support;
