//! Domain layer: values, rows and queries.
//!
//! These are the record shapes exchanged with the store. They carry no
//! schema knowledge beyond column names and storage classes.

pub mod query;
pub mod row;
pub mod value;

pub use query::Query;
pub use row::{Batch, Columns, Page, Row, RowSet};
pub use value::{FromValue, Value};
