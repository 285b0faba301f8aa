//! Service layer: the access guarantees composed over a store.
//!
//! [`DataGate`] owns the store, the retry policy and the result cache and
//! exposes every composition as a method.

pub mod data_gate;

pub use data_gate::DataGate;
