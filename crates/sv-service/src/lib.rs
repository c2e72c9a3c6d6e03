//! Use-case layer over the sharded vector engine.
//!
//! Callers (an HTTP or RPC transport) hand plain values to a use case; the use
//! case checks that the project and collection exist, builds domain values and
//! delegates to the storage ports.

pub mod adapters;
pub mod models;
pub mod ports;
pub mod service;
pub mod usecases;

pub use models::*;
pub use ports::{ProjectStoragePort, VectorStoragePort};
pub use service::VdbService;
