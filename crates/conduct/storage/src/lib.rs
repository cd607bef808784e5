//! Storage for the conduct approval core.
//!
//! Every engine operation runs against one [`ConductTx`]: a unit of work that
//! either commits all of its writes or none. Adapters:
//! - [`memory::InMemoryConductStore`]: deterministic, serialized transactions
//!   for tests and development
//! - `postgres::PostgresConductStore` (feature `postgres`): the transactional
//!   source of truth with a fixed, versioned schema

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{ConductStore, ConductTx};
