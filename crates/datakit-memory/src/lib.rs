//! In-memory collaborators for datakit.
//!
//! - [`MemoryDataAccess`]: a [`DataAccess`](datakit_core::DataAccess) driver
//!   keeping tables in process memory, with journaled transactions and
//!   registered stored procedures.
//! - [`MemorySequence`]: an atomic, process-local sequence provider.
//! - [`ServiceRegistry`]: resolves default and named sequence providers.
//!
//! Useful for tests and prototypes. Nothing is persisted.

pub mod filter;
pub mod registry;
pub mod sequence;
pub mod store;

pub use registry::ServiceRegistry;
pub use sequence::MemorySequence;
pub use store::{MemoryDataAccess, MemoryTransaction, Procedure};
