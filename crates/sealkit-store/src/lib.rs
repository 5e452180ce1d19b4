//! # Sealkit Store
//!
//! Storage abstraction for sealkit entities. Provides a trait-based
//! interface over user, device, group, and document records with an
//! in-memory implementation.
//!
//! ## Concurrency Model
//!
//! Groups and documents are versioned: every mutation reads the entity at
//! some version, computes its change, and commits with the version it
//! read. A commit against a stale version returns
//! [`UpdateResult::VersionConflict`] and the caller retries from a fresh
//! read. There is no global lock; operations on different entities never
//! block each other.
//!
//! The backing service is the only blocking point in the system, so every
//! method is async and fallible. Ambiguous-outcome errors (a commit whose
//! confirmation was lost) surface as [`StoreError::Backend`]; callers
//! must never retry those automatically, or a key rotation could apply
//! twice.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use traits::{Store, UpdateResult};
