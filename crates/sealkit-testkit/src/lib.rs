//! # Sealkit Testkit
//!
//! Testing utilities for sealkit.
//!
//! ## Fixtures
//!
//! [`TestFixture`] wires an in-memory store to per-user SDK sessions with
//! one call per user:
//!
//! ```rust,ignore
//! use sealkit_testkit::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let alice = fixture.user_with_device("alice").await?;
//! let bob = fixture.user_with_device("bob").await?;
//! ```
//!
//! ## Generators
//!
//! Proptest strategies for identifiers, classifications, rule sets, and
//! payloads:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealkit_testkit::generators;
//!
//! proptest! {
//!     #[test]
//!     fn roundtrip(value in generators::field_value()) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{init_tracing, TestFixture};
