//! rollcall-store — durable identity and attendance collections.
//!
//! Two independent collections, each persisted as a JSON document through
//! an abstract key-value surface ([`kv::KeyValueStore`]). [`kv::SqliteKv`]
//! is the production backend; [`kv::MemoryKv`] backs tests.

pub mod error;
pub mod identity_store;
pub mod kv;
pub mod ledger;

pub use error::StoreError;
pub use identity_store::IdentityStore;
pub use kv::{KeyValueStore, MemoryKv, SqliteKv};
pub use ledger::{AttendanceLedger, MarkOutcome};
