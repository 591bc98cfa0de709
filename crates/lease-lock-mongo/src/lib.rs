//! MongoDB backend for the lease-based distributed lock.
//!
//! Requires a server with document-level atomic conditional writes and TTL
//! indexes (any supported MongoDB release).

pub mod document;
pub mod store;

pub use document::LockDocument;
pub use store::MongoLockStore;
