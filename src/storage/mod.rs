//! Local key-value persistence.
//!
//! A single SQLite table holds opaque string values under string keys. The
//! item store writes two keys (items and settings); nothing else reads them.
mod kv;
mod schema;
mod types;

pub use schema::Database;
pub use types::DatabaseError;
