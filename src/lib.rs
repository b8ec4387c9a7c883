//! memoria: a personal content library.
//!
//! Save links or free text, have a hosted model classify them into a
//! title, category, summary and key points, and browse the result through
//! filtered views. Everything is kept in a local SQLite key-value store.
//!
//! - [`library`]: the item store, settings and backup import/export
//! - [`views`]: pure derivations (category tree, filtered lists, counts)
//! - [`ingest`]: the classify-or-enter-manually state machine
//! - [`classify`]: the Gemini client and connectivity tracking
//! - [`storage`]: the SQLite key-value table underneath

pub mod classify;
pub mod config;
pub mod ingest;
pub mod library;
pub mod storage;
pub mod util;
pub mod views;
