//! Utility functions shared by the library and the CLI.
//!
//! - **Text**: control-character stripping for untrusted metadata and
//!   Unicode-aware truncation for list output
//! - **URLs**: deciding whether an input is a link and what to open for it
//! - **Files**: atomic writes for backups

mod fs;
mod text;
mod url;

pub use fs::atomic_write;
pub use text::{clean_field, strip_control_chars, truncate_to_width};
pub use url::{is_link, link_host, open_target, UrlValidationError};

/// Maximum accepted search query length, in bytes.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
