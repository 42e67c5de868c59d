//! File-backed state: reply cache and session memory
//!
//! Both live in small JSON documents that are rewritten whole on every
//! change. Reads tolerate missing or corrupt files.

mod cache;
mod json_file;
mod session;

pub use cache::{ResponseCache, cache_key};
pub use json_file::load_or_default;
pub use session::SessionStore;

/// Session used when a request does not name one
pub const DEFAULT_SESSION: &str = "default";
