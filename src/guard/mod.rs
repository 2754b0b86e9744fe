//! Path containment checks for uploaded documents and the static file catch-all.

mod paths;
mod static_files;

pub use paths::{is_contained, normalize_lexically, resolve_and_check};
pub use static_files::{StaticGuard, StaticOutcome, DEFAULT_STATIC_EXTENSIONS};
