//! Human-readable renderings of a compiled scope.
pub mod listing;
pub mod trace;

pub use listing::format_listing;
pub use trace::format_trace;
