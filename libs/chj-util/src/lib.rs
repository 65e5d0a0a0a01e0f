//! Utilities shared between the sprinkle crates.

pub mod slice;
pub mod warn;

// Re-exported so that the macros in `warn` can refer to it via
// `$crate` without the using crate depending on `log` itself.
pub use log;
