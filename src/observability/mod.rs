//! Log output for the `pingone-provider` binary.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to whoever embeds it.

mod tracing_init;

pub use tracing_init::*;
