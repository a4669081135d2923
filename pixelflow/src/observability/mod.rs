//! Observability utilities.
//!
//! Components log through `tracing`; this module only installs subscribers.

mod subscriber;

pub use subscriber::{init_test_tracing, init_tracing, LogFormat, DEFAULT_FILTER};
