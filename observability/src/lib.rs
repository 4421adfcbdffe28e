//! Observability for the browser container runner.
//!
//! - **Tracing**: Structured logging through `tracing` with a
//!   `tracing-subscriber` formatter chosen at startup (pretty, compact or JSON)
//!
//! Library crates only emit events; binaries call [`init_tracing`] once.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogFormat, TracingConfig, TracingError};
