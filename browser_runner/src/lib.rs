//! Browser container lifecycle.
//!
//! A [`Runner`] turns a [`RunOptions`] request into a running browser
//! container: it derives the image tag from the browser version, pulls the
//! image only when the engine does not have it, creates and starts a container
//! named after the request GUID and tracks it until [`Runner::close`] stops and
//! removes everything it started.
//!
//! Every engine call made on behalf of a request is bounded by a per-step
//! timeout and by the lifetime [`CancellationToken`] given at construction.

pub mod config;
pub mod error;
pub mod runner;

pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use runner::{Runner, GUID_LABEL};

pub use browser_shared_types::{ContainerId, ImageRef, RunOptions};
pub use container_engine_interface::{ContainerEngine, EngineError};
pub use tokio_util::sync::CancellationToken;
