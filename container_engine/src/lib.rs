//! Container engine implementations for the browser runner.
//!
//! This crate provides implementations of the `ContainerEngine` trait:
//! - `MockEngine`: In-memory engine that records calls and injects failures (default)
//! - `DockerEngine`: Local Docker daemon through `bollard` (requires `docker-engine` feature)

#[cfg(feature = "mock-engine")]
pub mod mock;

#[cfg(feature = "docker-engine")]
pub mod docker;

// Re-export common types
pub use container_engine_interface::{
    ContainerEngine, CreateContainerOptions, EngineError, ImageSummary, PullProgress, PullStream,
};

#[cfg(feature = "mock-engine")]
pub use mock::{EngineCall, MockEngine, MockOp};

#[cfg(feature = "docker-engine")]
pub use docker::DockerEngine;
