//! Contract between the browser runner and a container engine.
//!
//! The runner only talks to the engine through [`ContainerEngine`], so the
//! Docker-backed implementation and the in-memory mock are interchangeable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use browser_shared_types::{ContainerId, ImageRef};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine connection failed: {0}")]
    Connection(String),

    #[error("Engine API error during {operation}: {message}")]
    Api { operation: &'static str, message: String },

    #[error("No such container: {0}")]
    ContainerNotFound(ContainerId),

    #[error("Image pull reported an error: {0}")]
    Pull(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Engine handle is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Image entry returned by [`ContainerEngine::list_images`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    pub repo_tags: Vec<String>,
}

/// One progress event of an image pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullProgress {
    /// Layer id, when the event concerns a single layer.
    pub id: Option<String>,
    pub status: Option<String>,
    pub progress: Option<String>,
}

/// Progress stream of an in-flight pull. Dropping it aborts the transfer.
pub type PullStream = BoxStream<'static, Result<PullProgress>>;

/// Parameters for [`ContainerEngine::create_container`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainerOptions {
    pub image: ImageRef,
    /// Container name; the runner uses the request GUID.
    pub name: String,
    pub labels: HashMap<String, String>,
}

impl CreateContainerOptions {
    pub fn new(image: ImageRef, name: impl Into<String>) -> Self {
        Self {
            image,
            name: name.into(),
            labels: HashMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Images whose reference matches `image` exactly.
    async fn list_images(&self, image: &ImageRef) -> Result<Vec<ImageSummary>>;

    /// Start pulling `image`. The pull is complete once the stream is exhausted.
    async fn pull_image(&self, image: &ImageRef) -> Result<PullStream>;

    async fn create_container(&self, options: &CreateContainerOptions) -> Result<ContainerId>;

    async fn start_container(&self, id: &ContainerId) -> Result<()>;

    /// Ask the container to stop, killing it once `timeout` elapses.
    async fn stop_container(&self, id: &ContainerId, timeout: Duration) -> Result<()>;

    async fn remove_container(&self, id: &ContainerId) -> Result<()>;

    /// Release the engine handle. Calls after `close` fail with [`EngineError::Closed`].
    async fn close(&self) -> Result<()>;
}
