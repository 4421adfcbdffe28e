//! In-memory container engine.
//!
//! Keeps images and containers in a map, records every call in order and can
//! be told to fail specific operations, optionally for a single container.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tracing::debug;

use container_engine_interface::{
    ContainerEngine, ContainerId, CreateContainerOptions, EngineError, ImageRef, ImageSummary,
    PullProgress, PullStream, Result,
};

/// Engine operation, used for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListImages,
    PullImage,
    CreateContainer,
    StartContainer,
    StopContainer,
    RemoveContainer,
    Close,
}

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    ListImages(String),
    PullImage(String),
    CreateContainer { image: String, name: String },
    StartContainer(ContainerId),
    StopContainer(ContainerId),
    RemoveContainer(ContainerId),
    Close,
}

impl EngineCall {
    pub fn op(&self) -> MockOp {
        match self {
            EngineCall::ListImages(_) => MockOp::ListImages,
            EngineCall::PullImage(_) => MockOp::PullImage,
            EngineCall::CreateContainer { .. } => MockOp::CreateContainer,
            EngineCall::StartContainer(_) => MockOp::StartContainer,
            EngineCall::StopContainer(_) => MockOp::StopContainer,
            EngineCall::RemoveContainer(_) => MockOp::RemoveContainer,
            EngineCall::Close => MockOp::Close,
        }
    }
}

#[derive(Debug, Clone)]
struct MockContainer {
    name: String,
    image: String,
    running: bool,
}

#[derive(Default)]
struct MockState {
    images: HashSet<String>,
    containers: HashMap<ContainerId, MockContainer>,
    calls: Vec<EngineCall>,
    next_id: u64,
    closed: bool,
    /// Operations failing for every target.
    failing: HashSet<MockOp>,
    /// Operations failing for one container id or name.
    failing_for: HashSet<(MockOp, String)>,
    pull_error: Option<String>,
}

/// In-memory [`ContainerEngine`].
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
    latency: Option<Duration>,
    pull_events_seen: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `image` is already present locally.
    pub fn with_image(self, image: &ImageRef) -> Self {
        self.lock().images.insert(image.to_string());
        self
    }

    /// Delay every operation, to exercise timeouts and cancellation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every call of `op` fail.
    pub fn fail(&self, op: MockOp) {
        self.lock().failing.insert(op);
    }

    /// Make `op` fail only when it targets the container with this id or name.
    pub fn fail_for(&self, op: MockOp, target: impl Into<String>) {
        self.lock().failing_for.insert((op, target.into()));
    }

    /// Report an error halfway through the pull stream.
    pub fn fail_pull_midstream(&self, message: impl Into<String>) {
        self.lock().pull_error = Some(message.into());
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: MockOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn has_image(&self, image: &ImageRef) -> bool {
        self.lock().images.contains(&image.to_string())
    }

    /// Ids of containers that exist on the engine, running or not.
    pub fn container_ids(&self) -> Vec<ContainerId> {
        let mut ids: Vec<_> = self.lock().containers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_running(&self, id: &ContainerId) -> bool {
        self.lock()
            .containers
            .get(id)
            .map(|c| c.running)
            .unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of pull stream items consumed by the caller.
    pub fn pull_events_seen(&self) -> usize {
        self.pull_events_seen.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Record `call` and decide whether it fails.
    fn enter(&self, call: EngineCall, target: Option<&str>) -> Result<()> {
        let mut state = self.lock();
        let op = call.op();
        state.calls.push(call);

        if state.closed && op != MockOp::Close {
            return Err(EngineError::Closed);
        }

        let name = target.and_then(|id| state.containers.get(id).map(|c| c.name.clone()));
        let targeted = |key: &str| state.failing_for.contains(&(op, key.to_string()));
        let fails = state.failing.contains(&op)
            || target.map(targeted).unwrap_or(false)
            || name.as_deref().map(targeted).unwrap_or(false);

        if fails {
            return Err(EngineError::Api {
                operation: op_name(op),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

fn op_name(op: MockOp) -> &'static str {
    match op {
        MockOp::ListImages => "list_images",
        MockOp::PullImage => "pull_image",
        MockOp::CreateContainer => "create_container",
        MockOp::StartContainer => "start_container",
        MockOp::StopContainer => "stop_container",
        MockOp::RemoveContainer => "remove_container",
        MockOp::Close => "close",
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn list_images(&self, image: &ImageRef) -> Result<Vec<ImageSummary>> {
        self.delay().await;
        let reference = image.to_string();
        self.enter(EngineCall::ListImages(reference.clone()), None)?;

        let state = self.lock();
        Ok(state
            .images
            .iter()
            .filter(|tag| **tag == reference)
            .map(|tag| ImageSummary {
                id: format!("sha256:{}", tag.len()),
                repo_tags: vec![tag.clone()],
            })
            .collect())
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<PullStream> {
        self.delay().await;
        let reference = image.to_string();
        self.enter(EngineCall::PullImage(reference.clone()), None)?;

        let mut events = vec![
            Ok(PullProgress {
                id: Some(image.tag.clone()),
                status: Some("Pulling from ".to_string() + &image.repository),
                progress: None,
            }),
            Ok(PullProgress {
                id: Some("layer-1".to_string()),
                status: Some("Downloading".to_string()),
                progress: Some("[=====>    ]".to_string()),
            }),
        ];

        let mut state = self.lock();
        match state.pull_error.clone() {
            Some(message) => events.push(Err(EngineError::Pull(message))),
            None => {
                state.images.insert(reference.clone());
            }
        }
        events.push(Ok(PullProgress {
            id: None,
            status: Some(format!("Status: finished {}", reference)),
            progress: None,
        }));
        drop(state);

        let seen = Arc::clone(&self.pull_events_seen);
        Ok(stream::iter(events)
            .inspect(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }

    async fn create_container(&self, options: &CreateContainerOptions) -> Result<ContainerId> {
        self.delay().await;
        let image = options.image.to_string();
        self.enter(
            EngineCall::CreateContainer {
                image: image.clone(),
                name: options.name.clone(),
            },
            Some(&options.name),
        )?;

        let mut state = self.lock();
        if !state.images.contains(&image) {
            return Err(EngineError::Api {
                operation: "create_container",
                message: format!("No such image: {}", image),
            });
        }
        if state.containers.values().any(|c| c.name == options.name) {
            return Err(EngineError::Api {
                operation: "create_container",
                message: format!("Conflict: name {} already in use", options.name),
            });
        }

        state.next_id += 1;
        let id = format!("mock-{:04}", state.next_id);
        state.containers.insert(
            id.clone(),
            MockContainer {
                name: options.name.clone(),
                image,
                running: false,
            },
        );
        debug!("MockEngine: created {} ({})", id, options.name);
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<()> {
        self.delay().await;
        self.enter(EngineCall::StartContainer(id.clone()), Some(id))?;

        let mut state = self.lock();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| EngineError::ContainerNotFound(id.clone()))?;
        container.running = true;
        debug!("MockEngine: started {} from {}", id, container.image);
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, _timeout: Duration) -> Result<()> {
        self.delay().await;
        self.enter(EngineCall::StopContainer(id.clone()), Some(id))?;

        let mut state = self.lock();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| EngineError::ContainerNotFound(id.clone()))?;
        container.running = false;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        self.delay().await;
        self.enter(EngineCall::RemoveContainer(id.clone()), Some(id))?;

        let mut state = self.lock();
        match state.containers.get(id) {
            None => Err(EngineError::ContainerNotFound(id.clone())),
            Some(c) if c.running => Err(EngineError::Api {
                operation: "remove_container",
                message: format!("Conflict: container {} is running", id),
            }),
            Some(_) => {
                state.containers.remove(id);
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.enter(EngineCall::Close, None)?;
        self.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageRef {
        ImageRef::new("selenoid/vnc", "chrome_90.0")
    }

    #[tokio::test]
    async fn test_list_images_matches_exact_reference() {
        let engine = MockEngine::new().with_image(&image());

        assert_eq!(engine.list_images(&image()).await.unwrap().len(), 1);
        let other = ImageRef::new("selenoid/vnc", "chrome_91.0");
        assert!(engine.list_images(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pull_makes_image_available() {
        let engine = MockEngine::new();
        let events: Vec<_> = engine.pull_image(&image()).await.unwrap().collect().await;

        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.is_ok()));
        assert!(engine.has_image(&image()));
        assert_eq!(engine.pull_events_seen(), 3);
    }

    #[tokio::test]
    async fn test_container_lifecycle() {
        let engine = MockEngine::new().with_image(&image());
        let id = engine
            .create_container(&CreateContainerOptions::new(image(), "guid-1"))
            .await
            .unwrap();

        engine.start_container(&id).await.unwrap();
        assert!(engine.is_running(&id));
        assert!(engine.remove_container(&id).await.is_err());

        engine.stop_container(&id, Duration::from_secs(5)).await.unwrap();
        engine.remove_container(&id).await.unwrap();
        assert!(engine.container_ids().is_empty());
    }

    #[tokio::test]
    async fn test_targeted_failure_by_name() {
        let engine = MockEngine::new().with_image(&image());
        engine.fail_for(MockOp::StartContainer, "guid-2");

        let first = engine
            .create_container(&CreateContainerOptions::new(image(), "guid-1"))
            .await
            .unwrap();
        let second = engine
            .create_container(&CreateContainerOptions::new(image(), "guid-2"))
            .await
            .unwrap();

        assert!(engine.start_container(&first).await.is_ok());
        assert!(engine.start_container(&second).await.is_err());
    }

    #[tokio::test]
    async fn test_calls_after_close_fail() {
        let engine = MockEngine::new();
        engine.close().await.unwrap();

        assert!(matches!(
            engine.list_images(&image()).await,
            Err(EngineError::Closed)
        ));
        assert_eq!(engine.count(MockOp::Close), 1);
    }
}
