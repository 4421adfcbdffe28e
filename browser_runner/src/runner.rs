//! The runner and its container registry.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use browser_shared_types::{ContainerId, ImageRef, RunOptions};
use container_engine_interface::{ContainerEngine, CreateContainerOptions, EngineError};

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};

/// Label put on every container the runner creates, holding the request GUID.
pub const GUID_LABEL: &str = "browser-runner.guid";

/// Starts browser containers and guarantees they are cleaned up on [`Runner::close`].
pub struct Runner {
    engine: Arc<dyn ContainerEngine>,
    lifetime: CancellationToken,
    config: RunnerConfig,
    /// GUID -> container id of everything created and not yet removed.
    containers: Mutex<BTreeMap<String, ContainerId>>,
}

impl Runner {
    /// Build a runner over an already connected engine.
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        lifetime: CancellationToken,
        config: RunnerConfig,
    ) -> Self {
        Self {
            engine,
            lifetime,
            config,
            containers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Connect to the local Docker daemon, negotiating the API version.
    #[cfg(feature = "docker")]
    pub async fn connect(lifetime: CancellationToken, config: RunnerConfig) -> Result<Self> {
        let engine = tokio::select! {
            biased;
            _ = lifetime.cancelled() => Err(EngineError::Cancelled),
            engine = container_engine::DockerEngine::connect() => engine,
        }
        .map_err(RunnerError::EngineUnavailable)?;

        Ok(Self::new(Arc::new(engine), lifetime, config))
    }

    /// Snapshot of the registry.
    pub async fn containers(&self) -> HashMap<String, ContainerId> {
        self.containers
            .lock()
            .await
            .iter()
            .map(|(guid, id)| (guid.clone(), id.clone()))
            .collect()
    }

    /// Run `fut` until `deadline`, failing early if the lifetime token is cancelled.
    async fn within<T, F>(
        &self,
        deadline: Instant,
        limit: Duration,
        fut: F,
    ) -> std::result::Result<T, EngineError>
    where
        F: Future<Output = std::result::Result<T, EngineError>>,
    {
        tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => Err(EngineError::Cancelled),
            res = tokio::time::timeout_at(deadline, fut) => {
                res.unwrap_or(Err(EngineError::Timeout(limit)))
            }
        }
    }

    /// Whether the engine has `{base_image}:{tag}` locally.
    pub async fn check_image(&self, tag: &str) -> Result<bool> {
        let image = self.config.image(tag);
        let limit = self.config.check_timeout;

        let images = self
            .within(Instant::now() + limit, limit, self.engine.list_images(&image))
            .await
            .map_err(|source| RunnerError::EngineQueryFailed {
                image: image.to_string(),
                source,
            })?;

        debug!("{} match(es) for {}", images.len(), image);
        Ok(!images.is_empty())
    }

    /// Pull `{base_image}:{tag}`, draining the progress stream to the end.
    pub async fn pull_image(&self, tag: &str) -> Result<()> {
        let image = self.config.image(tag);
        let limit = self.config.pull_timeout;

        info!("Pulling image {}", image);
        self.within(Instant::now() + limit, limit, self.drain_pull(&image))
            .await
            .map_err(|source| RunnerError::ImagePullFailed {
                image: image.to_string(),
                source,
            })?;

        info!("Image {} pulled", image);
        Ok(())
    }

    async fn drain_pull(&self, image: &ImageRef) -> std::result::Result<(), EngineError> {
        let mut stream = self.engine.pull_image(image).await?;
        let mut first_error = None;

        // Keep reading after an error so the transfer is consumed, not abandoned.
        while let Some(event) = stream.next().await {
            match event {
                Ok(progress) => debug!(
                    layer = progress.id.as_deref().unwrap_or("-"),
                    status = progress.status.as_deref().unwrap_or(""),
                    progress = progress.progress.as_deref().unwrap_or(""),
                    "pull {}",
                    image
                ),
                Err(e) => {
                    warn!("Pull of {} reported: {}", image, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        drop(stream);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Create a container named `guid` from `{base_image}:{tag}` and start it.
    ///
    /// The container is registered as soon as it exists, so a failed start still
    /// leaves it for [`Runner::close`] to remove.
    pub async fn run_container(&self, tag: &str, guid: &str) -> Result<ContainerId> {
        let image = self.config.image(tag);
        let limit = self.config.run_timeout;
        let deadline = Instant::now() + limit;

        let options =
            CreateContainerOptions::new(image.clone(), guid).with_label(GUID_LABEL, guid);
        let id = self
            .within(deadline, limit, self.engine.create_container(&options))
            .await
            .map_err(|source| RunnerError::ContainerCreateFailed {
                guid: guid.to_string(),
                image: image.to_string(),
                source,
            })?;

        if let Some(previous) = self
            .containers
            .lock()
            .await
            .insert(guid.to_string(), id.clone())
        {
            warn!(
                "Container {} replaced {} as the tracked container for {}",
                id, previous, guid
            );
        }
        debug!("Container {} registered for {}", id, guid);

        self.within(deadline, limit, self.engine.start_container(&id))
            .await
            .map_err(|source| RunnerError::ContainerStartFailed {
                guid: guid.to_string(),
                container_id: id.clone(),
                source,
            })?;

        info!("Container {} started for {} from {}", id, guid, image);
        Ok(id)
    }

    /// Check for the image, pull it if absent, then run the container.
    #[instrument(skip_all, fields(guid = %options.guid, version = %options.chrome_version))]
    pub async fn run_browser(&self, options: &RunOptions) -> Result<ContainerId> {
        let tag = self.config.tag_for(&options.chrome_version);
        validate_request(options, &tag)?;

        if self.containers.lock().await.contains_key(&options.guid) {
            return Err(RunnerError::AlreadyRunning(options.guid.clone()));
        }

        if self.check_image(&tag).await? {
            debug!("Image tag {} already present", tag);
        } else {
            self.pull_image(&tag).await?;
        }

        self.run_container(&tag, &options.guid).await
    }

    /// Stop and remove every tracked container, then close the engine handle.
    ///
    /// Cleanup continues past individual failures; containers that could not be
    /// removed stay registered and the first failure is returned. The engine
    /// handle is closed in every case. Cleanup is bounded by timeouts only, not
    /// by the lifetime token, since it normally runs after cancellation.
    pub async fn close(&self) -> Result<()> {
        let mut containers = self.containers.lock().await;
        let tracked: Vec<(String, ContainerId)> = containers
            .iter()
            .map(|(guid, id)| (guid.clone(), id.clone()))
            .collect();

        info!("Closing runner, {} container(s) to clean up", tracked.len());

        let mut first_error = None;
        for (guid, id) in tracked {
            match self.cleanup(&id).await {
                Ok(()) => {
                    containers.remove(&guid);
                    info!("Container {} ({}) stopped and removed", id, guid);
                }
                Err(e) => {
                    error!("Container {} ({}) left behind: {}", id, guid, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        drop(containers);

        if let Err(source) = self.engine.close().await {
            error!("Failed to close engine handle: {}", source);
            first_error.get_or_insert(RunnerError::CleanupFailed {
                step: "close",
                target: "engine handle".to_string(),
                source,
            });
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn cleanup(&self, id: &ContainerId) -> Result<()> {
        let limit = self.config.cleanup_timeout();
        let failed = |step: &'static str| {
            move |source: EngineError| RunnerError::CleanupFailed {
                step,
                target: id.clone(),
                source,
            }
        };

        bounded(limit, self.engine.stop_container(id, self.config.stop_timeout))
            .await
            .map_err(failed("stop"))?;
        bounded(limit, self.engine.remove_container(id))
            .await
            .map_err(failed("remove"))?;
        Ok(())
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> std::result::Result<T, EngineError>
where
    F: Future<Output = std::result::Result<T, EngineError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(EngineError::Timeout(limit)))
}

/// Longest image tag the registry accepts.
const MAX_TAG_LEN: usize = 128;

/// Reject requests that cannot name an image tag or a container.
fn validate_request(options: &RunOptions, tag: &str) -> Result<()> {
    let version = options.chrome_version.as_str();
    if version.is_empty()
        || !version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(RunnerError::InvalidRequest(format!(
            "browser version {:?} cannot be used in an image tag",
            version
        )));
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(RunnerError::InvalidRequest(format!(
            "image tag {:?} is longer than {} characters",
            tag, MAX_TAG_LEN
        )));
    }

    // Docker container name rules: [a-zA-Z0-9][a-zA-Z0-9_.-]+
    let guid = options.guid.as_str();
    let valid_name = guid.len() >= 2
        && guid
            .chars()
            .next()
            .map(|c| c.is_ascii_alphanumeric())
            .unwrap_or(false)
        && guid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid_name {
        return Err(RunnerError::InvalidRequest(format!(
            "guid {:?} is not a valid container name",
            guid
        )));
    }
    Ok(())
}
