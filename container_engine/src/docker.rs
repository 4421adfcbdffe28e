//! Docker-backed container engine.
//!
//! Connects to the local daemon with `bollard`, honouring `DOCKER_HOST`, and
//! negotiates the API version on connect so an unreachable daemon is detected
//! up front rather than on the first request.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, ListImagesOptionsBuilder,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptionsBuilder,
};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, info};

use container_engine_interface::{
    ContainerEngine, ContainerId, CreateContainerOptions, EngineError, ImageRef, ImageSummary,
    PullProgress, PullStream, Result,
};

/// Docker engine handle. The client is dropped on [`ContainerEngine::close`].
pub struct DockerEngine {
    docker: RwLock<Option<Docker>>,
}

impl DockerEngine {
    /// Connect with local defaults and negotiate the API version.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        let docker = docker
            .negotiate_version()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        info!("Connected to Docker engine");
        Ok(Self {
            docker: RwLock::new(Some(docker)),
        })
    }

    fn client(&self) -> Result<Docker> {
        let guard = self.docker.read().map_err(|_| EngineError::Closed)?;
        guard.as_ref().cloned().ok_or(EngineError::Closed)
    }
}

fn api_error(operation: &'static str, err: BollardError) -> EngineError {
    EngineError::Api {
        operation,
        message: err.to_string(),
    }
}

fn status_code(err: &BollardError) -> Option<u16> {
    match err {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn list_images(&self, image: &ImageRef) -> Result<Vec<ImageSummary>> {
        let reference = image.to_string();
        let filters = HashMap::from([("reference", vec![reference.as_str()])]);
        let options = ListImagesOptionsBuilder::default().filters(&filters).build();

        let images = self
            .client()?
            .list_images(Some(options))
            .await
            .map_err(|e| api_error("list_images", e))?;

        debug!("{} local image(s) match {}", images.len(), reference);
        Ok(images
            .into_iter()
            .map(|summary| ImageSummary {
                id: summary.id,
                repo_tags: summary.repo_tags,
            })
            .collect())
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<PullStream> {
        let options = CreateImageOptionsBuilder::default()
            .from_image(&image.repository)
            .tag(&image.tag)
            .build();

        let stream = self
            .client()?
            .create_image(Some(options), None, None)
            .map(|item| match item {
                Ok(info) => Ok(PullProgress {
                    id: info.id,
                    status: info.status,
                    progress: info.progress,
                }),
                Err(e) => Err(EngineError::Pull(e.to_string())),
            });

        Ok(stream.boxed())
    }

    async fn create_container(&self, options: &CreateContainerOptions) -> Result<ContainerId> {
        let body = ContainerCreateBody {
            image: Some(options.image.to_string()),
            labels: Some(options.labels.clone()),
            ..ContainerCreateBody::default()
        };

        let response = self
            .client()?
            .create_container(
                Some(
                    CreateContainerOptionsBuilder::default()
                        .name(&options.name)
                        .build(),
                ),
                body,
            )
            .await
            .map_err(|e| api_error("create_container", e))?;

        Ok(response.id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<()> {
        self.client()?
            .start_container(id, None::<StartContainerOptions>)
            .await
            .map_err(|e| match status_code(&e) {
                Some(404) => EngineError::ContainerNotFound(id.clone()),
                _ => api_error("start_container", e),
            })
    }

    async fn stop_container(&self, id: &ContainerId, timeout: Duration) -> Result<()> {
        let seconds = i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX);
        let result = self
            .client()?
            .stop_container(id, Some(StopContainerOptionsBuilder::default().t(seconds).build()))
            .await;

        match result {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(e) if status_code(&e) == Some(304) => Ok(()),
            Err(e) if status_code(&e) == Some(404) => {
                Err(EngineError::ContainerNotFound(id.clone()))
            }
            Err(e) => Err(api_error("stop_container", e)),
        }
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        self.client()?
            .remove_container(id, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| match status_code(&e) {
                Some(404) => EngineError::ContainerNotFound(id.clone()),
                _ => api_error("remove_container", e),
            })
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.docker.write().map_err(|_| EngineError::Closed)?;
        if guard.take().is_some() {
            debug!("Docker client released");
        }
        Ok(())
    }
}
