//! Runner configuration.

use std::time::Duration;

use browser_shared_types::ImageRef;

/// Image naming and timeouts used by [`crate::Runner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Repository of the browser image family, without tag.
    pub base_image: String,
    /// Prepended to the browser version to form the image tag.
    pub tag_prefix: String,
    pub check_timeout: Duration,
    /// Covers the whole pull, including draining the progress stream.
    pub pull_timeout: Duration,
    /// Covers create and start together.
    pub run_timeout: Duration,
    /// Passed to the engine when stopping a container.
    pub stop_timeout: Duration,
    /// Extra time a stop or remove call may take on top of `stop_timeout` during cleanup.
    pub cleanup_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_image: "selenoid/vnc".to_string(),
            tag_prefix: "chrome_".to_string(),
            check_timeout: Duration::from_secs(1),
            pull_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(5),
            cleanup_grace: Duration::from_secs(10),
        }
    }
}

impl RunnerConfig {
    /// Image tag for a browser version, e.g. `90.0` -> `chrome_90.0`.
    pub fn tag_for(&self, chrome_version: &str) -> String {
        format!("{}{}", self.tag_prefix, chrome_version)
    }

    pub fn image(&self, tag: &str) -> ImageRef {
        ImageRef::new(self.base_image.clone(), tag)
    }

    pub(crate) fn cleanup_timeout(&self) -> Duration {
        self.stop_timeout + self.cleanup_grace
    }
}
