//! Subcommands.

pub mod profile;
pub mod run;

use std::sync::Arc;

use anyhow::Context;
use browser_runner::RunnerConfig;
use profile_store_interface::{DiskProfileStore, InMemoryProfileStore, ProfileStore};
use user_config::{EngineSettings, StorageBackend, StorageSettings};

/// Open the configured profile store. The index is empty until `load` is called.
pub async fn open_store(settings: &StorageSettings) -> anyhow::Result<Arc<dyn ProfileStore>> {
    Ok(match settings.backend {
        StorageBackend::Disk => Arc::new(
            DiskProfileStore::new(&settings.root)
                .await
                .with_context(|| format!("failed to open profile storage at {:?}", settings.root))?,
        ),
        StorageBackend::Memory => Arc::new(InMemoryProfileStore::new()),
    })
}

pub fn runner_config(engine: &EngineSettings) -> RunnerConfig {
    RunnerConfig {
        base_image: engine.base_image.clone(),
        tag_prefix: engine.tag_prefix.clone(),
        check_timeout: engine.check_timeout(),
        pull_timeout: engine.pull_timeout(),
        run_timeout: engine.run_timeout(),
        stop_timeout: engine.stop_timeout(),
        ..RunnerConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_runner_config_from_settings() {
        let engine = EngineSettings {
            pull_timeout_secs: 300,
            ..EngineSettings::default()
        };
        let config = runner_config(&engine);

        assert_eq!(config.base_image, "selenoid/vnc");
        assert_eq!(config.pull_timeout, Duration::from_secs(300));
        assert_eq!(config.check_timeout, Duration::from_millis(1000));
        assert_eq!(config.cleanup_grace, RunnerConfig::default().cleanup_grace);
    }

    #[tokio::test]
    async fn test_open_disk_store_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("profiles");
        let settings = StorageSettings {
            backend: StorageBackend::Disk,
            root: root.clone(),
        };

        let store = open_store(&settings).await.unwrap();
        store.load().await.unwrap();
        assert!(root.is_dir());
        assert!(store.is_empty().await.unwrap());
    }
}
