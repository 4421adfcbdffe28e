//! Disk-backed profile store.
//!
//! Layout: `{root}/{guid}/profdesc.json`. The GUID lives only in the directory
//! name; the descriptor holds `Name`, `Proxy` and `User`. Directories whose
//! name is not a UUID, or that hold no descriptor, are skipped on load.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use browser_shared_types::{validate_guid, Profile, User};

use crate::{ProfileStore, Result, StoreError};

/// Descriptor file name inside each profile directory.
pub const PROFILE_DESCRIPTOR: &str = "profdesc.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Descriptor {
    name: String,
    proxy: String,
    user: User,
}

impl Descriptor {
    fn from_profile(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            proxy: profile.proxy.clone(),
            user: profile.user.clone(),
        }
    }

    fn into_profile(self, guid: String) -> Profile {
        Profile {
            guid,
            name: self.name,
            proxy: self.proxy,
            user: self.user,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub struct DiskProfileStore {
    root: PathBuf,
    profiles: Mutex<HashMap<String, Profile>>,
}

impl DiskProfileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    /// The index starts empty; call [`ProfileStore::load`] to read existing profiles.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(io_error(&root))?;

        Ok(Self {
            root,
            profiles: Mutex::new(HashMap::new()),
        })
    }

    fn profile_dir(&self, guid: &str) -> PathBuf {
        self.root.join(guid)
    }

    async fn read_descriptor(&self, guid: &str) -> Result<Profile> {
        let path = self.profile_dir(guid).join(PROFILE_DESCRIPTOR);
        let raw = tokio::fs::read(&path).await.map_err(io_error(&path))?;
        let descriptor: Descriptor =
            serde_json::from_slice(&raw).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
        Ok(descriptor.into_profile(guid.to_string()))
    }

    async fn write_descriptor(&self, profile: &Profile) -> Result<()> {
        let dir = self.profile_dir(&profile.guid);
        tokio::fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;

        let path = dir.join(PROFILE_DESCRIPTOR);
        let tmp = dir.join(format!("{}.tmp", PROFILE_DESCRIPTOR));
        let body = serde_json::to_vec_pretty(&Descriptor::from_profile(profile)).map_err(
            |source| StoreError::Json {
                path: path.clone(),
                source,
            },
        )?;

        tokio::fs::write(&tmp, body).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error(&path))?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for DiskProfileStore {
    async fn load(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(io_error(&self.root))?;

        let mut loaded = HashMap::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.root))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await.map_err(io_error(&entry.path()))?;
            if !file_type.is_dir() || validate_guid(&name).is_err() {
                debug!("Skipping {:?}: not a profile directory", entry.path());
                continue;
            }

            let profile = match self.read_descriptor(&name).await {
                Ok(profile) => profile,
                // Left behind by an interrupted create.
                Err(StoreError::Io { path, source }) if source.kind() == ErrorKind::NotFound => {
                    warn!("Skipping {:?}: no descriptor", path);
                    continue;
                }
                Err(e) => return Err(e),
            };
            loaded.insert(name, profile);
        }

        info!("Loaded {} profile(s) from {:?}", loaded.len(), self.root);
        *self.profiles.lock().await = loaded;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Profile>> {
        Ok(self.profiles.lock().await.values().cloned().collect())
    }

    async fn map(&self) -> Result<HashMap<String, Profile>> {
        Ok(self.profiles.lock().await.clone())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.profiles.lock().await.len())
    }

    async fn get(&self, id: &str) -> Result<Profile> {
        self.profiles
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ProfileNotFound(id.to_string()))
    }

    async fn create(&self, mut profile: Profile) -> Result<Profile> {
        profile.ensure_guid()?;

        let mut profiles = self.profiles.lock().await;
        self.write_descriptor(&profile).await?;
        profiles.insert(profile.guid.clone(), profile.clone());

        debug!("Stored profile {} ({})", profile.guid, profile.name);
        Ok(profile)
    }

    async fn delete(&self, profile: &Profile) -> Result<()> {
        let mut profiles = self.profiles.lock().await;
        profiles.remove(&profile.guid);

        if validate_guid(&profile.guid).is_err() {
            warn!("Refusing to remove directory for invalid GUID {:?}", profile.guid);
            return Ok(());
        }

        let dir = self.profile_dir(&profile.guid);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!("Removed profile directory {:?}", dir),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&dir)(e)),
        }
        Ok(())
    }
}
