//! Profile storage abstraction.
//!
//! [`ProfileStore`] is implemented by a directory-per-profile disk store and an
//! in-memory store. Consumers hold an `Arc<dyn ProfileStore>` chosen at startup.
//! Every implementation guards its index with a single lock per instance and
//! hands out clones of stored profiles.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

pub use browser_shared_types::{GuidError, Profile, User};

#[cfg(feature = "disk")]
pub mod disk;

#[cfg(feature = "in-memory")]
pub mod in_memory;

#[cfg(feature = "disk")]
pub use disk::{DiskProfileStore, PROFILE_DESCRIPTOR};

#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryProfileStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error(transparent)]
    InvalidGuid(#[from] GuidError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed profile descriptor {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Rebuild the in-memory index from the backing storage.
    async fn load(&self) -> Result<()>;

    async fn list(&self) -> Result<Vec<Profile>>;

    async fn map(&self) -> Result<HashMap<String, Profile>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Fails with [`StoreError::ProfileNotFound`] for an unknown id.
    async fn get(&self, id: &str) -> Result<Profile>;

    /// Persist `profile`, generating a GUID when it has none. Returns the stored copy.
    async fn create(&self, profile: Profile) -> Result<Profile>;

    /// Remove the profile with `profile.guid`. Unknown profiles are ignored.
    async fn delete(&self, profile: &Profile) -> Result<()>;
}
