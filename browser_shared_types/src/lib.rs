//! Types shared by the runner, the engine implementations and the profile stores.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque container handle returned by the engine.
pub type ContainerId = String;

/// Length of a hyphenated UUID string, which is also the on-disk profile directory name.
pub const GUID_LEN: usize = 36;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuidError {
    #[error("Invalid profile GUID '{0}': expected a hyphenated UUID")]
    Invalid(String),
}

/// Generate a fresh profile identifier.
pub fn new_guid() -> String {
    Uuid::new_v4().to_string()
}

/// Check that `guid` is a canonical hyphenated UUID.
pub fn validate_guid(guid: &str) -> Result<(), GuidError> {
    if guid.len() != GUID_LEN || Uuid::parse_str(guid).is_err() {
        return Err(GuidError::Invalid(guid.to_string()));
    }
    Ok(())
}

/// Personal details attached to a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct User {
    pub name: String,
    pub last_name: String,
    pub birthday: String,
    pub mobile: String,
    pub email: String,
}

/// A persisted browser persona.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Profile {
    #[serde(rename = "GUID")]
    pub guid: String,
    pub name: String,
    pub proxy: String,
    pub user: User,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = proxy.into();
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// Assign a generated GUID when none is set, otherwise validate the given one.
    pub fn ensure_guid(&mut self) -> Result<(), GuidError> {
        if self.guid.is_empty() {
            self.guid = new_guid();
            return Ok(());
        }
        validate_guid(&self.guid)
    }
}

/// Request to start one browser container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub chrome_version: String,
    pub guid: String,
}

impl RunOptions {
    pub fn new(chrome_version: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            chrome_version: chrome_version.into(),
            guid: guid.into(),
        }
    }
}

/// `{repository}:{tag}` reference of a browser image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
