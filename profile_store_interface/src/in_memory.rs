//! In-memory profile store. Nothing survives the process; `load` is a no-op.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use browser_shared_types::Profile;

use crate::{ProfileStore, Result, StoreError};

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<HashMap<String, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self) -> Result<()> {
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
        self.profiles
            .lock()
            .await
            .insert(profile.guid.clone(), profile.clone());
        Ok(profile)
    }

    async fn delete(&self, profile: &Profile) -> Result<()> {
        self.profiles.lock().await.remove(&profile.guid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assigns_guid() {
        let store = InMemoryProfileStore::new();
        let stored = store.create(Profile::new("alice")).await.unwrap();

        assert!(!stored.guid.is_empty());
        assert_eq!(store.get(&stored.guid).await.unwrap(), stored);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_returned_profiles_are_copies() {
        let store = InMemoryProfileStore::new();
        let stored = store.create(Profile::new("alice")).await.unwrap();

        let mut copy = store.get(&stored.guid).await.unwrap();
        copy.name = "mallory".to_string();

        assert_eq!(store.get(&stored.guid).await.unwrap().name, "alice");
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = InMemoryProfileStore::new();
        let err = store.get("0b7f5a4e-3d2c-4b1a-9e8f-7a6b5c4d3e2f").await.unwrap_err();
        assert!(matches!(err, StoreError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_then_empty() {
        let store = InMemoryProfileStore::new();
        let stored = store.create(Profile::new("alice")).await.unwrap();

        store.delete(&stored).await.unwrap();
        assert!(store.is_empty().await.unwrap());
        // second delete is a no-op
        store.delete(&stored).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_are_all_indexed() {
        let store = std::sync::Arc::new(InMemoryProfileStore::new());

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create(Profile::new(format!("p{}", i))).await })
            })
            .collect();

        let mut guids = std::collections::HashSet::new();
        for handle in handles {
            guids.insert(handle.await.unwrap().unwrap().guid);
        }

        assert_eq!(guids.len(), 100);
        assert_eq!(store.map().await.unwrap().len(), 100);
    }
}
