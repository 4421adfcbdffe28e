//! Disk store behaviour against a real temporary directory.

use std::collections::HashSet;
use std::sync::Arc;

use profile_store_interface::{
    DiskProfileStore, Profile, ProfileStore, StoreError, User, PROFILE_DESCRIPTOR,
};
use tempfile::TempDir;
use uuid::Uuid;

fn sample_profile() -> Profile {
    Profile::new("Anna")
        .with_proxy("http://10.0.0.7:3128")
        .with_user(User {
            name: "Anna".to_string(),
            last_name: "Smirnova".to_string(),
            birthday: "1990-04-12".to_string(),
            mobile: "+10000000000".to_string(),
            email: "anna@example.com".to_string(),
        })
}

#[tokio::test]
async fn test_create_then_load_round_trip() {
    let dir = TempDir::new().unwrap();

    let store = DiskProfileStore::new(dir.path()).await.unwrap();
    let created = store.create(sample_profile()).await.unwrap();

    let reopened = DiskProfileStore::new(dir.path()).await.unwrap();
    reopened.load().await.unwrap();

    let loaded = reopened.get(&created.guid).await.unwrap();
    assert_eq!(loaded.name, "Anna");
    assert_eq!(loaded.proxy, "http://10.0.0.7:3128");
    assert_eq!(loaded, created);
}

#[tokio::test]
async fn test_guid_is_directory_name_not_body() {
    let dir = TempDir::new().unwrap();
    let store = DiskProfileStore::new(dir.path()).await.unwrap();
    let created = store.create(sample_profile()).await.unwrap();

    let path = dir.path().join(&created.guid).join(PROFILE_DESCRIPTOR);
    let body: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();

    assert_eq!(body["Name"], "Anna");
    assert_eq!(body["User"]["LastName"], "Smirnova");
    assert!(body.get("GUID").is_none());
}

#[tokio::test]
async fn test_get_unknown_guid_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = DiskProfileStore::new(dir.path()).await.unwrap();
    store.load().await.unwrap();

    let missing = Uuid::new_v4().to_string();
    match store.get(&missing).await {
        Err(StoreError::ProfileNotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected ProfileNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_load_skips_foreign_entries() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("not-a-profile")).unwrap();
    std::fs::write(dir.path().join("README"), "notes").unwrap();

    let store = DiskProfileStore::new(dir.path()).await.unwrap();
    store.create(sample_profile()).await.unwrap();

    let reopened = DiskProfileStore::new(dir.path()).await.unwrap();
    reopened.load().await.unwrap();
    assert_eq!(reopened.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_load_fails_on_malformed_descriptor() {
    let dir = TempDir::new().unwrap();
    let guid = Uuid::new_v4().to_string();
    std::fs::create_dir(dir.path().join(&guid)).unwrap();
    std::fs::write(dir.path().join(&guid).join(PROFILE_DESCRIPTOR), "{not json").unwrap();

    let store = DiskProfileStore::new(dir.path()).await.unwrap();
    assert!(matches!(
        store.load().await,
        Err(StoreError::Json { .. })
    ));
}

#[tokio::test]
async fn test_load_skips_directory_without_descriptor() {
    let dir = TempDir::new().unwrap();
    let store = DiskProfileStore::new(dir.path()).await.unwrap();
    let created = store.create(sample_profile()).await.unwrap();

    // Interrupted create: directory and temp file, no descriptor.
    let partial = dir.path().join(Uuid::new_v4().to_string());
    std::fs::create_dir(&partial).unwrap();
    std::fs::write(partial.join(format!("{}.tmp", PROFILE_DESCRIPTOR)), "{").unwrap();

    let reopened = DiskProfileStore::new(dir.path()).await.unwrap();
    reopened.load().await.unwrap();
    assert_eq!(reopened.len().await.unwrap(), 1);
    assert_eq!(reopened.get(&created.guid).await.unwrap(), created);
}

#[tokio::test]
async fn test_create_rejects_invalid_guid() {
    let dir = TempDir::new().unwrap();
    let store = DiskProfileStore::new(dir.path()).await.unwrap();

    let mut profile = sample_profile();
    profile.guid = "../escape".to_string();

    assert!(matches!(
        store.create(profile).await,
        Err(StoreError::InvalidGuid(_))
    ));
    assert!(!dir.path().parent().unwrap().join("escape").exists());
}

#[tokio::test]
async fn test_create_with_existing_guid_overwrites() {
    let dir = TempDir::new().unwrap();
    let store = DiskProfileStore::new(dir.path()).await.unwrap();
    let created = store.create(sample_profile()).await.unwrap();

    let mut updated = created.clone();
    updated.proxy = "socks5://10.0.0.8:1080".to_string();
    store.create(updated).await.unwrap();

    let reopened = DiskProfileStore::new(dir.path()).await.unwrap();
    reopened.load().await.unwrap();
    assert_eq!(reopened.len().await.unwrap(), 1);
    assert_eq!(
        reopened.get(&created.guid).await.unwrap().proxy,
        "socks5://10.0.0.8:1080"
    );
}

#[tokio::test]
async fn test_delete_removes_directory() {
    let dir = TempDir::new().unwrap();
    let store = DiskProfileStore::new(dir.path()).await.unwrap();
    let created = store.create(sample_profile()).await.unwrap();

    store.delete(&created).await.unwrap();

    assert!(!dir.path().join(&created.guid).exists());
    assert!(matches!(
        store.get(&created.guid).await,
        Err(StoreError::ProfileNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_guids() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(DiskProfileStore::new(dir.path()).await.unwrap());

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.create(Profile::new(format!("p{}", i))).await })
        })
        .collect();

    let mut guids = HashSet::new();
    for handle in handles {
        let profile = handle.await.unwrap().unwrap();
        guids.insert(profile.guid);
    }

    assert_eq!(guids.len(), 100);
    assert_eq!(store.len().await.unwrap(), 100);
}
