//! Profile command - manage stored browser profiles.

use std::sync::Arc;

use clap::{Args, Subcommand};
use tabled::Tabled;

use browser_shared_types::{Profile, User};
use profile_store_interface::ProfileStore;

use crate::output;
use crate::OutputFormat;

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// List stored profiles
    List,
    /// Show one profile
    Show {
        /// Profile GUID
        guid: String,
    },
    /// Create or overwrite a profile
    Create(CreateArgs),
    /// Delete a profile and its directory
    Delete {
        /// Profile GUID
        guid: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Display name
    #[arg(short, long)]
    pub name: String,

    /// Proxy address used by the browser
    #[arg(long, default_value = "")]
    pub proxy: String,

    /// Explicit GUID. A new one is generated when omitted
    #[arg(long)]
    pub guid: Option<String>,

    #[arg(long, default_value = "")]
    pub first_name: String,

    #[arg(long, default_value = "")]
    pub last_name: String,

    #[arg(long, default_value = "")]
    pub birthday: String,

    #[arg(long, default_value = "")]
    pub mobile: String,

    #[arg(long, default_value = "")]
    pub email: String,
}

impl CreateArgs {
    fn into_profile(self) -> Profile {
        let mut profile = Profile::new(self.name)
            .with_proxy(self.proxy)
            .with_user(User {
                name: self.first_name,
                last_name: self.last_name,
                birthday: self.birthday,
                mobile: self.mobile,
                email: self.email,
            });
        if let Some(guid) = self.guid {
            profile.guid = guid;
        }
        profile
    }
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "GUID")]
    guid: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PROXY")]
    proxy: String,
    #[tabled(rename = "USER")]
    user: String,
    #[tabled(rename = "EMAIL")]
    email: String,
}

impl From<&Profile> for ProfileRow {
    fn from(profile: &Profile) -> Self {
        let user = format!("{} {}", profile.user.name, profile.user.last_name);
        Self {
            guid: profile.guid.clone(),
            name: profile.name.clone(),
            proxy: or_dash(&profile.proxy),
            user: or_dash(user.trim()),
            email: or_dash(&profile.user.email),
        }
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Execute a profile subcommand against a loaded store.
pub async fn execute(
    action: ProfileCommand,
    store: Arc<dyn ProfileStore>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match action {
        ProfileCommand::List => {
            let mut profiles = store.list().await?;
            profiles.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.guid.cmp(&b.guid)));

            if format == OutputFormat::Table {
                output::section(&format!("Profiles ({})", profiles.len()));
            }
            output::print_data(&profiles, format, |p| ProfileRow::from(p))?;
        }
        ProfileCommand::Show { guid } => {
            let profile = store.get(&guid).await?;
            output::print_item(&profile, format, |p| ProfileRow::from(p))?;
        }
        ProfileCommand::Create(args) => {
            let profile = store.create(args.into_profile()).await?;
            output::success(&format!("Saved profile {} ({})", profile.name, profile.guid));
        }
        ProfileCommand::Delete { guid } => {
            let profile = store.get(&guid).await?;
            store.delete(&profile).await?;
            output::success(&format!("Deleted profile {}", guid));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile_store_interface::{DiskProfileStore, StoreError};

    async fn disk_store(root: &std::path::Path) -> Arc<dyn ProfileStore> {
        let store = DiskProfileStore::new(root).await.unwrap();
        store.load().await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_create_then_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = disk_store(dir.path()).await;

        let args = CreateArgs {
            name: "work".to_string(),
            proxy: "socks5://127.0.0.1:1080".to_string(),
            email: "a@example.com".to_string(),
            ..CreateArgs::default()
        };
        execute(ProfileCommand::Create(args), store.clone(), OutputFormat::Json)
            .await
            .unwrap();

        let reopened = disk_store(dir.path()).await;
        let profiles = reopened.list().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "work");
        assert_eq!(profiles[0].proxy, "socks5://127.0.0.1:1080");
        assert_eq!(profiles[0].user.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_guid() {
        let dir = tempfile::tempdir().unwrap();
        let store = disk_store(dir.path()).await;

        let args = CreateArgs {
            name: "bad".to_string(),
            guid: Some("../escape".to_string()),
            ..CreateArgs::default()
        };
        let err = execute(ProfileCommand::Create(args), store.clone(), OutputFormat::Table)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidGuid(_))
        ));
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = disk_store(dir.path()).await;
        let saved = store.create(Profile::new("temp")).await.unwrap();

        execute(
            ProfileCommand::Delete {
                guid: saved.guid.clone(),
            },
            store.clone(),
            OutputFormat::Table,
        )
        .await
        .unwrap();

        assert!(store.is_empty().await.unwrap());
        assert!(!dir.path().join(&saved.guid).exists());
    }

    #[tokio::test]
    async fn test_show_unknown_profile_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = disk_store(dir.path()).await;

        let err = execute(
            ProfileCommand::Show {
                guid: browser_shared_types::new_guid(),
            },
            store,
            OutputFormat::Yaml,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_row_fills_blanks() {
        let row = ProfileRow::from(&Profile::new("plain"));
        assert_eq!(row.proxy, "-");
        assert_eq!(row.user, "-");
        assert_eq!(row.email, "-");
    }
}
