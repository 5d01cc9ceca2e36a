//! Persisted kiosk preferences
//!
//! A flat string key/value TOML file under the kiosk data folder. The only
//! key the session uses is the last selected site. File access goes through
//! `tokio::fs` since the session calls in from async operations.

use attn_common::config::StorageConfig;
use attn_common::Result;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    last_site_key: String,
}

impl PreferenceStore {
    pub fn new(root_folder: &Path, config: &StorageConfig) -> Self {
        Self {
            path: root_folder.join(&config.preferences_file),
            last_site_key: config.last_site_key.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(toml::from_str(&content)?)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.load().await {
            Ok(mut values) => values.remove(key),
            Err(e) => {
                warn!("Ignoring unreadable preferences {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking the write
        let mut values = self.load().await.unwrap_or_default();
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, toml::to_string(&values)?).await?;
        Ok(())
    }

    pub async fn last_site(&self) -> Option<String> {
        self.get(&self.last_site_key).await
    }

    pub async fn set_last_site(&self, site: &str) -> Result<()> {
        self.set(&self.last_site_key, site).await
    }
}
