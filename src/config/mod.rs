use crate::approval::{DEFAULT_BACKFILL_NOTE, DEFAULT_COLLECTION};
use crate::auth::AdminTokenEntry;
use crate::identity::DEFAULT_PAGE_SIZE;
use crate::utils::{get_daemon_home, is_valid_key, CONFIG_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to determine home directory")]
    HomeDirNotFound,

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_bulk_approve_attribution() -> String {
    "auto-approve".to_string()
}

fn default_backfill_attribution() -> String {
    "migration".to_string()
}

fn default_backfill_note() -> String {
    DEFAULT_BACKFILL_NOTE.to_string()
}

fn default_identity_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Daemon configuration, stored as `config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Top-level store key holding approval records
    #[serde(default = "default_collection")]
    pub collection: String,

    /// `approvedBy` written by bulk approval when the caller gives none
    #[serde(default = "default_bulk_approve_attribution")]
    pub bulk_approve_attribution: String,

    /// `approvedBy` written by backfill when the caller gives none
    #[serde(default = "default_backfill_attribution")]
    pub backfill_attribution: String,

    /// `note` stored on backfilled records
    #[serde(default = "default_backfill_note")]
    pub backfill_note: String,

    /// JSON file holding the record store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Identity provider account export used as the backfill source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_export_path: Option<PathBuf>,

    #[serde(default = "default_identity_page_size")]
    pub identity_page_size: usize,

    /// Admins allowed to run approval operations
    #[serde(default)]
    pub admins: Vec<AdminTokenEntry>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            bulk_approve_attribution: default_bulk_approve_attribution(),
            backfill_attribution: default_backfill_attribution(),
            backfill_note: default_backfill_note(),
            store_path: None,
            identity_export_path: None,
            identity_page_size: default_identity_page_size(),
            admins: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Check values serde cannot check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_key(&self.collection) {
            return Err(ConfigError::Invalid(format!(
                "collection '{}' is not a valid store key",
                self.collection
            )));
        }
        if self.identity_page_size == 0 {
            return Err(ConfigError::Invalid("identityPageSize must be at least 1".to_string()));
        }
        if self.bulk_approve_attribution.trim().is_empty()
            || self.backfill_attribution.trim().is_empty()
        {
            return Err(ConfigError::Invalid("attributions must not be empty".to_string()));
        }
        for admin in &self.admins {
            let digest_ok = admin.token_sha256.len() == 64
                && admin.token_sha256.chars().all(|c| c.is_ascii_hexdigit());
            if !digest_ok {
                return Err(ConfigError::Invalid(format!(
                    "admin '{}' has a malformed tokenSha256",
                    admin.principal
                )));
            }
        }
        Ok(())
    }
}

/// Get the path to the default config file (~/.approval-daemon/config.json)
pub fn get_default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(get_daemon_home()
        .ok_or(ConfigError::HomeDirNotFound)?
        .join(CONFIG_FILE))
}

/// Read the configuration file
pub async fn read_config(config_path: &Path) -> Result<Option<DaemonConfig>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(config_path).await?;
    let config: DaemonConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(Some(config))
}

/// Write the configuration file
pub async fn write_config(config_path: &Path, config: &DaemonConfig) -> Result<(), ConfigError> {
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: DaemonConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.collection, "users");
        assert_eq!(config.backfill_attribution, "migration");
        assert_eq!(config.bulk_approve_attribution, "auto-approve");
        assert_eq!(config.identity_page_size, 1000);
    }

    #[test]
    fn test_validate_rejects_bad_collection() {
        let config = DaemonConfig {
            collection: "users/active".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_malformed_digest() {
        let config = DaemonConfig {
            admins: vec![AdminTokenEntry {
                principal: "alice".to_string(),
                token_sha256: "plaintext-token".to_string(),
            }],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_missing_config_reads_as_none() {
        let dir = tempdir().unwrap();
        let result = read_config(&dir.path().join("config.json")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = DaemonConfig {
            store_path: Some(PathBuf::from("/var/lib/approval/db.json")),
            admins: vec![AdminTokenEntry::from_token("alice", "secret")],
            ..Default::default()
        };

        write_config(&path, &config).await.unwrap();
        let read = read_config(&path).await.unwrap().unwrap();

        assert_eq!(read, config);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("tokenSha256"));
        assert!(!raw.contains("\"secret\""));
    }
}
