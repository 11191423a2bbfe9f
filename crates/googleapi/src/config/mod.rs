//! Configuration management
//!
//! Reads the hub's Google integration settings from a JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::{Error, Result};

pub const CONFIG_ENV: &str = "GOOGLEAPI_CONFIG";
pub const MAPS_API_KEY_ENV: &str = "GOOGLEAPI_MAPS_API_KEY";
pub const SUBJECT_ENV: &str = "GOOGLEAPI_SUBJECT";

fn default_time_zone() -> String {
    "Europe/Brussels".to_string()
}

fn default_language() -> String {
    "nl-BE".to_string()
}

/// `~/.googleapi/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".googleapi").join("config.json"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub service_account_file: PathBuf,
    /// Workspace primary domain
    pub domain: String,
    /// Delegated admin and calendar/drive owner
    pub subject: String,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub mail_sender: Option<String>,
    #[serde(default)]
    pub mail_reply_address: Option<String>,
    #[serde(default)]
    pub wallet_issuer_id: Option<String>,
    #[serde(default)]
    pub wallet_origins: Vec<String>,
    #[serde(default)]
    pub maps_api_key: Option<String>,
}

impl HubConfig {
    /// Load from `path`, else `$GOOGLEAPI_CONFIG`, else the default location,
    /// then apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = resolve_path(path, std::env::var(CONFIG_ENV).ok())?;
        let mut config = Self::from_file(&path).await?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Err(Error::Config(format!(
                "Config file not found at {}",
                path.display()
            )));
        }

        info!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config JSON: {}", e)))
    }

    /// Overlay non-empty values from `lookup` (normally the process environment)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(MAPS_API_KEY_ENV) {
            debug!("Maps API key taken from {}", MAPS_API_KEY_ENV);
            self.maps_api_key = Some(key);
        }
        if let Some(subject) = non_empty(SUBJECT_ENV) {
            debug!("Subject overridden by {}", SUBJECT_ENV);
            self.subject = subject;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(Error::Config("domain must not be empty".to_string()));
        }
        if self.subject.trim().is_empty() {
            return Err(Error::Config("subject must not be empty".to_string()));
        }
        if !self.service_account_file.is_file() {
            return Err(Error::Config(format!(
                "Service account file does not exist: {}",
                self.service_account_file.display()
            )));
        }
        Ok(())
    }

    /// Sender address for Gmail, falling back to the subject
    pub fn mail_sender(&self) -> &str {
        self.mail_sender.as_deref().unwrap_or(&self.subject)
    }
}

fn resolve_path(explicit: Option<&Path>, from_env: Option<String>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = from_env.filter(|p| !p.trim().is_empty()) {
        return Ok(PathBuf::from(path));
    }
    default_config_path()
        .ok_or_else(|| Error::Config("Could not find home directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    async fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.json");
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    fn minimal(key_file: &Path) -> String {
        serde_json::json!({
            "service_account_file": key_file,
            "domain": "ingeniumua.be",
            "subject": "admin@ingeniumua.be",
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_defaults_applied() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.json");
        tokio::fs::write(&key_file, "{}").await.unwrap();
        let path = write_config(dir.path(), &minimal(&key_file)).await;

        let config = HubConfig::from_file(&path).await.unwrap();
        assert_eq!(config.time_zone, "Europe/Brussels");
        assert_eq!(config.language, "nl-BE");
        assert!(config.wallet_origins.is_empty());
        assert_eq!(config.mail_sender(), "admin@ingeniumua.be");
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = HubConfig::from_file(Path::new("/nonexistent/config.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "{ not json").await;
        let err = HubConfig::from_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config JSON"));
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), &minimal(&dir.path().join("absent.json"))).await;

        let config = HubConfig::from_file(&path).await.unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }

    #[tokio::test]
    async fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.json");
        let path = write_config(dir.path(), &minimal(&key_file)).await;
        let mut config = HubConfig::from_file(&path).await.unwrap();

        let env: HashMap<&str, &str> = [
            (MAPS_API_KEY_ENV, "maps-key"),
            (SUBJECT_ENV, "  "),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.maps_api_key.as_deref(), Some("maps-key"));
        assert_eq!(config.subject, "admin@ingeniumua.be");
    }

    #[test]
    fn test_resolve_path_order() {
        let explicit = Path::new("/etc/hub.json");
        assert_eq!(
            resolve_path(Some(explicit), Some("/env.json".to_string())).unwrap(),
            PathBuf::from("/etc/hub.json")
        );
        assert_eq!(
            resolve_path(None, Some("/env.json".to_string())).unwrap(),
            PathBuf::from("/env.json")
        );
        if let Some(default) = default_config_path() {
            assert_eq!(resolve_path(None, None).unwrap(), default);
        }
    }
}
