use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::client::DEFAULT_BASE_URL;

pub const DEFAULT_LOG_DIR: &str = "./logs";

/// CLI configuration loaded from ~/.config/pd-offboard/config.toml
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// API connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Audit log settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Interactive prompt settings
    #[serde(default)]
    pub prompts: PromptConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL (default: https://api.pagerduty.com)
    pub base_url: Option<String>,

    /// v2 access token
    pub token: Option<String>,

    /// Email sent as the `From` header on create requests
    pub from: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory receiving one log file per run
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Ask before every delete
    #[serde(default)]
    pub confirm_deletes: bool,
}

impl CliConfig {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pd-offboard").join("config.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config: {}", e);
                Self::default()
            }),
            Err(e) => {
                eprintln!("Warning: Failed to read config: {}", e);
                Self::default()
            }
        }
    }

    /// Get effective API base URL (config -> default)
    pub fn base_url(&self) -> String {
        self.api
            .base_url
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Get effective token (config only, no default)
    pub fn token(&self) -> Option<String> {
        self.api
            .token
            .clone()
            .filter(|value| !value.trim().is_empty())
    }

    pub fn from_header(&self) -> Option<String> {
        self.api.from.clone().filter(|value| !value.trim().is_empty())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.audit
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
    }
}

/// Generate a sample config file content
pub fn sample_config() -> &'static str {
    r#"# pd-offboard configuration
# Location: ~/.config/pd-offboard/config.toml

[api]
# API base URL
# base_url = "https://api.pagerduty.com"

# v2 access token (keep secret!)
# token = "your-token-here"

# Email of the operator, sent as the From header on create requests
# from = "you@example.com"

[audit]
# One log file per run is written here
# log_dir = "./logs"

[prompts]
# Ask before deleting escalation policies, schedules and the user
confirm_deletes = false
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CliConfig::load_from(&dir.path().join("absent.toml"));

        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.token(), None);
        assert_eq!(cfg.log_dir(), PathBuf::from(DEFAULT_LOG_DIR));
        assert!(!cfg.prompts.confirm_deletes);
    }

    #[test]
    fn test_sample_config_parses_to_defaults() {
        let cfg: CliConfig = toml::from_str(sample_config()).unwrap();
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert!(!cfg.prompts.confirm_deletes);
    }

    #[test]
    fn test_values_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "http://localhost:9999"
token = "  "
from = "ops@example.com"

[audit]
log_dir = "/var/log/offboard"

[prompts]
confirm_deletes = true
"#,
        )
        .unwrap();

        let cfg = CliConfig::load_from(&path);
        assert_eq!(cfg.base_url(), "http://localhost:9999");
        assert_eq!(cfg.token(), None);
        assert_eq!(cfg.from_header().as_deref(), Some("ops@example.com"));
        assert_eq!(cfg.log_dir(), PathBuf::from("/var/log/offboard"));
        assert!(cfg.prompts.confirm_deletes);
    }

    #[test]
    fn test_unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbroken").unwrap();

        let cfg = CliConfig::load_from(&path);
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
    }
}
