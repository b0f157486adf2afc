use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "OSS_UPLOADER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Application configuration, read from `config.toml`.
///
/// Every field has a default, so a missing file or a partial file is fine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL the API paths (`/upload`, `/presign`, ...) are appended to.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// WebSocket base for progress channels. Derived from `api_base` when unset.
    #[serde(default)]
    pub progress_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Timeout for presign, download link and short link requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Timeout for payload uploads. Unset means no limit.
    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,
    #[serde(default = "default_share_expiration")]
    pub default_share_expiration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_api_base() -> String {
    "http://127.0.0.1:5050/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_share_expiration() -> String {
    "24h".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            progress_base: None,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            upload_timeout_secs: None,
            default_share_expiration: default_share_expiration(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Loads the file named by `OSS_UPLOADER_CONFIG`, or `config.toml` in the
    /// working directory. Falls back to defaults when neither exists.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.api_base, "http://127.0.0.1:5050/api");
        assert_eq!(config.server.progress_base, None);
        assert_eq!(config.upload.request_timeout_secs, 30);
        assert_eq!(config.upload.connect_timeout_secs, 10);
        assert_eq!(config.upload.upload_timeout_secs, None);
        assert_eq!(config.upload.default_share_expiration, "24h");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            api_base = "https://files.example.com/api"

            [upload]
            upload_timeout_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.server.api_base, "https://files.example.com/api");
        assert_eq!(config.upload.upload_timeout_secs, Some(600));
        assert_eq!(config.upload.request_timeout_secs, 30);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\nlevel = \"debug\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(AppConfig::from_toml_str("[server\napi_base = 1").is_err());
    }
}
