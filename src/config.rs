//! Configuration file parser for ~/.config/memoria/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `api_key` from the file.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Process-wide bootstrap values.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// `Debug` masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini API key. `GEMINI_API_KEY` takes precedence.
    pub api_key: Option<String>,

    /// Override for the Gemini endpoint. Must be HTTPS unless loopback.
    pub api_base_url: Option<String>,

    /// Per-request classification timeout.
    pub request_timeout_secs: u64,

    /// Period of the background connectivity check in `status --watch`.
    pub connectivity_interval_secs: u64,

    /// Where the library database lives. Defaults to the config directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: None,
            request_timeout_secs: 30,
            connectivity_interval_secs: 3,
            data_dir: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field(
                "connectivity_interval_secs",
                &self.connectivity_interval_secs,
            )
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

const KNOWN_KEYS: [&str; 5] = [
    "api_key",
    "api_base_url",
    "request_timeout_secs",
    "connectivity_interval_secs",
    "data_dir",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            api_key = config.api_key.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// The API key to use: the environment first, then the file.
    pub fn api_key(&self) -> Option<SecretString> {
        select_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn connectivity_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_interval_secs.max(1))
    }
}

fn select_api_key(env: Option<String>, file: Option<&str>) -> Option<SecretString> {
    env.filter(|k| !k.trim().is_empty())
        .or_else(|| file.filter(|k| !k.trim().is_empty()).map(str::to_string))
        .map(|k| SecretString::from(k.trim().to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert!(config.api_base_url.is_none());
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.connectivity_interval_secs, 3);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (_dir, path) = write_config("   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"
api_key = "test-key-123"
api_base_url = "https://proxy.example.com"
request_timeout_secs = 10
connectivity_interval_secs = 60
data_dir = "/var/lib/memoria"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("test-key-123"));
        assert_eq!(
            config.api_base_url.as_deref(),
            Some("https://proxy.example.com")
        );
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.connectivity_interval(), Duration::from_secs(60));
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/memoria")));
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (_dir, path) = write_config("request_timeout_secs = 5\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.connectivity_interval_secs, 3);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (_dir, path) = write_config("this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (_dir, path) = write_config("request_timeout_secs = \"soon\"\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (_dir, path) = write_config("api_kee = \"typo\"\nrequest_timeout_secs = 7\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 7);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (_dir, path) = write_config(&"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let config = Config {
            request_timeout_secs: 0,
            connectivity_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        assert_eq!(config.connectivity_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_key_overrides_file() {
        let key = select_api_key(Some("from-env-key".into()), Some("from-file-key")).unwrap();
        assert_eq!(key.expose_secret(), "from-env-key");

        let key = select_api_key(None, Some(" from-file-key ")).unwrap();
        assert_eq!(key.expose_secret(), "from-file-key");

        let key = select_api_key(Some("  ".into()), Some("from-file-key")).unwrap();
        assert_eq!(key.expose_secret(), "from-file-key");

        assert!(select_api_key(None, None).is_none());
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = Config {
            api_key: Some("super-secret-key-12345".to_string()),
            ..Default::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-key-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_debug_shows_none_when_no_api_key() {
        let debug_output = format!("{:?}", Config::default());
        assert!(debug_output.contains("api_key: None"));
        assert!(!debug_output.contains("[REDACTED]"));
    }
}
