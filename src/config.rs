//! Configuration file parser for ~/.config/promptfeed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use thiserror::Error;

/// Categories offered by the gallery, in display order.
pub const DEFAULT_CATEGORIES: [&str; 7] = [
    "NAM",
    "NỮ",
    "COUPLE",
    "BÉ TRAI",
    "BÉ GÁI",
    "MẸ BẦU",
    "PROMPT KHÁC",
];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `auth_token` to prevent secret leakage in logs,
/// error messages, and debug output.
#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// PocketBase server, e.g. `https://pb.example.com`.
    pub base_url: String,

    /// Collection holding the prompt records.
    pub collection: String,

    /// Category tabs, in display order.
    pub categories: Vec<String>,

    /// Category selected at startup. Must be one of `categories`.
    pub default_category: String,

    /// Records per page at startup.
    pub page_size: u32,

    /// Sizes the user can cycle through.
    pub page_sizes: Vec<u32>,

    /// PocketBase sort expression.
    pub sort: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Rows from the bottom of the list at which the next page loads.
    pub scroll_threshold: usize,

    /// Minimum milliseconds between two scroll-triggered page requests.
    pub scroll_throttle_ms: u64,

    /// Value for the `Authorization` header, if the collection is not public.
    #[serde(deserialize_with = "deserialize_secret")]
    pub auth_token: Option<SecretString>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            collection: "prompt".to_string(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            default_category: DEFAULT_CATEGORIES[0].to_string(),
            page_size: 10,
            page_sizes: vec![10, 20, 50],
            sort: "-created".to_string(),
            request_timeout_secs: 15,
            scroll_threshold: 3,
            scroll_throttle_ms: 200,
            auth_token: None,
        }
    }
}

/// Mask auth_token in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("collection", &self.collection)
            .field("categories", &self.categories)
            .field("default_category", &self.default_category)
            .field("page_size", &self.page_size)
            .field("page_sizes", &self.page_sizes)
            .field("sort", &self.sort)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("scroll_threshold", &self.scroll_threshold)
            .field("scroll_throttle_ms", &self.scroll_throttle_ms)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    ///
    /// The result is not validated; call [`Config::validate`] after applying
    /// command-line overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
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
                // Race condition: file deleted between metadata and read
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
            let known_keys = [
                "base_url",
                "collection",
                "categories",
                "default_category",
                "page_size",
                "page_sizes",
                "sort",
                "request_timeout_secs",
                "scroll_threshold",
                "scroll_throttle_ms",
                "auth_token",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            base_url = %config.base_url,
            collection = %config.collection,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("categories must not be empty".into()));
        }
        if !self.categories.contains(&self.default_category) {
            return Err(ConfigError::Invalid(format!(
                "default_category {:?} is not one of the configured categories",
                self.default_category
            )));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        if self.page_sizes.contains(&0) {
            return Err(ConfigError::Invalid("page_sizes must all be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url: {}", e)))?;
        match url.scheme() {
            "https" => {}
            "http" if matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]")) => {}
            "http" => {
                return Err(ConfigError::Invalid(
                    "base_url must use HTTPS (plain HTTP is only allowed for localhost)".into(),
                ))
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "base_url has unsupported scheme {:?}",
                    other
                )))
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collection, "prompt");
        assert_eq!(config.categories.len(), 7);
        assert_eq!(config.default_category, "NAM");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.page_sizes, vec![10, 20, 50]);
        assert_eq!(config.sort, "-created");
        assert!(config.auth_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/promptfeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("promptfeed_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  \n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_category, "NAM");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("promptfeed_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "page_size = 20\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.collection, "prompt"); // default
        assert_eq!(config.scroll_throttle_ms, 200); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("promptfeed_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
base_url = "https://pb.example.com"
collection = "gallery"
categories = ["A", "B"]
default_category = "B"
page_size = 20
page_sizes = [20, 40]
sort = "-updated"
request_timeout_secs = 5
scroll_threshold = 6
scroll_throttle_ms = 500
auth_token = "token-123"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_url, "https://pb.example.com");
        assert_eq!(config.collection, "gallery");
        assert_eq!(config.categories, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(config.default_category, "B");
        assert_eq!(config.page_sizes, vec![20, 40]);
        assert_eq!(config.sort, "-updated");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.scroll_threshold, 6);
        assert_eq!(config.scroll_throttle_ms, 500);
        assert_eq!(
            config.auth_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("token-123".to_string())
        );
        assert!(config.validate().is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("promptfeed_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("promptfeed_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "page_size = 50\npage_sise = 20\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 50);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("promptfeed_config_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "page_size = \"ten\"\n").unwrap();

        assert!(Config::load(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("promptfeed_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    fn validation_error(mutate: impl FnOnce(&mut Config)) -> String {
        let mut config = Config::default();
        mutate(&mut config);
        config.validate().unwrap_err().to_string()
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(validation_error(|c| c.categories.clear()).contains("categories"));
        assert!(validation_error(|c| c.default_category = "UNKNOWN".into())
            .contains("default_category"));
        assert!(validation_error(|c| c.page_size = 0).contains("page_size"));
        assert!(validation_error(|c| c.page_sizes = vec![10, 0]).contains("page_sizes"));
        assert!(validation_error(|c| c.request_timeout_secs = 0)
            .contains("request_timeout_secs"));
        assert!(validation_error(|c| c.base_url = "http://pb.example.com".into())
            .contains("HTTPS"));
        assert!(validation_error(|c| c.base_url = "ftp://pb.example.com".into())
            .contains("scheme"));
        assert!(validation_error(|c| c.base_url = "not a url".into()).contains("base_url"));
    }

    #[test]
    fn test_validate_allows_plain_http_on_localhost() {
        let mut config = Config::default();
        config.base_url = "http://localhost:8090".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_masks_auth_token() {
        let mut config = Config::default();
        config.auth_token = Some(SecretString::from("super-secret-token-12345"));

        let debug_output = format!("{:?}", config);
        assert!(
            !debug_output.contains("super-secret-token-12345"),
            "Debug output should not contain the token"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_debug_shows_none_when_no_token() {
        let debug_output = format!("{:?}", Config::default());
        assert!(!debug_output.contains("[REDACTED]"));
    }
}
