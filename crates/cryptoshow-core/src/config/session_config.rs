//! Session configuration file support.
//!
//! Settings are layered: built-in defaults, then the global file
//! (`~/.cryptoshow/config.toml`), then the local file (`./.cryptoshowrc`),
//! then environment variables. CLI flags are applied last by the caller.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the API base URL.
pub const ENV_API_URL: &str = "CRYPTOSHOW_API_URL";

/// Environment variable overriding the WebSocket base URL.
pub const ENV_WS_URL: &str = "CRYPTOSHOW_WS_URL";

const DEFAULT_API_URL: &str = "http://localhost/api";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// One configuration layer as written on disk. Absent keys leave the
/// underlying value untouched when merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Backend API base URL.
    #[serde(default)]
    pub api_url: Option<String>,

    /// WebSocket base URL.
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Comparison poll interval in milliseconds.
    #[serde(default)]
    pub comparison_poll_interval_ms: Option<u64>,

    /// Trajectory playback rate.
    #[serde(default)]
    pub animation_fps: Option<u32>,

    /// Primary polymer opacity while a candidate is overlaid.
    #[serde(default)]
    pub polymer_reference_opacity: Option<f32>,

    /// Primary pocket opacity while a candidate is overlaid.
    #[serde(default)]
    pub pocket_reference_opacity: Option<f32>,

    /// Log level.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl ConfigFile {
    /// Load a configuration layer from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Save this layer to a TOML file, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::ReadError(format!("Failed to create directory: {}", e)))?;
        }

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("Failed to write file: {}", e)))?;

        Ok(())
    }
}

/// Effective session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend API base URL (e.g. `http://localhost/api`).
    pub api_url: String,

    /// WebSocket base URL; derived from `api_url` when unset.
    pub ws_url: Option<String>,

    /// Comparison poll interval in milliseconds.
    pub comparison_poll_interval_ms: u64,

    /// Trajectory playback rate.
    pub animation_fps: u32,

    /// Primary polymer opacity while a candidate is overlaid.
    pub polymer_reference_opacity: f32,

    /// Primary pocket opacity while a candidate is overlaid.
    pub pocket_reference_opacity: f32,

    /// Log level.
    pub log_level: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            comparison_poll_interval_ms: 5000,
            animation_fps: 10,
            polymer_reference_opacity: 0.25,
            pocket_reference_opacity: 0.4,
            log_level: None,
        }
    }
}

impl SessionConfig {
    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".cryptoshow")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".cryptoshowrc")
    }

    /// Discover and load configuration.
    ///
    /// Loads configuration from:
    /// 1. Global config (~/.cryptoshow/config.toml)
    /// 2. Local config (./.cryptoshowrc)
    /// 3. `CRYPTOSHOW_API_URL` / `CRYPTOSHOW_WS_URL`
    ///
    /// Later layers override earlier ones. Missing files are skipped; files
    /// that fail to parse are logged and skipped.
    pub fn discover_and_load() -> Self {
        let mut config = Self::default();

        for path in [Self::default_global_path(), Self::default_local_path()] {
            match ConfigFile::load_from_file(&path) {
                Ok(layer) => config.merge(&layer),
                Err(ConfigError::NotFound(_)) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring config file"),
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Merge a configuration layer into this one.
    ///
    /// Values from `layer` override values in `self` if they are Some.
    pub fn merge(&mut self, layer: &ConfigFile) {
        if let Some(ref api_url) = layer.api_url {
            self.api_url = api_url.clone();
        }
        if let Some(ref ws_url) = layer.ws_url {
            self.ws_url = Some(ws_url.clone());
        }
        if let Some(interval) = layer.comparison_poll_interval_ms {
            self.comparison_poll_interval_ms = interval;
        }
        if let Some(fps) = layer.animation_fps {
            self.animation_fps = fps;
        }
        if let Some(opacity) = layer.polymer_reference_opacity {
            self.polymer_reference_opacity = opacity;
        }
        if let Some(opacity) = layer.pocket_reference_opacity {
            self.pocket_reference_opacity = opacity;
        }
        if let Some(ref log_level) = layer.log_level {
            self.log_level = Some(log_level.clone());
        }
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_url = api_url;
        }
        if let Some(ws_url) = lookup(ENV_WS_URL).filter(|v| !v.is_empty()) {
            self.ws_url = Some(ws_url);
        }
    }

    /// Validate value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue("api_url must not be empty".to_string()));
        }
        for (name, opacity) in [
            ("polymer_reference_opacity", self.polymer_reference_opacity),
            ("pocket_reference_opacity", self.pocket_reference_opacity),
        ] {
            if !(opacity > 0.0 && opacity <= 1.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be in (0, 1], got {}",
                    name, opacity
                )));
            }
        }
        if self.animation_fps == 0 {
            return Err(ConfigError::InvalidValue("animation_fps must be positive".to_string()));
        }
        if self.comparison_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "comparison_poll_interval_ms must be positive".to_string(),
            ));
        }
        self.ws_base().map(|_| ())
    }

    /// WebSocket base URL, explicit or derived from `api_url`.
    pub fn ws_base(&self) -> ConfigResult<String> {
        match self.ws_url {
            Some(ref ws_url) => Ok(ws_url.trim_end_matches('/').to_string()),
            None => derive_ws_base(&self.api_url),
        }
    }

    /// Comparison poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.comparison_poll_interval_ms)
    }
}

/// Derives the WebSocket origin from an HTTP API URL.
///
/// The status socket lives at the host root, so any path is dropped:
/// `https://host:8443/api` becomes `wss://host:8443`.
pub fn derive_ws_base(api_url: &str) -> ConfigResult<String> {
    let (scheme, rest) = api_url
        .split_once("://")
        .ok_or_else(|| ConfigError::InvalidValue(format!("api_url without scheme: {}", api_url)))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(ConfigError::InvalidValue(format!(
                "api_url scheme must be http or https, got {}",
                other
            )));
        }
    };

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(ConfigError::InvalidValue(format!("api_url without host: {}", api_url)));
    }

    Ok(format!("{}://{}", ws_scheme, authority))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_content = r#"
api_url = "https://cryptoshow.example/api"
comparison_poll_interval_ms = 250
animation_fps = 24
log_level = "debug"
"#;

        std::fs::write(&config_path, config_content).unwrap();

        let layer = ConfigFile::load_from_file(&config_path).unwrap();
        assert_eq!(layer.api_url, Some("https://cryptoshow.example/api".to_string()));
        assert_eq!(layer.comparison_poll_interval_ms, Some(250));
        assert_eq!(layer.animation_fps, Some(24));
        assert_eq!(layer.log_level, Some("debug".to_string()));
        assert!(layer.ws_url.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = ConfigFile::load_from_file(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "api_url = [").unwrap();

        let result = ConfigFile::load_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let layer = ConfigFile { animation_fps: Some(30), ..ConfigFile::default() };
        layer.save_to_file(&config_path).unwrap();

        let reloaded = ConfigFile::load_from_file(&config_path).unwrap();
        assert_eq!(reloaded.animation_fps, Some(30));
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.api_url, "http://localhost/api");
        assert_eq!(config.comparison_poll_interval_ms, 5000);
        assert_eq!(config.animation_fps, 10);
        assert!((config.polymer_reference_opacity - 0.25).abs() < f32::EPSILON);
        assert!((config.pocket_reference_opacity - 0.4).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_local_overrides_global() {
        let mut config = SessionConfig::default();
        let global = ConfigFile {
            api_url: Some("http://global/api".to_string()),
            animation_fps: Some(5),
            ..ConfigFile::default()
        };
        let local = ConfigFile { animation_fps: Some(12), ..ConfigFile::default() };

        config.merge(&global);
        config.merge(&local);

        assert_eq!(config.api_url, "http://global/api");
        assert_eq!(config.animation_fps, 12);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SessionConfig::default();
        config.apply_env(|key| match key {
            ENV_API_URL => Some("https://env.example/api".to_string()),
            ENV_WS_URL => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.api_url, "https://env.example/api");
        assert!(config.ws_url.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_opacity = SessionConfig { pocket_reference_opacity: 0.0, ..SessionConfig::default() };
        assert!(zero_opacity.validate().is_err());

        let over_opacity =
            SessionConfig { polymer_reference_opacity: 1.5, ..SessionConfig::default() };
        assert!(over_opacity.validate().is_err());

        let zero_fps = SessionConfig { animation_fps: 0, ..SessionConfig::default() };
        assert!(zero_fps.validate().is_err());

        let zero_poll = SessionConfig { comparison_poll_interval_ms: 0, ..SessionConfig::default() };
        assert!(zero_poll.validate().is_err());

        let ftp = SessionConfig { api_url: "ftp://host/api".to_string(), ..SessionConfig::default() };
        assert!(ftp.validate().is_err());
    }

    #[test]
    fn test_derive_ws_base() {
        assert_eq!(derive_ws_base("http://localhost/api").unwrap(), "ws://localhost");
        assert_eq!(derive_ws_base("https://host:8443/api/v1").unwrap(), "wss://host:8443");
        assert_eq!(derive_ws_base("http://127.0.0.1:9000").unwrap(), "ws://127.0.0.1:9000");
        assert!(derive_ws_base("localhost/api").is_err());
    }

    #[test]
    fn test_explicit_ws_base_wins() {
        let config = SessionConfig {
            ws_url: Some("ws://sockets:7000/".to_string()),
            ..SessionConfig::default()
        };
        assert_eq!(config.ws_base().unwrap(), "ws://sockets:7000");
    }
}
