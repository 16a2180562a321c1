//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/msgsentry/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/msgsentry/` (~/.config/msgsentry/)
//! - State/Logs: `$XDG_STATE_HOME/msgsentry/` (~/.local/state/msgsentry/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Remote classification backends
    #[serde(default)]
    pub classify: ClassifyConfig,

    /// Local detection tuning
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote classification configuration
///
/// Both backends are optional; the racer uses whichever are configured.
/// With neither configured, the pipeline still runs the local heuristics.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifyConfig {
    /// Gemini backend (optional)
    #[serde(default)]
    pub gemini: Option<BackendConfig>,

    /// Groq backend (optional)
    #[serde(default)]
    pub groq: Option<BackendConfig>,
}

/// A single classification backend.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// API key (can also use env var, e.g. GEMINI_API_KEY / GROQ_API_KEY)
    pub api_key: Option<String>,

    /// Model to use
    pub model: String,

    /// API endpoint (optional, uses default for backend)
    pub endpoint: Option<String>,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    45
}

impl BackendConfig {
    /// Resolve the API key from config or the given environment variable.
    pub fn resolve_api_key(&self, env_var: &str) -> Result<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        std::env::var(env_var)
            .map_err(|_| Error::Config(format!("no API key in config or {}", env_var)))
    }
}

/// Local detection tuning
#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    /// Enable full-decode image checks (chi-square and LSB analysis).
    /// The cheap metadata signature scan always runs.
    #[serde(default)]
    pub deep_scan_enabled: bool,

    /// Two clicks on a marker within this window dismiss it, in milliseconds
    #[serde(default = "default_double_click_ms")]
    pub double_click_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            deep_scan_enabled: false,
            double_click_ms: default_double_click_ms(),
        }
    }
}

fn default_double_click_ms() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.detection.double_click_ms == 0 {
            return Err(Error::Config(
                "detection.double_click_ms must be greater than 0".to_string(),
            ));
        }
        for (name, backend) in [
            ("gemini", &self.classify.gemini),
            ("groq", &self.classify.groq),
        ] {
            if let Some(backend) = backend {
                if backend.model.is_empty() {
                    return Err(Error::Config(format!(
                        "classify.{}.model must not be empty",
                        name
                    )));
                }
                if backend.request_timeout_secs == 0 {
                    return Err(Error::Config(format!(
                        "classify.{}.request_timeout_secs must be greater than 0",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/msgsentry/config.toml` (~/.config/msgsentry/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("msgsentry").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/msgsentry/` (~/.local/state/msgsentry/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("msgsentry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.classify.gemini.is_none());
        assert!(config.classify.groq.is_none());
        assert!(!config.detection.deep_scan_enabled);
        assert_eq!(config.detection.double_click_ms, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[classify.gemini]
api_key = "test-key"
model = "gemini-2.0-flash"

[classify.groq]
model = "llama-3.3-70b-versatile"
request_timeout_secs = 60

[detection]
deep_scan_enabled = true
double_click_ms = 450

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let gemini = config.classify.gemini.unwrap();
        assert_eq!(gemini.model, "gemini-2.0-flash");
        assert_eq!(gemini.connect_timeout_secs, 30);
        assert_eq!(gemini.request_timeout_secs, 45);

        let groq = config.classify.groq.unwrap();
        assert_eq!(groq.request_timeout_secs, 60);
        assert!(groq.api_key.is_none());

        assert!(config.detection.deep_scan_enabled);
        assert_eq!(config.detection.double_click_ms, 450);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_empty_model() {
        let toml = r#"
[classify.gemini]
model = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[detection]\ndouble_click_ms = 250\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.detection.double_click_ms, 250);
    }

    #[test]
    fn test_api_key_resolution() {
        let backend = BackendConfig {
            api_key: Some("from-config".to_string()),
            model: "m".to_string(),
            endpoint: None,
            connect_timeout_secs: 30,
            request_timeout_secs: 45,
        };
        assert_eq!(
            backend.resolve_api_key("MSGSENTRY_TEST_UNSET_VAR").unwrap(),
            "from-config"
        );

        let backend = BackendConfig {
            api_key: None,
            ..backend
        };
        assert!(backend.resolve_api_key("MSGSENTRY_TEST_UNSET_VAR").is_err());
    }
}
