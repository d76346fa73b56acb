//! Bootstrap configuration loading and resolution
//!
//! Configuration is resolved in this priority order (highest first):
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! Levels 1 and 2 are parsed by the binary (clap with `env`) and applied on
//! top of the TOML layer through [`TomlConfig::apply_overrides`]. A missing
//! TOML file is not fatal: the service starts on compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "eda-dashboard";

/// File name of the bootstrap TOML
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "EDA_CONFIG";

/// Accepted chart dimensions in pixels
const CHART_MIN_PIXELS: u32 = 200;
const CHART_MAX_PIXELS: u32 = 4000;

/// Bootstrap configuration loaded from TOML
///
/// Every field has a compiled default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface to bind
    pub host: String,

    /// HTTP server port
    pub port: u16,

    /// Rows included in every table preview
    pub preview_rows: usize,

    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,

    /// Upper bound on waiting for a session lock
    pub lock_timeout_secs: u64,

    /// Idle time after which a session is evicted (`None` keeps sessions
    /// for the process lifetime)
    pub session_idle_ttl_secs: Option<u64>,

    /// How often the eviction sweeper runs when a TTL is configured
    pub eviction_interval_secs: u64,

    /// Origins allowed by the CORS layer
    pub cors_origins: Vec<String>,

    /// Chart image settings
    pub charts: ChartConfig,

    /// Report settings
    pub reports: ReportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Chart image settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChartConfig {
    /// PNG width in pixels
    pub width: u32,

    /// PNG height in pixels
    pub height: u32,

    /// TrueType/OpenType font for titles and axis labels. Without one,
    /// charts are drawn without text.
    pub font_path: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            font_path: None,
        }
    }
}

/// Format of downloadable reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Pdf,
    Markdown,
}

/// Report settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
            preview_rows: 10,
            max_upload_bytes: 50 * 1024 * 1024,
            lock_timeout_secs: 30,
            session_idle_ttl_secs: None,
            eviction_interval_secs: 60,
            cors_origins: vec!["http://localhost:3000".to_string()],
            charts: ChartConfig::default(),
            reports: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an existing file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, falling back to defaults when the file is absent
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                let config = Self::load(path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("No config file location available, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply command-line / environment overrides on top of the TOML layer
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.preview_rows == 0 {
            return Err(Error::Config("preview_rows must be at least 1".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config(
                "max_upload_bytes must be at least 1".to_string(),
            ));
        }
        if self.lock_timeout_secs == 0 {
            return Err(Error::Config(
                "lock_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.eviction_interval_secs == 0 {
            return Err(Error::Config(
                "eviction_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.session_idle_ttl_secs == Some(0) {
            return Err(Error::Config(
                "session_idle_ttl_secs must be at least 1 when set".to_string(),
            ));
        }
        for (name, pixels) in [("width", self.charts.width), ("height", self.charts.height)] {
            if !(CHART_MIN_PIXELS..=CHART_MAX_PIXELS).contains(&pixels) {
                return Err(Error::Config(format!(
                    "charts.{} must be between {} and {}",
                    name, CHART_MIN_PIXELS, CHART_MAX_PIXELS
                )));
            }
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn session_idle_ttl(&self) -> Option<Duration> {
        self.session_idle_ttl_secs.map(Duration::from_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    /// `host:port` string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Platform default location of the config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Pick the config file to read
///
/// 1. Command-line argument
/// 2. `EDA_CONFIG` environment variable
/// 3. Platform default location
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Write a configuration to disk, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = TomlConfig::from_toml_str("port = 9000\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.preview_rows, 10);
        assert_eq!(config.session_idle_ttl(), None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_lock_timeout_rejected() {
        let err = TomlConfig::from_toml_str("lock_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let err = TomlConfig::from_toml_str("session_idle_ttl_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("session_idle_ttl_secs"));
    }

    #[test]
    fn test_chart_and_report_sections() {
        let config = TomlConfig::from_toml_str(
            "[charts]\nwidth = 640\nfont_path = \"/tmp/label.ttf\"\n\n[reports]\nformat = \"markdown\"\n",
        )
        .unwrap();
        assert_eq!(config.charts.width, 640);
        assert_eq!(config.charts.height, 600);
        assert_eq!(config.charts.font_path, Some(PathBuf::from("/tmp/label.ttf")));
        assert_eq!(config.reports.format, ReportFormat::Markdown);
        assert_eq!(TomlConfig::default().reports.format, ReportFormat::Pdf);
    }

    #[test]
    fn test_tiny_chart_rejected() {
        let err = TomlConfig::from_toml_str("[charts]\nheight = 10\n").unwrap_err();
        assert!(err.to_string().contains("charts.height"));

        let err = TomlConfig::from_toml_str("[reports]\nformat = \"docx\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides_replace_toml_values() {
        let mut config = TomlConfig::default();
        config.apply_overrides(Some("0.0.0.0".to_string()), Some(8080));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");

        config.apply_overrides(None, None);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }
}
