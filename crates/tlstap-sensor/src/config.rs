//! Sensor configuration
//!
//! TOML file discovered via the CLI flag, the `TLSTAP_CONFIG` environment
//! variable, or `/etc/tlstap/config.toml`, in that order. CLI flags
//! override whatever the file says.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub sensor: SensorSettings,
    pub capture: CaptureSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Interface to attach the TC classifier to
    pub interface: String,

    /// Path to the compiled eBPF object file
    pub object_path: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            object_path: PathBuf::from("/opt/tlstap/tlstap-tc.o"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// JSONL output file (disabled when unset)
    pub jsonl_path: Option<PathBuf>,

    /// Append to an existing JSONL file instead of truncating
    pub append: bool,

    /// Flush the JSONL writer after each event
    pub flush_each: bool,

    /// Log each event at info level
    pub log_events: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            jsonl_path: None,
            append: true,
            flush_each: true,
            log_events: true,
        }
    }
}

/// A loaded configuration plus where it came from.
///
/// Loading happens before the tracing subscriber is installed (the log
/// level lives in the config), so the loader reports instead of logging;
/// the caller logs `source` and `ignored` once logging is up.
pub struct LoadedConfig {
    pub config: SensorConfig,
    /// File the configuration was read from, `None` when defaults apply.
    pub source: Option<PathBuf>,
    /// Explicitly pointed-at paths that did not exist and were skipped.
    pub ignored: Vec<PathBuf>,
}

/// Loads configuration with the following precedence:
/// 1. CLI `--config` flag
/// 2. `TLSTAP_CONFIG` environment variable
/// 3. `/etc/tlstap/config.toml`
/// 4. Default values
pub struct ConfigLoader {
    cli_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { cli_path: None }
    }

    pub fn with_cli_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    pub fn load(&self) -> ConfigResult<LoadedConfig> {
        let mut ignored = Vec::new();
        let source = self.find_config_file(&mut ignored);

        let config = match &source {
            Some(path) => Self::load_from_file(path)?,
            None => SensorConfig::default(),
        };

        Self::validate(&config)?;
        Ok(LoadedConfig {
            config,
            source,
            ignored,
        })
    }

    pub fn load_from_file(path: &Path) -> ConfigResult<SensorConfig> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn find_config_file(&self, ignored: &mut Vec<PathBuf>) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            if path.exists() {
                return Some(path.clone());
            }
            ignored.push(path.clone());
        }

        if let Ok(env_path) = std::env::var("TLSTAP_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            ignored.push(path);
        }

        let system = PathBuf::from("/etc/tlstap/config.toml");
        if system.exists() {
            return Some(system);
        }

        None
    }

    fn validate(config: &SensorConfig) -> ConfigResult<()> {
        if config.capture.interface.is_empty() {
            return Err(ConfigError::Validation(
                "capture.interface must not be empty".to_string(),
            ));
        }
        match config.sensor.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "unknown log level: {other}"
            ))),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = SensorConfig::default();
        assert!(ConfigLoader::validate(&config).is_ok());
        assert_eq!(config.capture.interface, "eth0");
        assert!(config.export.jsonl_path.is_none());
    }

    #[test]
    fn parses_a_full_file() {
        let file = write_config(
            r#"
            [sensor]
            log_level = "debug"

            [capture]
            interface = "ens5"
            object_path = "/usr/lib/tlstap/tc.o"

            [export]
            jsonl_path = "/var/log/tlstap/events.jsonl"
            append = false
            log_events = false
            "#,
        );

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.sensor.log_level, "debug");
        assert_eq!(config.capture.interface, "ens5");
        assert_eq!(
            config.export.jsonl_path.as_deref(),
            Some(Path::new("/var/log/tlstap/events.jsonl"))
        );
        assert!(!config.export.append);
        assert!(!config.export.log_events);
        // Unset fields keep their defaults.
        assert!(config.export.flush_each);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let file = write_config("[capture]\ninterface = \"lo\"\n");
        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.capture.interface, "lo");
        assert_eq!(config.sensor.log_level, "info");
    }

    #[test]
    fn load_reports_the_chosen_source() {
        let file = write_config("[capture]\ninterface = \"lo\"\n");
        let loaded = ConfigLoader::new()
            .with_cli_path(Some(file.path().to_path_buf()))
            .load()
            .unwrap();

        assert_eq!(loaded.source.as_deref(), Some(file.path()));
        assert!(loaded.ignored.is_empty());
        assert_eq!(loaded.config.capture.interface, "lo");
    }

    #[test]
    fn load_records_a_missing_cli_path_and_falls_back() {
        let missing = PathBuf::from("/nonexistent/tlstap/config.toml");
        let loaded = ConfigLoader::new()
            .with_cli_path(Some(missing.clone()))
            .load()
            .unwrap();

        assert_eq!(loaded.ignored, vec![missing.clone()]);
        assert_ne!(loaded.source.as_deref(), Some(missing.as_path()));
    }

    #[test]
    fn rejects_empty_interface() {
        let mut config = SensorConfig::default();
        config.capture.interface.clear();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = SensorConfig::default();
        config.sensor.log_level = "loud".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        let file = write_config("not toml at all [");
        assert!(matches!(
            ConfigLoader::load_from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
