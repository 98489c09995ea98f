//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.zone-averages.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".zone-averages.toml";

/// Upper bound for decimal places, from the config file or --precision.
pub const MAX_PRECISION: usize = 10;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Ingest settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Export settings.
    #[serde(default)]
    pub export: ExportConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Vocation selected when none is chosen, if present in the data.
    #[serde(default = "default_vocation")]
    pub default_vocation: String,

    /// Mode selected when none is chosen, if present in the data.
    #[serde(default = "default_mode")]
    pub default_mode: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_vocation: default_vocation(),
            default_mode: default_mode(),
        }
    }
}

fn default_vocation() -> String {
    "Knight".to_string()
}

fn default_mode() -> String {
    "Solo".to_string()
}

/// Field lookup settings for session logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Keys tried, in order, for the vocation.
    #[serde(default = "default_vocation_fields")]
    pub vocation_fields: Vec<String>,

    /// Keys tried, in order, for the hunt mode.
    #[serde(default = "default_mode_fields")]
    pub mode_fields: Vec<String>,

    /// Keys tried, in order, for the zone.
    #[serde(default = "default_zone_fields")]
    pub zone_fields: Vec<String>,

    /// Keys tried, in order, for the averaged metric.
    #[serde(default = "default_metric_fields")]
    pub metric_fields: Vec<String>,

    /// File extensions picked up when scanning directories.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            vocation_fields: default_vocation_fields(),
            mode_fields: default_mode_fields(),
            zone_fields: default_zone_fields(),
            metric_fields: default_metric_fields(),
            extensions: default_extensions(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_vocation_fields() -> Vec<String> {
    strings(&["Vocation", "vocation"])
}

fn default_mode_fields() -> Vec<String> {
    strings(&["Mode", "mode"])
}

fn default_zone_fields() -> Vec<String> {
    strings(&["Zone", "zone", "Zona", "zona", "Hunt Place", "Area"])
}

fn default_metric_fields() -> Vec<String> {
    strings(&["Metric", "metric"])
}

fn default_extensions() -> Vec<String> {
    strings(&["json", "jsonl"])
}

/// Export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Decimal places for averages.
    #[serde(default = "default_precision")]
    pub precision: usize,

    /// File name offered for the CSV download.
    #[serde(default = "default_csv_filename")]
    pub csv_filename: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            csv_filename: default_csv_filename(),
        }
    }
}

fn default_precision() -> usize {
    2
}

fn default_csv_filename() -> String {
    "zone_averages.csv".to_string()
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size for uploads, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Idle time after which a session and its records are dropped.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            session_ttl_seconds: default_session_ttl(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024 // 20 MiB
}

fn default_session_ttl() -> u64 {
    3600
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check values that would otherwise fail at render or response time.
    pub fn validate(&self) -> Result<()> {
        if self.export.precision > MAX_PRECISION {
            bail!(
                "[export] precision must be at most {} decimal places, got {}",
                MAX_PRECISION,
                self.export.precision
            );
        }

        let name = &self.export.csv_filename;
        if name.trim().is_empty() {
            bail!("[export] csv_filename must not be empty");
        }
        if let Some(c) = name
            .chars()
            .find(|c| c.is_control() || matches!(*c, '"' | '\\' | '/'))
        {
            bail!(
                "[export] csv_filename contains an unsupported character: {:?}",
                c
            );
        }

        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        match &args.command {
            crate::cli::Command::Report(report) => {
                if let Some(precision) = report.precision {
                    self.export.precision = precision;
                }
                if let Some(ref fields) = report.metric_field {
                    self.ingest.metric_fields = fields.clone();
                }
            }
            crate::cli::Command::Serve(serve) => {
                if let Some(ref bind) = serve.bind {
                    self.server.bind = bind.clone();
                }
                if let Some(port) = serve.port {
                    self.server.port = port;
                }
                if let Some(precision) = serve.precision {
                    self.export.precision = precision;
                }
            }
            crate::cli::Command::InitConfig => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, Command, ServeArgs};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.precision, 2);
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.general.default_vocation, "Knight");
        assert!(config.ingest.zone_fields.contains(&"Hunt Place".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
default_mode = "Duo"

[ingest]
metric_fields = ["Balance", "balance"]

[export]
precision = 0

[server]
port = 9000
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.default_mode, "Duo");
        assert_eq!(config.general.default_vocation, "Knight");
        assert_eq!(config.ingest.metric_fields, vec!["Balance", "balance"]);
        assert_eq!(config.ingest.vocation_fields, vec!["Vocation", "vocation"]);
        assert_eq!(config.export.precision, 0);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn test_merge_serve_overrides() {
        let mut config = Config::default();
        let args = Args {
            command: Command::Serve(ServeArgs {
                bind: Some("0.0.0.0".to_string()),
                port: None,
                precision: Some(1),
            }),
            config: None,
            verbose: true,
            quiet: false,
        };

        config.merge_with_args(&args);

        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.export.precision, 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[export]\nprecision = 4\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.export.precision, 4);

        std::fs::write(&path, "[export\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_out_of_range_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[export]\nprecision = 1000000\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("precision must be at most 10"));

        std::fs::write(&path, "[export]\nprecision = 10\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().export.precision, 10);
    }

    #[test]
    fn test_load_rejects_unsafe_csv_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        for name in [r#"zones\".csv"#, "zones\\u0007.csv", "../zones.csv", "  "] {
            let content = format!("[export]\ncsv_filename = \"{}\"\n", name);
            std::fs::write(&path, content).unwrap();
            assert!(Config::load(&path).is_err(), "accepted {:?}", name);
        }

        std::fs::write(&path, "[export]\ncsv_filename = \"hunts 2025.csv\"\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().export.csv_filename, "hunts 2025.csv");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[ingest]"));
        assert!(toml_str.contains("[export]"));
        assert!(toml_str.contains("[server]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.server.port, 8501);
    }
}
