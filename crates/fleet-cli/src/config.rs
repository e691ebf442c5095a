//! Configuration file handling for fleet-cli

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use fleet_client::{LabelConfig, ToolsConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// External tool commands and serial parameters
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Label template and spool paths
    #[serde(default)]
    pub label: LabelConfig,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("fleet-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        self,
        output: Option<OutputFormat>,
        no_color: bool,
    ) -> Result<MergedConfig> {
        let output = match (output, self.output.as_deref()) {
            (Some(format), _) => format,
            (None, Some(name)) => OutputFormat::from_str(name, true)
                .map_err(|_| anyhow!("Unknown output format in config file: {}", name))?,
            (None, None) => OutputFormat::default(),
        };

        Ok(MergedConfig {
            output,
            no_color: no_color || self.no_color.unwrap_or(false),
            tools: self.tools,
            label: self.label,
        })
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub output: OutputFormat,
    pub no_color: bool,
    pub tools: ToolsConfig,
    pub label: LabelConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_client::ToolCommand;

    #[test]
    fn test_full_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
output = "json"
no_color = true

[tools]
generator = ["python3", "/opt/nvs/nvs_partition_gen.py"]
flasher = ["python3", "/opt/esptool/esptool.py"]
chip = "esp32s3"
baud = 921600

[label]
template = "/etc/fleet/label.zpl"
output = "/tmp/label.zpl"
"#,
        )
        .unwrap();

        let merged = Config::load_from(&path)
            .unwrap()
            .merge_with_args(None, false)
            .unwrap();
        assert_eq!(merged.output, OutputFormat::Json);
        assert!(merged.no_color);
        assert_eq!(
            merged.tools.flasher,
            ToolCommand::new(["python3", "/opt/esptool/esptool.py"])
        );
        assert_eq!(merged.tools.chip, "esp32s3");
        assert_eq!(merged.tools.baud, 921600);
        assert_eq!(merged.label.template, PathBuf::from("/etc/fleet/label.zpl"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("output = \"csv\"").unwrap();
        assert_eq!(config.tools, ToolsConfig::default());
        assert_eq!(config.label, LabelConfig::default());
    }

    #[test]
    fn test_cli_args_win() {
        let config = Config {
            output: Some("csv".into()),
            ..Default::default()
        };
        let merged = config
            .merge_with_args(Some(OutputFormat::Json), false)
            .unwrap();
        assert_eq!(merged.output, OutputFormat::Json);
        assert!(!merged.no_color);
    }

    #[test]
    fn test_unknown_output_format() {
        let config = Config {
            output: Some("yaml".into()),
            ..Default::default()
        };
        assert!(config.merge_with_args(None, false).is_err());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tools\nbaud = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
