//! External tool configuration

use serde::{Deserialize, Serialize};

use crate::process::ToolCommand;

/// Configuration for the partition generator and the flashing tool
///
/// Can be embedded in a TOML/JSON config file or constructed programmatically.
/// Every field has a default, so an empty table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// NVS partition generator command
    #[serde(default = "default_generator")]
    pub generator: ToolCommand,

    /// Flashing tool command
    #[serde(default = "default_flasher")]
    pub flasher: ToolCommand,

    /// Chip family passed to the flashing tool
    #[serde(default = "default_chip")]
    pub chip: String,

    /// Serial baud rate
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Size of generated NVS images in bytes
    #[serde(default = "default_nvs_size")]
    pub nvs_size: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            generator: default_generator(),
            flasher: default_flasher(),
            chip: default_chip(),
            baud: default_baud(),
            nvs_size: default_nvs_size(),
        }
    }
}

fn default_generator() -> ToolCommand {
    ToolCommand::new(["python3", "-m", "esp_idf_nvs_partition_gen"])
}

fn default_flasher() -> ToolCommand {
    ToolCommand::new(["esptool.py"])
}

fn default_chip() -> String {
    "esp32".to_string()
}

fn default_baud() -> u32 {
    460_800
}

fn default_nvs_size() -> u32 {
    0x3000
}

impl ToolsConfig {
    /// Create a builder for programmatic configuration
    pub fn builder() -> ToolsConfigBuilder {
        ToolsConfigBuilder::default()
    }
}

/// Builder for [`ToolsConfig`]
#[derive(Debug, Default)]
pub struct ToolsConfigBuilder {
    config: ToolsConfig,
}

impl ToolsConfigBuilder {
    pub fn generator(mut self, command: ToolCommand) -> Self {
        self.config.generator = command;
        self
    }

    pub fn flasher(mut self, command: ToolCommand) -> Self {
        self.config.flasher = command;
        self
    }

    pub fn chip(mut self, chip: impl Into<String>) -> Self {
        self.config.chip = chip.into();
        self
    }

    pub fn baud(mut self, baud: u32) -> Self {
        self.config.baud = baud;
        self
    }

    pub fn nvs_size(mut self, size: u32) -> Self {
        self.config.nvs_size = size;
        self
    }

    pub fn build(self) -> ToolsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_table() {
        let config: ToolsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ToolsConfig::default());
        assert_eq!(config.chip, "esp32");
        assert_eq!(config.baud, 460_800);
        assert_eq!(config.nvs_size, 0x3000);
    }

    #[test]
    fn test_partial_override() {
        let config: ToolsConfig =
            serde_json::from_str(r#"{"flasher": ["python3", "esptool.py"], "baud": 921600}"#)
                .unwrap();
        assert_eq!(config.flasher.program(), "python3");
        assert_eq!(config.baud, 921_600);
        assert_eq!(config.generator, default_generator());
    }

    #[test]
    fn test_builder() {
        let config = ToolsConfig::builder()
            .chip("esp32s3")
            .baud(115_200)
            .build();
        assert_eq!(config.chip, "esp32s3");
        assert_eq!(config.baud, 115_200);
    }
}
