//! Flashing orchestrator driving the external flashing tool

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use super::config::ToolsConfig;
use super::types::*;
use crate::image::display_code;
use crate::process::CommandRunner;

/// Flashing errors
#[derive(Debug, thiserror::Error)]
pub enum FlashError {
    #[error("Nothing to flash")]
    EmptyLayout,

    #[error("Failed to launch flashing tool `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Flashing tool exited with {}", display_code(.code))]
    ToolFailed { code: Option<i32> },
}

pub type Result<T> = std::result::Result<T, FlashError>;

/// Writes image sets to a device over a serial connection.
///
/// Each call is one tool invocation with a single pass/fail outcome. A device
/// that fails mid-write is left as the tool left it; nothing is rolled back.
#[derive(Clone)]
pub struct Flasher {
    config: ToolsConfig,
    runner: Arc<dyn CommandRunner>,
}

impl Flasher {
    pub fn new(config: ToolsConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Get the configuration
    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    /// Erase the whole chip and write `layout`
    #[instrument(skip(self, layout), fields(images = layout.images().len()))]
    pub async fn flash(&self, port: &str, layout: &FlashLayout) -> Result<()> {
        self.write(port, layout, true).await
    }

    /// Rewrite only the provisioning partition, leaving the rest of flash intact
    #[instrument(skip(self))]
    pub async fn flash_provisioning(&self, port: &str, image: &Path) -> Result<()> {
        self.write(port, &FlashLayout::provisioning_only(image), false)
            .await
    }

    /// Full argument list for one invocation, excluding the program itself
    pub fn args(&self, port: &str, layout: &FlashLayout, erase_all: bool) -> Vec<String> {
        let mut args: Vec<String> = [
            "--chip",
            self.config.chip.as_str(),
            "--port",
            port,
            "--baud",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(self.config.baud.to_string());
        args.extend(
            [
                "--before",
                "default_reset",
                "--after",
                "hard_reset",
                "write_flash",
                "-z",
            ]
            .map(String::from),
        );
        if erase_all {
            args.push("--erase-all".to_string());
        }
        args.extend(
            [
                "--flash_mode",
                "dio",
                "--flash_freq",
                "40m",
                "--flash_size",
                "detect",
            ]
            .map(String::from),
        );
        args.extend(layout.to_args());

        self.config.flasher.args_with(args)
    }

    async fn write(&self, port: &str, layout: &FlashLayout, erase_all: bool) -> Result<()> {
        if layout.is_empty() {
            return Err(FlashError::EmptyLayout);
        }

        let args = self.args(port, layout, erase_all);
        info!(
            "Writing {} image(s) to {} (erase_all={})",
            layout.images().len(),
            port,
            erase_all
        );

        let status = self
            .runner
            .run(self.config.flasher.program(), &args)
            .await
            .map_err(|source| FlashError::Launch {
                command: self.config.flasher.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(FlashError::ToolFailed { code: status.code })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SystemRunner;
    use pretty_assertions::assert_eq;

    fn flasher() -> Flasher {
        Flasher::new(ToolsConfig::default(), Arc::new(SystemRunner))
    }

    #[test]
    fn test_full_flash_args() {
        let layout = FlashLayout::provisioning_only(Path::new("/tmp/p.bin"));
        let args = flasher().args("/dev/ttyUSB0", &layout, true);
        assert_eq!(
            args,
            [
                "--chip",
                "esp32",
                "--port",
                "/dev/ttyUSB0",
                "--baud",
                "460800",
                "--before",
                "default_reset",
                "--after",
                "hard_reset",
                "write_flash",
                "-z",
                "--erase-all",
                "--flash_mode",
                "dio",
                "--flash_freq",
                "40m",
                "--flash_size",
                "detect",
                "0x610000",
                "/tmp/p.bin",
            ]
        );
    }

    #[test]
    fn test_no_erase_for_partial_write() {
        let layout = FlashLayout::provisioning_only(Path::new("/tmp/p.bin"));
        let args = flasher().args("/dev/ttyUSB0", &layout, false);
        assert!(!args.contains(&"--erase-all".to_string()));
    }

    #[test]
    fn test_tool_prefix_args_come_first() {
        let config = ToolsConfig::builder()
            .flasher(crate::process::ToolCommand::new(["python3", "esptool.py"]))
            .build();
        let flasher = Flasher::new(config, Arc::new(SystemRunner));
        let layout = FlashLayout::provisioning_only(Path::new("p.bin"));
        let args = flasher.args("/dev/ttyUSB1", &layout, false);
        assert_eq!(args[0], "esptool.py");
        assert_eq!(args[1], "--chip");
    }

    #[tokio::test]
    async fn test_empty_layout_is_rejected() {
        let result = flasher().flash("/dev/ttyUSB0", &FlashLayout::new()).await;
        assert!(matches!(result, Err(FlashError::EmptyLayout)));
    }
}
