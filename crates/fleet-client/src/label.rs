//! Printer label rendering

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Placeholder replaced by the padded serial number
pub const SERIAL_PLACEHOLDER: &str = "SERIALNUMBER";

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Failed to read label template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write label {path}: {source}")]
    WriteLabel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the label template lives and where rendered labels go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_template")]
    pub template: PathBuf,
    /// Shared spool path, overwritten on every render
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            output: default_output(),
        }
    }
}

fn default_template() -> PathBuf {
    PathBuf::from("/usr/share/plantalytix.zpl")
}

fn default_output() -> PathBuf {
    PathBuf::from("/print/label.zpl")
}

/// Fill the template's serial placeholder with a six-digit serial
pub fn render_label(template: &str, serialnumber: u64) -> String {
    template.replace(SERIAL_PLACEHOLDER, &format!("{:06}", serialnumber))
}

/// Renders serial number labels from a template file
#[derive(Debug, Clone)]
pub struct LabelRenderer {
    config: LabelConfig,
}

impl LabelRenderer {
    pub fn new(config: LabelConfig) -> Self {
        Self { config }
    }

    pub fn output_path(&self) -> &Path {
        &self.config.output
    }

    /// Render the label for `serialnumber`, replacing any previous label
    pub async fn render(&self, serialnumber: u64) -> Result<PathBuf, LabelError> {
        let template = tokio::fs::read_to_string(&self.config.template)
            .await
            .map_err(|source| LabelError::ReadTemplate {
                path: self.config.template.clone(),
                source,
            })?;

        let label = render_label(&template, serialnumber);

        tokio::fs::write(&self.config.output, label)
            .await
            .map_err(|source| LabelError::WriteLabel {
                path: self.config.output.clone(),
                source,
            })?;

        info!(
            "Label for serial {} written to {}",
            serialnumber,
            self.config.output.display()
        );
        Ok(self.config.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_is_zero_padded() {
        assert_eq!(render_label("^FDSERIALNUMBER^FS", 7), "^FD000007^FS");
    }

    #[test]
    fn test_every_placeholder_is_replaced() {
        assert_eq!(
            render_label("SERIALNUMBER/SERIALNUMBER", 42),
            "000042/000042"
        );
    }

    #[test]
    fn test_long_serial_is_not_truncated() {
        assert_eq!(render_label("SERIALNUMBER", 1_234_567), "1234567");
    }

    #[tokio::test]
    async fn test_render_overwrites_output() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("label.zpl.tmpl");
        let output = dir.path().join("label.zpl");
        std::fs::write(&template, "^XA^FDSERIALNUMBER^FS^XZ").unwrap();
        std::fs::write(&output, "stale label").unwrap();

        let renderer = LabelRenderer::new(LabelConfig {
            template,
            output: output.clone(),
        });
        renderer.render(12).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "^XA^FD000012^FS^XZ"
        );
    }

    #[tokio::test]
    async fn test_missing_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = LabelRenderer::new(LabelConfig {
            template: dir.path().join("missing.zpl"),
            output: dir.path().join("label.zpl"),
        });
        let err = renderer.render(1).await.unwrap_err();
        assert!(matches!(err, LabelError::ReadTemplate { .. }));
        assert!(!dir.path().join("label.zpl").exists());
    }
}
