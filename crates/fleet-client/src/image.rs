//! NVS provisioning image builder
//!
//! Identity and credentials reach the device as an NVS partition image. The
//! key/value table is rendered to the generator's CSV input format, then the
//! external partition generator turns it into a binary image of fixed size.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::flash::ToolsConfig;
use crate::process::{CommandRunner, ToolCommand};

/// NVS namespace holding device identity
pub const PROVISIONING_NAMESPACE: &str = "fg_provisioning";
/// NVS namespace holding Wi-Fi settings
pub const WIFI_NAMESPACE: &str = "settings";

/// Errors from building an NVS image
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to write generator input {path}: {source}")]
    WriteInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch image generator `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image generator exited with {}", display_code(.code))]
    GeneratorFailed { code: Option<i32> },
}

pub(crate) fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Identity and connection settings written into a device
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisioningRecord {
    pub device_id: String,
    pub mqtt_user: String,
    pub mqtt_password: String,
    pub mqtt_host: String,
    pub mqtt_port: String,
    pub api_url: String,
}

impl std::fmt::Debug for ProvisioningRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningRecord")
            .field("device_id", &self.device_id)
            .field("mqtt_user", &self.mqtt_user)
            .field("mqtt_password", &"<redacted>")
            .field("mqtt_host", &self.mqtt_host)
            .field("mqtt_port", &self.mqtt_port)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl ProvisioningRecord {
    /// Generator input for this record
    pub fn to_csv(&self) -> String {
        render_nvs_csv(
            PROVISIONING_NAMESPACE,
            &[
                ("device_id", self.device_id.as_str()),
                ("mqtt_user", self.mqtt_user.as_str()),
                ("mqtt_password", self.mqtt_password.as_str()),
                ("mqtt_host", self.mqtt_host.as_str()),
                ("mqtt_port", self.mqtt_port.as_str()),
                ("api_url", self.api_url.as_str()),
            ],
        )
    }
}

/// Primary and fallback Wi-Fi credentials
#[derive(Clone, PartialEq, Eq)]
pub struct WifiRecord {
    pub primary_ssid: String,
    pub primary_password: String,
    pub secondary_ssid: String,
    pub secondary_password: String,
}

impl std::fmt::Debug for WifiRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiRecord")
            .field("primary_ssid", &self.primary_ssid)
            .field("secondary_ssid", &self.secondary_ssid)
            .finish_non_exhaustive()
    }
}

impl WifiRecord {
    /// Generator input for this record
    pub fn to_csv(&self) -> String {
        render_nvs_csv(
            WIFI_NAMESPACE,
            &[
                ("pssid", self.primary_ssid.as_str()),
                ("ppassword", self.primary_password.as_str()),
                ("sssid", self.secondary_ssid.as_str()),
                ("spassword", self.secondary_password.as_str()),
            ],
        )
    }
}

/// Render a namespace declaration plus string entries as generator CSV
pub fn render_nvs_csv(namespace: &str, entries: &[(&str, &str)]) -> String {
    let mut csv = String::from("key,type,encoding,value\n");
    csv.push_str(namespace);
    csv.push_str(",namespace,,\n");
    for (key, value) in entries {
        csv.push_str(key);
        csv.push_str(",data,string,");
        csv.push_str(&csv_field(value));
        csv.push('\n');
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Builds NVS images with the external partition generator
#[derive(Clone)]
pub struct ImageBuilder {
    generator: ToolCommand,
    image_size: u32,
    runner: Arc<dyn CommandRunner>,
}

impl ImageBuilder {
    pub fn new(tools: &ToolsConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            generator: tools.generator.clone(),
            image_size: tools.nvs_size,
            runner,
        }
    }

    /// Build the device provisioning image inside `workdir`
    #[instrument(skip(self, record), fields(device_id = %record.device_id))]
    pub async fn build(
        &self,
        workdir: &Path,
        record: &ProvisioningRecord,
    ) -> Result<PathBuf, ImageError> {
        self.generate(workdir, "provisioning", &record.to_csv())
            .await
    }

    /// Build a standalone Wi-Fi settings image inside `workdir`
    #[instrument(skip(self, record))]
    pub async fn build_wifi(&self, workdir: &Path, record: &WifiRecord) -> Result<PathBuf, ImageError> {
        self.generate(workdir, "wifi", &record.to_csv()).await
    }

    async fn generate(&self, workdir: &Path, stem: &str, csv: &str) -> Result<PathBuf, ImageError> {
        let input = workdir.join(format!("{}.csv", stem));
        let output = workdir.join(format!("{}.bin", stem));

        tokio::fs::write(&input, csv)
            .await
            .map_err(|source| ImageError::WriteInput {
                path: input.clone(),
                source,
            })?;

        let args = self.generator.args_with([
            "generate".to_string(),
            input.display().to_string(),
            output.display().to_string(),
            format!("{:#x}", self.image_size),
        ]);

        info!("Generating {} image", stem);
        let status = self
            .runner
            .run(self.generator.program(), &args)
            .await
            .map_err(|source| ImageError::Launch {
                command: self.generator.to_string(),
                source,
            })?;

        if !status.success() {
            return Err(ImageError::GeneratorFailed { code: status.code });
        }
        Ok(output)
    }
}
