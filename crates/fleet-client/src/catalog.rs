//! Device class and firmware catalog, including rollout assignment

use std::path::Path;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, instrument};

use crate::client::{encode_path_segment, ApiClient};
use crate::error::ClientError;
use crate::types::*;

/// Errors from catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Device class not found: {0}")]
    ClassNotFound(String),

    #[error("Firmware not found: {name} {version}")]
    FirmwareNotFound { name: String, version: String },

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Outcome of assigning firmware to a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutReport {
    /// Class as it was before the update
    pub class: DeviceClass,
    pub firmware_id: String,
    /// The exact record sent to the backend
    pub update: ClassUpdate,
}

/// Class, firmware and device operations on the fleet backend
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    api: &'a ApiClient,
}

impl<'a> Catalog<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    // =========================================================================
    // Device Classes
    // =========================================================================

    /// Look up a class by its (conventionally unique) name
    #[instrument(skip(self))]
    pub async fn find_class(&self, name: &str) -> Result<DeviceClass> {
        let path = format!("/device/class/find/{}", encode_path_segment(name));
        self.api
            .get_json(&path)
            .await
            .map_err(|e| not_found_as(e, || CatalogError::ClassNotFound(name.to_string())))
    }

    /// Fetch a class by id
    #[instrument(skip(self))]
    pub async fn get_class(&self, class_id: &str) -> Result<DeviceClass> {
        let path = format!("/device/class/{}", encode_path_segment(class_id));
        self.api
            .get_json(&path)
            .await
            .map_err(|e| not_found_as(e, || CatalogError::ClassNotFound(class_id.to_string())))
    }

    /// List every class
    #[instrument(skip(self))]
    pub async fn list_classes(&self) -> Result<Vec<DeviceClass>> {
        Ok(self.api.get_json("/device/class").await?)
    }

    /// Replace a class record; the backend keeps nothing that is not sent
    #[instrument(skip(self, update))]
    pub async fn update_class(&self, class_id: &str, update: &ClassUpdate) -> Result<()> {
        let path = format!("/device/class/{}", encode_path_segment(class_id));
        info!("Updating class {}", class_id);
        let response = self.api.post(&path, update).await?;
        self.api
            .handle_json::<serde_json::Value>(response)
            .await
            .map_err(|e| not_found_as(e, || CatalogError::ClassNotFound(class_id.to_string())))?;
        Ok(())
    }

    /// Create a class with no firmware and rollout limits of one.
    ///
    /// The backend only acknowledges creation, so the stored record is read
    /// back by name.
    #[instrument(skip(self))]
    pub async fn create_class(&self, name: &str, description: &str) -> Result<DeviceClass> {
        let body = NewDeviceClass::new(name, description);
        info!("Creating class {}", name);
        let response = self.api.post("/device/class", &body).await?;
        self.api.handle_json::<serde_json::Value>(response).await?;
        self.find_class(name).await
    }

    // =========================================================================
    // Firmware
    // =========================================================================

    /// Register a firmware build, returning its id
    #[instrument(skip(self))]
    pub async fn create_firmware(&self, name: &str, version: &str) -> Result<String> {
        info!("Registering firmware {} {}", name, version);
        let response = self
            .api
            .post_form("/device/firmware", &NewFirmware { name, version })
            .await?;
        let created: CreatedFirmware = self.api.handle_json(response).await?;
        Ok(created.firmware_id)
    }

    /// Attach a binary to a firmware build under `artifact_name`
    #[instrument(skip(self))]
    pub async fn upload_artifact(
        &self,
        firmware_id: &str,
        artifact_name: &str,
        file: &Path,
    ) -> Result<UploadReceipt> {
        let data = tokio::fs::read(file)
            .await
            .map_err(|source| CatalogError::ReadFile {
                path: file.display().to_string(),
                source,
            })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact_name.to_string());

        info!(
            "Uploading {} ({} bytes) to firmware {}",
            artifact_name,
            data.len(),
            firmware_id
        );
        let path = format!(
            "/device/firmware/{}/{}",
            encode_path_segment(firmware_id),
            encode_path_segment(artifact_name)
        );
        let response = self
            .api
            .post_multipart(&path, "binary", &file_name, Bytes::from(data))
            .await?;
        Ok(self.api.handle_json(response).await?)
    }

    /// List every registered firmware build
    #[instrument(skip(self))]
    pub async fn list_firmware(&self) -> Result<Vec<Firmware>> {
        Ok(self.api.get_json("/device/firmware").await?)
    }

    /// Look up a firmware build by name and version
    #[instrument(skip(self))]
    pub async fn find_firmware(&self, name: &str, version: &str) -> Result<Firmware> {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("name", name)
            .append_pair("version", version)
            .finish();
        self.api
            .get_json(&format!("/device/firmware/find?{}", query))
            .await
            .map_err(|e| {
                not_found_as(e, || CatalogError::FirmwareNotFound {
                    name: name.to_string(),
                    version: version.to_string(),
                })
            })
    }

    /// Download one binary of a firmware build
    #[instrument(skip(self))]
    pub async fn download_artifact(
        &self,
        firmware_id: &str,
        artifact: FirmwareArtifact,
    ) -> Result<Bytes> {
        let path = format!(
            "/device/firmware/{}/{}",
            encode_path_segment(firmware_id),
            artifact.file_name()
        );
        Ok(self.api.get_bytes(&path).await?)
    }

    // =========================================================================
    // Devices
    // =========================================================================

    /// Create a device record; the backend assigns identity and credentials
    #[instrument(skip(self))]
    pub async fn create_device(&self, class_id: &str, device_type: &str) -> Result<Device> {
        let body = NewDevice {
            class_id: class_id.to_string(),
            device_type: device_type.to_string(),
        };
        info!("Creating {} device in class {}", device_type, class_id);
        Ok(self.api.post_json("/device/create", &body).await?)
    }

    // =========================================================================
    // Rollout
    // =========================================================================

    /// Assign firmware `name`/`version` to a class.
    ///
    /// Sends only name, description and firmware id. `concurrent` and
    /// `maxfails` are left out of the update entirely.
    #[instrument(skip(self))]
    pub async fn rollout(
        &self,
        firmware_name: &str,
        firmware_version: &str,
        class_name: &str,
    ) -> Result<RolloutReport> {
        let class = self.find_class(class_name).await?;
        let firmware = self.find_firmware(firmware_name, firmware_version).await?;

        let update = ClassUpdate {
            name: class.name.clone(),
            description: class.description.clone(),
            firmware_id: Some(firmware.firmware_id.clone()),
            ..Default::default()
        };
        self.update_class(&class.class_id, &update).await?;

        info!(
            "Rolled out firmware {} to class {}",
            firmware.firmware_id, class.name
        );
        Ok(RolloutReport {
            class,
            firmware_id: firmware.firmware_id,
            update,
        })
    }

    /// Assign a firmware id to a class as both primary and beta firmware,
    /// carrying over the class's rollout limits
    #[instrument(skip(self))]
    pub async fn rollout_id(&self, firmware_id: &str, class_name: &str) -> Result<RolloutReport> {
        let class = self.find_class(class_name).await?;

        let update = ClassUpdate {
            firmware_id: Some(firmware_id.to_string()),
            beta_firmware_id: Some(firmware_id.to_string()),
            ..ClassUpdate::from_class(&class)
        };
        self.update_class(&class.class_id, &update).await?;

        info!("Rolled out firmware {} to class {}", firmware_id, class.name);
        Ok(RolloutReport {
            class,
            firmware_id: firmware_id.to_string(),
            update,
        })
    }
}

fn not_found_as(error: ClientError, not_found: impl FnOnce() -> CatalogError) -> CatalogError {
    if error.is_not_found() {
        not_found()
    } else {
        CatalogError::Client(error)
    }
}
