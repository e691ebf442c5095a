//! Device provisioning pipeline
//!
//! Turns a class name and a blank device on a serial port into a flashed,
//! registered and labeled device:
//!
//! 1. resolve the class and its assigned firmware
//! 2. download the firmware artifacts into a run-scoped workspace
//! 3. create the device record in the backend
//! 4. build the provisioning image from the new device's credentials
//! 5. erase and flash the full image set, then rewrite the provisioning image
//! 6. render the serial number label
//!
//! Every stage gates the next. Nothing is rolled back: once the device record
//! exists, later failures are reported as [`ProvisionError::AfterDeviceCreated`]
//! carrying the record so the operator can find it.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::catalog::{Catalog, CatalogError};
use crate::env::Environment;
use crate::flash::{FlashError, FlashLayout, Flasher};
use crate::image::{ImageBuilder, ImageError, ProvisioningRecord};
use crate::label::{LabelError, LabelRenderer};
use crate::types::{Device, DeviceClass, FirmwareArtifact};
use crate::workspace::RunWorkspace;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    ResolveClass,
    ResolveFirmware,
    DownloadArtifacts,
    CreateDevice,
    BuildImage,
    Flash,
    FlashProvisioning,
    RenderLabel,
}

impl std::fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolveClass => write!(f, "Resolving device class"),
            Self::ResolveFirmware => write!(f, "Resolving firmware"),
            Self::DownloadArtifacts => write!(f, "Downloading firmware"),
            Self::CreateDevice => write!(f, "Creating device record"),
            Self::BuildImage => write!(f, "Building provisioning image"),
            Self::Flash => write!(f, "Flashing device"),
            Self::FlashProvisioning => write!(f, "Writing provisioning image"),
            Self::RenderLabel => write!(f, "Rendering label"),
        }
    }
}

/// Receives stage transitions, e.g. to drive a progress display
pub trait ProvisionObserver {
    fn stage(&self, _stage: ProvisionStage) {}
}

impl ProvisionObserver for () {}

/// Failures after the device record was created
#[derive(Error, Debug)]
pub enum DeviceStageError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Firmware flash failed: {0}")]
    Flash(#[source] FlashError),

    #[error("Provisioning image flash failed: {0}")]
    FlashProvisioning(#[source] FlashError),

    #[error("Device flashed but label failed: {0}")]
    Label(#[from] LabelError),
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Device class {class} has no firmware assigned")]
    NoFirmwareAssigned { class: String },

    #[error("Failed to prepare run workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Failed to store {path}: {source}")]
    StoreArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source} (device {} remains registered)", describe_device(.device))]
    AfterDeviceCreated {
        device: Box<Device>,
        #[source]
        source: DeviceStageError,
    },
}

fn describe_device(device: &Device) -> String {
    format!("{}, serial {}", device.device_id, device.padded_serial())
}

impl ProvisionError {
    /// The backend record left behind, if the failure happened after creation
    pub fn orphaned_device(&self) -> Option<&Device> {
        match self {
            Self::AfterDeviceCreated { device, .. } => Some(&**device),
            _ => None,
        }
    }
}

/// Where and with which connection settings a device is provisioned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionTarget {
    pub serial_device: String,
    pub mqtt_host: String,
    pub mqtt_port: String,
    pub api_url: String,
}

impl From<&Environment> for ProvisionTarget {
    fn from(env: &Environment) -> Self {
        Self {
            serial_device: env.serial_device.clone(),
            mqtt_host: env.mqtt_host.clone(),
            mqtt_port: env.mqtt_port.clone(),
            api_url: env.api_url.clone(),
        }
    }
}

/// A successfully provisioned device
#[derive(Debug, Clone)]
pub struct ProvisionedDevice {
    pub device: Device,
    pub class: DeviceClass,
    pub firmware_id: String,
    pub label: PathBuf,
}

/// Runs the provisioning pipeline
pub struct Provisioner<'a> {
    catalog: Catalog<'a>,
    target: ProvisionTarget,
    images: ImageBuilder,
    flasher: Flasher,
    labels: LabelRenderer,
    scratch_root: Option<PathBuf>,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        catalog: Catalog<'a>,
        target: ProvisionTarget,
        images: ImageBuilder,
        flasher: Flasher,
        labels: LabelRenderer,
    ) -> Self {
        Self {
            catalog,
            target,
            images,
            flasher,
            labels,
            scratch_root: None,
        }
    }

    /// Create run workspaces under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Provision one device of class `class_name`
    #[instrument(skip(self, observer))]
    pub async fn provision(
        &self,
        class_name: &str,
        device_type: &str,
        observer: &dyn ProvisionObserver,
    ) -> Result<ProvisionedDevice, ProvisionError> {
        observer.stage(ProvisionStage::ResolveClass);
        let found = self.catalog.find_class(class_name).await?;

        observer.stage(ProvisionStage::ResolveFirmware);
        let class = self.catalog.get_class(&found.class_id).await?;
        let firmware_id = class
            .assigned_firmware()
            .ok_or_else(|| ProvisionError::NoFirmwareAssigned {
                class: class.name.clone(),
            })?
            .to_string();
        info!("Class {} uses firmware {}", class.name, firmware_id);

        let workspace = self.workspace()?;

        observer.stage(ProvisionStage::DownloadArtifacts);
        for artifact in FirmwareArtifact::ALL {
            let data = self
                .catalog
                .download_artifact(&firmware_id, artifact)
                .await?;
            let path = workspace.file(artifact.file_name());
            tokio::fs::write(&path, &data)
                .await
                .map_err(|source| ProvisionError::StoreArtifact {
                    path: path.clone(),
                    source,
                })?;
            info!("Fetched {} ({} bytes)", artifact, data.len());
        }

        observer.stage(ProvisionStage::CreateDevice);
        let device = self
            .catalog
            .create_device(&class.class_id, device_type)
            .await?;
        info!(
            "Created device {} with serial {}",
            device.device_id, device.serialnumber
        );

        let label = match self.flash_device(&workspace, &device, observer).await {
            Ok(label) => label,
            Err(source) => {
                warn!(
                    "Provisioning of device {} failed after creation: {}",
                    device.device_id, source
                );
                return Err(ProvisionError::AfterDeviceCreated {
                    device: Box::new(device),
                    source,
                });
            }
        };

        Ok(ProvisionedDevice {
            device,
            class,
            firmware_id,
            label,
        })
    }

    async fn flash_device(
        &self,
        workspace: &RunWorkspace,
        device: &Device,
        observer: &dyn ProvisionObserver,
    ) -> Result<PathBuf, DeviceStageError> {
        observer.stage(ProvisionStage::BuildImage);
        let record = ProvisioningRecord {
            device_id: device.device_id.clone(),
            mqtt_user: device.username.clone(),
            mqtt_password: device.password.clone(),
            mqtt_host: self.target.mqtt_host.clone(),
            mqtt_port: self.target.mqtt_port.clone(),
            api_url: self.target.api_url.clone(),
        };
        let image = self.images.build(workspace.path(), &record).await?;

        observer.stage(ProvisionStage::Flash);
        let layout = FlashLayout::full(|a| workspace.file(a.file_name()), &image);
        self.flasher
            .flash(&self.target.serial_device, &layout)
            .await
            .map_err(DeviceStageError::Flash)?;

        // Second write of the provisioning partition on its own.
        observer.stage(ProvisionStage::FlashProvisioning);
        self.flasher
            .flash_provisioning(&self.target.serial_device, &image)
            .await
            .map_err(DeviceStageError::FlashProvisioning)?;

        observer.stage(ProvisionStage::RenderLabel);
        Ok(self.labels.render(device.serialnumber).await?)
    }

    fn workspace(&self) -> Result<RunWorkspace, ProvisionError> {
        let workspace = match &self.scratch_root {
            Some(root) => RunWorkspace::create_in(root),
            None => RunWorkspace::create(),
        };
        workspace.map_err(ProvisionError::Workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(ProvisionStage::Flash.to_string(), "Flashing device");
        assert_eq!(
            ProvisionStage::FlashProvisioning.to_string(),
            "Writing provisioning image"
        );
    }

    #[test]
    fn test_orphaned_device_reported() {
        let device = Device {
            device_id: "d-1".into(),
            serialnumber: 3,
            username: "u".into(),
            password: "p".into(),
            device_type: None,
            class_id: None,
        };
        let err = ProvisionError::AfterDeviceCreated {
            device: Box::new(device),
            source: DeviceStageError::Flash(FlashError::ToolFailed { code: Some(2) }),
        };
        assert_eq!(err.orphaned_device().map(|d| d.serialnumber), Some(3));
        let message = err.to_string();
        assert!(message.contains("d-1, serial 000003"));
        assert!(message.contains("status 2"));
    }

    #[test]
    fn test_lookup_errors_have_no_device() {
        let err = ProvisionError::Catalog(CatalogError::ClassNotFound("x".into()));
        assert!(err.orphaned_device().is_none());
    }
}
