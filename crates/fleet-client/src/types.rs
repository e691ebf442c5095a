//! Request and response types for the fleet backend

use serde::{Deserialize, Serialize};

fn default_one() -> u32 {
    1
}

// =============================================================================
// Device Classes
// =============================================================================

/// A named policy bucket controlling which firmware its devices receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceClass {
    pub class_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub firmware_id: Option<String>,
    #[serde(default)]
    pub beta_firmware_id: Option<String>,
    /// Devices of this class allowed mid-rollout at once
    #[serde(default = "default_one")]
    pub concurrent: u32,
    /// Failure count at which the backend halts a rollout
    #[serde(default = "default_one")]
    pub maxfails: u32,
}

impl DeviceClass {
    /// Assigned firmware, treating an empty id as unassigned
    pub fn assigned_firmware(&self) -> Option<&str> {
        self.firmware_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Body of `POST /device/class`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeviceClass {
    pub name: String,
    pub description: String,
    pub firmware_id: String,
    pub concurrent: u32,
    pub maxfails: u32,
}

impl NewDeviceClass {
    /// A class with no firmware and the most conservative rollout limits
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            firmware_id: String::new(),
            concurrent: 1,
            maxfails: 1,
        }
    }
}

/// Body of `POST /device/class/{id}`
///
/// The backend replaces the whole record, so only fields present here reach
/// it. Absent optional fields are not serialized at all.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassUpdate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta_firmware_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxfails: Option<u32>,
}

impl ClassUpdate {
    /// Full record read back from an existing class
    pub fn from_class(class: &DeviceClass) -> Self {
        Self {
            name: class.name.clone(),
            description: class.description.clone(),
            firmware_id: class.firmware_id.clone(),
            beta_firmware_id: class.beta_firmware_id.clone(),
            concurrent: Some(class.concurrent),
            maxfails: Some(class.maxfails),
        }
    }
}

// =============================================================================
// Firmware
// =============================================================================

/// A registered firmware build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firmware {
    pub firmware_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub version: String,
}

/// Body of `POST /device/firmware`
#[derive(Debug, Clone, Serialize)]
pub struct NewFirmware<'a> {
    pub name: &'a str,
    pub version: &'a str,
}

/// Answer of `POST /device/firmware`
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedFirmware {
    pub firmware_id: String,
}

/// Answer of `POST /device/firmware/{id}/{artifact}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub firmware_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The binaries that make up one firmware build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareArtifact {
    Bootloader,
    PartitionTable,
    /// Second-stage loader selecting the OTA slot
    BootApp0,
    Application,
}

impl FirmwareArtifact {
    /// All artifacts in flash order
    pub const ALL: [FirmwareArtifact; 4] = [
        Self::Bootloader,
        Self::PartitionTable,
        Self::BootApp0,
        Self::Application,
    ];

    /// Name the backend stores the binary under
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Bootloader => "bootloader.bin",
            Self::PartitionTable => "partitions.bin",
            Self::BootApp0 => "boot_app0.bin",
            Self::Application => "firmware.bin",
        }
    }

    /// Fixed flash address for this artifact
    pub fn flash_offset(self) -> u32 {
        match self {
            Self::Bootloader => 0x1000,
            Self::PartitionTable => 0x8000,
            Self::BootApp0 => 0xe000,
            Self::Application => 0x10000,
        }
    }
}

impl std::fmt::Display for FirmwareArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

// =============================================================================
// Devices
// =============================================================================

/// Body of `POST /device/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDevice {
    pub class_id: String,
    pub device_type: String,
}

/// A device record created by the backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub serialnumber: u64,
    /// Broker login generated by the backend
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
}

impl Device {
    /// Serial number as printed on the label
    pub fn padded_serial(&self) -> String {
        format!("{:06}", self.serialnumber)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("device_id", &self.device_id)
            .field("serialnumber", &self.serialnumber)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_type", &self.device_type)
            .field("class_id", &self.class_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_class_defaults_for_missing_fields() {
        let class: DeviceClass =
            serde_json::from_str(r#"{"class_id":"c1","name":"grow-v1"}"#).unwrap();
        assert_eq!(class.concurrent, 1);
        assert_eq!(class.maxfails, 1);
        assert_eq!(class.assigned_firmware(), None);
    }

    #[test]
    fn test_empty_firmware_id_is_unassigned() {
        let class: DeviceClass =
            serde_json::from_str(r#"{"class_id":"c1","name":"n","firmware_id":""}"#).unwrap();
        assert_eq!(class.assigned_firmware(), None);
    }

    #[test]
    fn test_class_update_skips_absent_fields() {
        let update = ClassUpdate {
            name: "grow-v1".into(),
            description: Some("grow box".into()),
            firmware_id: Some("fw-1".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "grow-v1",
                "description": "grow box",
                "firmware_id": "fw-1"
            })
        );
    }

    #[test]
    fn test_artifact_table() {
        let names: Vec<_> = FirmwareArtifact::ALL.iter().map(|a| a.file_name()).collect();
        assert_eq!(
            names,
            ["bootloader.bin", "partitions.bin", "boot_app0.bin", "firmware.bin"]
        );
        let offsets: Vec<_> = FirmwareArtifact::ALL
            .iter()
            .map(|a| a.flash_offset())
            .collect();
        assert_eq!(offsets, [0x1000, 0x8000, 0xe000, 0x10000]);
    }

    #[test]
    fn test_padded_serial() {
        let device: Device = serde_json::from_str(
            r#"{"device_id":"d-9","username":"u9","password":"p9","serialnumber":7}"#,
        )
        .unwrap();
        assert_eq!(device.padded_serial(), "000007");
        assert!(!format!("{:?}", device).contains("p9"));
    }
}
