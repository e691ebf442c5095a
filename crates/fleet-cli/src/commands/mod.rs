//! Command implementations for fleet-cli

pub mod class;
pub mod device;
pub mod firmware;
pub mod provision;
pub mod version;
pub mod wifi;

pub use class::{classes, create_class, rollout, rollout_id};
pub use device::create_device;
pub use firmware::{create_fw, list_fw, upload_fw};
pub use provision::provision;
pub use version::version;
pub use wifi::wifi_image;
