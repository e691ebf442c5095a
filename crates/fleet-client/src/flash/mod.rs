//! Flashing Module
//!
//! Writes firmware and provisioning images to a device over a serial port by
//! invoking an external flashing tool (esptool-compatible command line).
//!
//! # Configuration
//!
//! Tool commands and serial parameters are configurable, e.g. in TOML:
//!
//! ```toml
//! [tools]
//! flasher = ["python3", "/opt/esptool/esptool.py"]
//! chip = "esp32"
//! baud = 460800
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use fleet_client::flash::{Flasher, FlashLayout, ToolsConfig};
//! use fleet_client::SystemRunner;
//!
//! let flasher = Flasher::new(ToolsConfig::default(), Arc::new(SystemRunner));
//! let layout = FlashLayout::full(|a| dir.join(a.file_name()), &provisioning_bin);
//!
//! flasher.flash("/dev/ttyUSB0", &layout).await?;
//! flasher.flash_provisioning("/dev/ttyUSB0", &provisioning_bin).await?;
//! ```

mod client;
mod config;
mod types;

pub use client::*;
pub use config::*;
pub use types::*;
