//! Fleet Client Library
//!
//! Typed client for the fleet backend plus the device provisioning pipeline
//! built on top of it.
//!
//! # Example
//!
//! ```rust,no_run
//! use fleet_client::{ApiClient, Catalog, Environment};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let env = Environment::from_env()?;
//!     let api = ApiClient::new(env.automation_url.as_str(), &env.automation_token)?;
//!     let catalog = Catalog::new(&api);
//!
//!     // List device classes
//!     let classes = catalog.list_classes().await?;
//!
//!     // Assign firmware to a class
//!     catalog.rollout("grow", "1.4.0", "grow-v1").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Provisioning
//!
//! [`Provisioner`] drives a blank device from class name to a flashed,
//! registered and labeled unit. External tools are run through a
//! [`CommandRunner`], so tests can substitute a recording runner:
//!
//! ```rust,ignore
//! let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
//! let provisioner = Provisioner::new(
//!     Catalog::new(&api),
//!     ProvisionTarget::from(&env),
//!     ImageBuilder::new(&tools, runner.clone()),
//!     Flasher::new(tools.clone(), runner),
//!     LabelRenderer::new(LabelConfig::default()),
//! );
//! let done = provisioner.provision("grow-v1", "grow", &()).await?;
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-process mock backend:
//!
//! ```rust,ignore
//! use fleet_client::testing::{MockBackend, TestServer};
//!
//! let backend = MockBackend::new();
//! let server = TestServer::start(backend.router()).await?;
//! let classes = Catalog::new(&server.client).list_classes().await?;
//! ```

mod catalog;
mod client;
mod env;
mod error;
pub mod flash;
mod image;
mod label;
mod process;
mod provision;
mod session;
pub mod testing;
mod types;
mod workspace;

pub use catalog::{Catalog, CatalogError, RolloutReport};
pub use client::ApiClient;
pub use env::{
    ConfigError, Environment, DEFAULT_SERIAL_DEVICE, VAR_API_URL, VAR_AUTOMATION_TOKEN,
    VAR_AUTOMATION_URL, VAR_MQTT_HOST, VAR_MQTT_PORT, VAR_SERIAL_DEVICE,
};
pub use error::{AuthError, ClientError, Result};
pub use image::{
    render_nvs_csv, ImageBuilder, ImageError, ProvisioningRecord, WifiRecord,
    PROVISIONING_NAMESPACE, WIFI_NAMESPACE,
};
pub use label::{render_label, LabelConfig, LabelError, LabelRenderer, SERIAL_PLACEHOLDER};
pub use process::{CommandRunner, ExitStatus, SystemRunner, ToolCommand};
pub use provision::{
    DeviceStageError, ProvisionError, ProvisionObserver, ProvisionStage, ProvisionTarget,
    ProvisionedDevice, Provisioner,
};
pub use session::{AuthToken, Session};
pub use types::*;
pub use workspace::RunWorkspace;

// Re-export flash types for convenience
pub use flash::{FlashError, FlashLayout, Flasher, ToolsConfig};
