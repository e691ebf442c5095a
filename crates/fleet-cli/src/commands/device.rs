//! Device record command

use anyhow::{Context, Result};
use fleet_client::Catalog;

use crate::output::{DeviceRow, OutputContext};

/// Create a device record in a class, without touching hardware
pub async fn create_device(
    catalog: &Catalog<'_>,
    class_name: &str,
    device_type: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let class = catalog
        .find_class(class_name)
        .await
        .with_context(|| format!("Failed to resolve class {}", class_name))?;

    let device = catalog
        .create_device(&class.class_id, device_type)
        .await
        .context("Failed to create device")?;

    ctx.print_one(&DeviceRow::from(device));
    Ok(())
}
