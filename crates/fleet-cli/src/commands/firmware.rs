//! Firmware catalog commands

use anyhow::{Context, Result};
use fleet_client::Catalog;
use std::path::Path;

use crate::output::{FirmwareRow, OutputContext};

/// Register a firmware build and print its id
pub async fn create_fw(
    catalog: &Catalog<'_>,
    name: &str,
    version: &str,
) -> Result<()> {
    let firmware_id = catalog
        .create_firmware(name, version)
        .await
        .with_context(|| format!("Failed to register firmware {} {}", name, version))?;

    println!("{}", firmware_id);
    Ok(())
}

/// Upload one binary to a firmware build
pub async fn upload_fw(
    catalog: &Catalog<'_>,
    firmware_id: &str,
    name: &str,
    file_path: &Path,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!("Uploading {} as {}...", file_path.display(), name));

    let receipt = catalog
        .upload_artifact(firmware_id, name, file_path)
        .await
        .with_context(|| format!("Failed to upload {} to firmware {}", name, firmware_id))?;

    ctx.success(&format!(
        "Uploaded {} to firmware {}",
        receipt.name.as_deref().unwrap_or(name),
        receipt.firmware_id
    ));
    Ok(())
}

/// List firmware builds
pub async fn list_fw(catalog: &Catalog<'_>, ctx: &OutputContext) -> Result<()> {
    let firmware = catalog
        .list_firmware()
        .await
        .context("Failed to list firmware")?;

    let rows: Vec<FirmwareRow> = firmware.into_iter().map(FirmwareRow::from).collect();
    ctx.print(&rows);
    Ok(())
}
