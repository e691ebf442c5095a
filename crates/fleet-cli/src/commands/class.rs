//! Device class and rollout commands

use anyhow::{Context, Result};
use fleet_client::Catalog;

use crate::output::{ClassRow, OutputContext, RolloutRow};

/// Create a device class with no firmware assigned
pub async fn create_class(
    catalog: &Catalog<'_>,
    name: &str,
    description: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let class = catalog
        .create_class(name, description)
        .await
        .with_context(|| format!("Failed to create class {}", name))?;

    ctx.print_one(&ClassRow::from(class));
    Ok(())
}

/// List device classes
pub async fn classes(catalog: &Catalog<'_>, ctx: &OutputContext) -> Result<()> {
    let classes = catalog
        .list_classes()
        .await
        .context("Failed to list device classes")?;

    let rows: Vec<ClassRow> = classes.into_iter().map(ClassRow::from).collect();
    ctx.print(&rows);
    Ok(())
}

/// Assign firmware to a class by name and version
pub async fn rollout(
    catalog: &Catalog<'_>,
    firmware_name: &str,
    firmware_version: &str,
    class_name: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let report = catalog
        .rollout(firmware_name, firmware_version, class_name)
        .await
        .with_context(|| {
            format!(
                "Failed to roll out {} {} to {}",
                firmware_name, firmware_version, class_name
            )
        })?;

    ctx.print_one(&RolloutRow::from(report));
    Ok(())
}

/// Assign firmware to a class by id as both primary and beta firmware
pub async fn rollout_id(
    catalog: &Catalog<'_>,
    firmware_id: &str,
    class_name: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let report = catalog
        .rollout_id(firmware_id, class_name)
        .await
        .with_context(|| format!("Failed to roll out {} to {}", firmware_id, class_name))?;

    ctx.print_one(&RolloutRow::from(report));
    Ok(())
}
