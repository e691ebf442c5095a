//! Wi-Fi image command

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_client::{ImageBuilder, RunWorkspace, SystemRunner, WifiRecord};

use crate::config::MergedConfig;
use crate::output::OutputContext;

/// Build a standalone Wi-Fi settings image and copy it to `out`
pub async fn wifi_image(
    config: &MergedConfig,
    wifi: &WifiRecord,
    out: &Path,
    ctx: &OutputContext,
) -> Result<()> {
    let workspace = RunWorkspace::create().context("Failed to create scratch directory")?;
    let builder = ImageBuilder::new(&config.tools, Arc::new(SystemRunner));

    let image = builder
        .build_wifi(workspace.path(), wifi)
        .await
        .context("Failed to build Wi-Fi image")?;

    tokio::fs::copy(&image, out)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    ctx.done(&format!("Wi-Fi image for {} written", wifi.primary_ssid));
    println!("{}", out.display());
    Ok(())
}
