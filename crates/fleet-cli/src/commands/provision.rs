//! Provision command - flash, register and label one device

use std::sync::Arc;

use anyhow::Result;
use fleet_client::{
    ApiClient, Catalog, CommandRunner, Environment, Flasher, ImageBuilder, LabelRenderer,
    ProvisionObserver, ProvisionStage, ProvisionTarget, Provisioner, SystemRunner,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::MergedConfig;
use crate::output::OutputContext;

/// Reports each pipeline stage on a spinner line.
///
/// The flashing tool writes to the same terminal, so the spinner is only
/// redrawn on stage changes.
struct StageSpinner {
    pb: ProgressBar,
}

impl StageSpinner {
    fn new(quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { pb }
    }
}

impl ProvisionObserver for StageSpinner {
    fn stage(&self, stage: ProvisionStage) {
        self.pb.set_message(format!("{}...", stage));
        self.pb.tick();
    }
}

/// Provision the device on the configured serial port and print its serial
pub async fn provision(
    client: &ApiClient,
    env: &Environment,
    config: &MergedConfig,
    class_name: &str,
    device_type: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let provisioner = Provisioner::new(
        Catalog::new(client),
        ProvisionTarget::from(env),
        ImageBuilder::new(&config.tools, runner.clone()),
        Flasher::new(config.tools.clone(), runner),
        LabelRenderer::new(config.label.clone()),
    );

    ctx.progress(&format!(
        "Provisioning {} device of class {} on {}",
        device_type, class_name, env.serial_device
    ));

    let spinner = StageSpinner::new(ctx.quiet);
    let result = provisioner
        .provision(class_name, device_type, &spinner)
        .await;
    spinner.pb.finish_and_clear();

    match result {
        Ok(done) => {
            ctx.done(&format!(
                "Device {} flashed with firmware {}, label at {}",
                done.device.device_id,
                done.firmware_id,
                done.label.display()
            ));
            println!("{}", done.device.serialnumber);
            Ok(())
        }
        Err(e) => {
            if let Some(device) = e.orphaned_device() {
                ctx.warn(&format!(
                    "Device record {} (serial {}) was created and is not rolled back",
                    device.device_id,
                    device.padded_serial()
                ));
            }
            Err(e.into())
        }
    }
}
