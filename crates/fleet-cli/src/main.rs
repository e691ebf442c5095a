//! Fleet CLI - device provisioning and firmware catalog management
//!
//! Operator tool for flashing and registering devices, and for managing the
//! firmware builds and device classes they are provisioned from.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use fleet_client::{ApiClient, Catalog, Environment};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "fleet-cli")]
#[command(author, version, about = "Fleet device provisioning CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show tool version
    Version,

    /// Flash, register and label the device on the serial port
    Provision {
        /// Device class the device joins
        class_name: String,

        /// Device type recorded in the backend
        device_type: String,
    },

    /// Register a firmware build
    #[command(name = "create_fw")]
    CreateFw {
        /// Firmware name
        name: String,

        /// Firmware version
        #[arg(value_name = "VERSION")]
        fw_version: String,
    },

    /// Upload a binary to a firmware build
    #[command(name = "upload_fw")]
    UploadFw {
        /// Firmware ID
        firmware_id: String,

        /// Artifact name, e.g. firmware.bin
        name: String,

        /// Binary to upload
        file_path: PathBuf,
    },

    /// List firmware builds
    #[command(name = "list_fw")]
    ListFw,

    /// Assign a firmware build to a class by name and version
    Rollout {
        /// Firmware name
        firmware_name: String,

        /// Firmware version
        firmware_version: String,

        /// Device class name
        class_name: String,
    },

    /// Assign a firmware build to a class by ID, keeping rollout limits
    #[command(name = "rollout_id")]
    RolloutId {
        /// Firmware ID
        firmware_id: String,

        /// Device class name
        class_name: String,
    },

    /// Create a device class
    #[command(name = "create_class")]
    CreateClass {
        /// Class name
        name: String,

        /// Class description
        description: String,
    },

    /// List device classes
    Classes,

    /// Create a device record without flashing
    #[command(name = "create_device")]
    CreateDevice {
        /// Device class name
        class_name: String,

        /// Device type recorded in the backend
        device_type: String,
    },

    /// Build a Wi-Fi settings image
    #[command(name = "wifi_image")]
    WifiImage {
        /// Primary network SSID
        pssid: String,

        /// Primary network password
        ppassword: String,

        /// Fallback network SSID
        sssid: String,

        /// Fallback network password
        spassword: String,

        /// Where to write the image
        #[arg(long, default_value = "wifi.bin")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Version = cli.command {
        commands::version(&OutputContext::new(
            OutputFormat::default(),
            cli.no_color,
            cli.quiet,
        ));
        return Ok(());
    }

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load()?
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(cli.output, cli.no_color)?;
    debug!(
        output = ?merged.output,
        chip = %merged.tools.chip,
        "Configuration loaded"
    );

    // Create output context
    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);

    // Execute command
    match &cli.command {
        // Printed before the config file is read
        Commands::Version => {}

        Commands::Provision {
            class_name,
            device_type,
        } => {
            let env = load_environment()?;
            let client = create_client(&env)?;
            commands::provision(&client, &env, &merged, class_name, device_type, &ctx).await?;
        }

        Commands::CreateFw { name, fw_version } => {
            let client = create_client(&load_environment()?)?;
            commands::create_fw(&Catalog::new(&client), name, fw_version).await?;
        }

        Commands::UploadFw {
            firmware_id,
            name,
            file_path,
        } => {
            let client = create_client(&load_environment()?)?;
            commands::upload_fw(&Catalog::new(&client), firmware_id, name, file_path, &ctx)
                .await?;
        }

        Commands::ListFw => {
            let client = create_client(&load_environment()?)?;
            commands::list_fw(&Catalog::new(&client), &ctx).await?;
        }

        Commands::Rollout {
            firmware_name,
            firmware_version,
            class_name,
        } => {
            let client = create_client(&load_environment()?)?;
            commands::rollout(
                &Catalog::new(&client),
                firmware_name,
                firmware_version,
                class_name,
                &ctx,
            )
            .await?;
        }

        Commands::RolloutId {
            firmware_id,
            class_name,
        } => {
            let client = create_client(&load_environment()?)?;
            commands::rollout_id(&Catalog::new(&client), firmware_id, class_name, &ctx).await?;
        }

        Commands::CreateClass { name, description } => {
            let client = create_client(&load_environment()?)?;
            commands::create_class(&Catalog::new(&client), name, description, &ctx).await?;
        }

        Commands::Classes => {
            let client = create_client(&load_environment()?)?;
            commands::classes(&Catalog::new(&client), &ctx).await?;
        }

        Commands::CreateDevice {
            class_name,
            device_type,
        } => {
            let client = create_client(&load_environment()?)?;
            commands::create_device(&Catalog::new(&client), class_name, device_type, &ctx)
                .await?;
        }

        Commands::WifiImage {
            pssid,
            ppassword,
            sssid,
            spassword,
            out,
        } => {
            let wifi = fleet_client::WifiRecord {
                primary_ssid: pssid.clone(),
                primary_password: ppassword.clone(),
                secondary_ssid: sssid.clone(),
                secondary_password: spassword.clone(),
            };
            commands::wifi_image(&merged, &wifi, out, &ctx).await?;
        }
    }

    Ok(())
}

/// Read connection settings from the process environment
fn load_environment() -> Result<Environment> {
    Environment::from_env().context("Incomplete environment")
}

/// Create a backend client for the configured automation URL
fn create_client(env: &Environment) -> Result<ApiClient> {
    ApiClient::new(env.automation_url.as_str(), &env.automation_token)
        .context("Failed to create backend client")
}
