//! # smartctl — smart device command line
//!
//! Composition root that wires a device session to a transport and runs one
//! command against it.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Initialise logging
//! - Construct the transport (the virtual adapter) and the device session
//! - Refresh the device, run the requested command and print the result
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer. No device logic belongs here.

mod cli;
mod commands;
mod config;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use smartlink_adapter_virtual::VirtualProtocol;
use smartlink_app::SmartDevice;

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate()?;

    init_tracing(if cli.debug { "debug" } else { config.logging.filter.as_str() })?;

    // Device
    let protocol = VirtualProtocol::new(config.simulation.device.into());
    let mut device = SmartDevice::new(config.device_config(), protocol);
    tracing::debug!(host = %device.host(), simulated = ?config.simulation.device, "session created");

    let command = cli.command.clone().unwrap_or_default();
    if command.needs_update() {
        device.update(true).await.context("initial update failed")?;
    }

    let result = commands::run(&mut device, &command, cli.child.as_deref()).await;
    device.close().await;
    let output = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output.json)?);
    } else {
        println!("{}", output.text);
    }
    Ok(())
}

fn init_tracing(filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter).with_context(|| format!("invalid log filter {filter:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}
