//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use smartlink_domain::wifi::DEFAULT_KEY_TYPE;

use crate::config::{Config, SimulatedDevice};

/// Control smart plugs, power strips, hubs and bulbs.
#[derive(Debug, Parser)]
#[command(name = "smartctl", version)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, env = "SMARTLINK_CONFIG", default_value = "smartlink.toml")]
    pub config: PathBuf,

    /// Device hostname or IP address (overrides config and environment).
    #[arg(long)]
    pub host: Option<String>,

    /// Account username.
    #[arg(long)]
    pub username: Option<String>,

    /// Account password.
    #[arg(long)]
    pub password: Option<String>,

    /// Hashed credentials, used instead of username/password.
    #[arg(long)]
    pub credentials_hash: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Simulated device to drive.
    #[arg(long, value_enum, env = "SMARTLINK_SIMULATE")]
    pub simulate: Option<SimulatedDevice>,

    /// Run the command against this child device.
    #[arg(long)]
    pub child: Option<String>,

    /// Print raw JSON instead of a human-readable report.
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.device.host.clone_from(host);
        }
        if let Some(username) = &self.username {
            config.device.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.device.password = Some(password.clone());
        }
        if let Some(hash) = &self.credentials_hash {
            config.device.credentials_hash = Some(hash.clone());
        }
        if let Some(timeout) = self.timeout {
            config.device.timeout_secs = timeout;
        }
        if let Some(device) = self.simulate {
            config.simulation.device = device;
        }
    }
}

#[derive(Debug, Clone, Default, Subcommand)]
pub enum Command {
    /// Print the device state.
    #[default]
    State,
    /// Turn the device on.
    On,
    /// Turn the device off.
    Off,
    /// Flip the on/off state.
    Toggle,
    /// Rename the device.
    Alias {
        /// New name.
        name: String,
    },
    /// Reboot the device.
    Reboot {
        /// Seconds to wait before rebooting.
        #[arg(long, default_value_t = 1)]
        delay: u32,
    },
    /// Restore factory settings.
    FactoryReset,
    /// Print the raw device information.
    Sysinfo,
    /// List features, read one, or set one.
    Feature {
        /// Feature id.
        id: Option<String>,
        /// New value (`on`, `off`, numbers or JSON).
        value: Option<String>,
    },
    /// Wireless network commands.
    #[command(subcommand)]
    Wifi(WifiCommand),
    /// Change the account the device is bound to.
    UpdateCredentials {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Scan for new child devices and attach them.
    Pair {
        /// Scan length in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Detach a child device.
    Unpair {
        /// Id of the child to remove.
        child_id: String,
    },
    /// Send a raw method call.
    #[command(name = "command")]
    Raw {
        /// Method name.
        method: String,
        /// JSON parameters.
        params: Option<String>,
    },
}

impl Command {
    /// Whether the device must be refreshed before running the command.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        !matches!(self, Self::Raw { .. })
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum WifiCommand {
    /// List visible networks.
    Scan,
    /// Join a network. The device drops its connection afterwards.
    Join {
        ssid: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = DEFAULT_KEY_TYPE)]
        keytype: String,
    },
}
