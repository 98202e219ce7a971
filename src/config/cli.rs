//! Command-line argument parsing

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::access_point::SecurityMode;

#[derive(Parser, Debug, Clone)]
#[clap(name = "wifi-link-manager", version, author)]
#[clap(about = "Scan, join and watch WiFi networks through wpa_supplicant")]
pub struct CliArgs {
    /// Wireless network interface name
    #[clap(short, long, default_value = "wlan0")]
    pub interface: String,

    /// Wired interface checked by the connectivity watcher
    #[clap(long, default_value = "eth0")]
    pub ethernet_interface: String,

    /// Seconds to wait for association
    #[clap(long, default_value = "10")]
    pub connect_timeout_secs: u64,

    /// Seconds to wait for scan results
    #[clap(long, default_value = "20")]
    pub scan_timeout_secs: u64,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan for access points
    Scan {
        /// Print results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Join a network
    Connect {
        #[clap(long)]
        ssid: String,

        #[clap(long, value_enum, default_value = "psk")]
        security: SecurityArg,

        #[clap(long, default_value = "")]
        password: String,

        /// Identity for EAP networks
        #[clap(long)]
        username: Option<String>,

        /// Save the network once joined
        #[clap(long)]
        persist: bool,
    },

    /// Disable the current network and disconnect
    Disconnect,

    /// List saved networks
    Saved {
        #[clap(long)]
        json: bool,
    },

    /// Remove a saved network
    Forget { network_id: usize },

    /// Show the current connection
    Status,

    /// Report connectivity changes until interrupted
    Watch,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityArg {
    Open,
    Wep,
    Psk,
    Eap,
}

impl From<SecurityArg> for SecurityMode {
    fn from(arg: SecurityArg) -> Self {
        match arg {
            SecurityArg::Open => SecurityMode::Open,
            SecurityArg::Wep => SecurityMode::Wep,
            SecurityArg::Psk => SecurityMode::Psk,
            SecurityArg::Eap => SecurityMode::Eap,
        }
    }
}
