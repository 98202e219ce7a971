//! Runtime settings

use std::time::Duration;

use crate::config::CliArgs;

/// Bounds on the waits of the orchestrators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Wait for association after a connect request
    pub connect: Duration,
    /// Wait for scan results after a scan request
    pub scan: Duration,
    /// Wait for the radio to come up after enabling it
    pub radio_enable: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            scan: Duration::from_secs(20),
            radio_enable: Duration::from_secs(5),
        }
    }
}

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub interface: String,
    pub ethernet_interface: String,
    pub timeouts: Timeouts,
}

impl From<CliArgs> for Settings {
    fn from(args: CliArgs) -> Self {
        let defaults = Timeouts::default();

        Settings {
            interface: args.interface,
            ethernet_interface: args.ethernet_interface,
            timeouts: Timeouts {
                connect: Duration::from_secs(args.connect_timeout_secs),
                scan: Duration::from_secs(args.scan_timeout_secs),
                radio_enable: defaults.radio_enable,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_settings_defaults_from_cli() {
        let args = CliArgs::parse_from(["wifi-link-manager", "status"]);
        let settings = Settings::from(args);

        assert_eq!(settings.interface, "wlan0");
        assert_eq!(settings.ethernet_interface, "eth0");
        assert_eq!(settings.timeouts, Timeouts::default());
    }

    #[test]
    fn test_settings_timeouts_from_cli() {
        let args = CliArgs::parse_from([
            "wifi-link-manager",
            "--interface",
            "wlp2s0",
            "--connect-timeout-secs",
            "3",
            "--scan-timeout-secs",
            "7",
            "scan",
        ]);
        let settings = Settings::from(args);

        assert_eq!(settings.interface, "wlp2s0");
        assert_eq!(settings.timeouts.connect, Duration::from_secs(3));
        assert_eq!(settings.timeouts.scan, Duration::from_secs(7));
    }
}
