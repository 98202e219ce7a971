//! Access point model and security classification
//!
//! Normalizes the two record shapes the platform hands out (saved networks
//! and scan entries) into one [`AccessPoint`]. The classifiers here feed both
//! the UI-facing labels and the connect profile, so their precedence rules
//! are fixed: WEP, then PSK, then EAP, then OPEN for capability strings.

use serde::Serialize;

use crate::core::types::{ConfiguredNetwork, KeyMgmt, NetworkId, ScanEntry};

const SECURITY_STRING_EAP: &str = "802.1x EAP";
const SECURITY_STRING_WEP: &str = "WEP";
const SECURITY_STRING_WPA: &str = "WPA PSK";
const SECURITY_STRING_WPA2: &str = "WPA2 PSK";
const SECURITY_STRING_WPA_WPA2: &str = "WPA/WPA2 PSK";
const SECURITY_STRING_PSK_UNKNOWN: &str = "UNKNOWN PSK";
const SECURITY_STRING_OPEN: &str = "OPEN";

/// Authentication scheme an access point advertises or is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityMode {
    Open,
    Wep,
    Psk,
    Eap,
}

impl SecurityMode {
    /// Classify a scan capability string
    pub fn from_capabilities(capabilities: &str) -> Self {
        if capabilities.contains("WEP") {
            SecurityMode::Wep
        } else if capabilities.contains("PSK") {
            SecurityMode::Psk
        } else if capabilities.contains("EAP") {
            SecurityMode::Eap
        } else {
            SecurityMode::Open
        }
    }

    /// Classify a saved profile by its key management flags
    pub fn from_configured(config: &ConfiguredNetwork) -> Self {
        if config.key_mgmt.contains(&KeyMgmt::WpaPsk) {
            return SecurityMode::Psk;
        }
        if config.key_mgmt.contains(&KeyMgmt::WpaEap)
            || config.key_mgmt.contains(&KeyMgmt::Ieee8021x)
        {
            return SecurityMode::Eap;
        }
        if config.wep_key0.is_some() {
            SecurityMode::Wep
        } else {
            SecurityMode::Open
        }
    }
}

/// Flavour of a pre-shared-key network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PskType {
    Wpa,
    Wpa2,
    WpaWpa2,
    Unknown,
}

impl PskType {
    pub fn from_capabilities(capabilities: &str) -> Self {
        let wpa = capabilities.contains("WPA-PSK");
        let wpa2 = capabilities.contains("WPA2-PSK");
        match (wpa, wpa2) {
            (true, true) => PskType::WpaWpa2,
            (false, true) => PskType::Wpa2,
            (true, false) => PskType::Wpa,
            (false, false) => PskType::Unknown,
        }
    }
}

/// Human-readable label for a classification
pub fn security_label(mode: SecurityMode, psk: PskType) -> &'static str {
    match mode {
        SecurityMode::Eap => SECURITY_STRING_EAP,
        SecurityMode::Psk => match psk {
            PskType::Wpa => SECURITY_STRING_WPA,
            PskType::Wpa2 => SECURITY_STRING_WPA2,
            PskType::WpaWpa2 => SECURITY_STRING_WPA_WPA2,
            PskType::Unknown => SECURITY_STRING_PSK_UNKNOWN,
        },
        SecurityMode::Wep => SECURITY_STRING_WEP,
        SecurityMode::Open => SECURITY_STRING_OPEN,
    }
}

/// Lifecycle status of an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApStatus {
    Current,
    Enabled,
    Disabled,
    Unknown,
}

impl ApStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ApStatus::Current,
            1 => ApStatus::Disabled,
            2 => ApStatus::Enabled,
            _ => ApStatus::Unknown,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ApStatus::Current => 0,
            ApStatus::Disabled => 1,
            ApStatus::Enabled => 2,
            ApStatus::Unknown => -1,
        }
    }
}

/// Where an access point record came from
///
/// The network handle only exists for saved networks and the radio
/// measurements only exist for scan entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    Configured { network_id: NetworkId },
    Scanned { level: i32, frequency: u32 },
    Manual,
}

/// Normalized view of a wireless network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPoint {
    pub ssid: String,
    pub security_mode: SecurityMode,
    pub security_label: &'static str,
    pub bssid: Option<String>,
    pub status: ApStatus,
    #[serde(flatten)]
    pub provenance: Provenance,
    /// EAP identity, connect input only
    #[serde(skip)]
    pub username: Option<String>,
    /// Connect input only
    #[serde(skip)]
    pub password: Option<String>,
}

impl AccessPoint {
    /// Access point described by hand, typically as connect input
    pub fn manual(ssid: impl Into<String>, security_mode: SecurityMode) -> Self {
        Self {
            ssid: ssid.into(),
            security_mode,
            security_label: security_label(security_mode, PskType::Unknown),
            bssid: None,
            status: ApStatus::Unknown,
            provenance: Provenance::Manual,
            username: None,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn network_id(&self) -> Option<NetworkId> {
        match self.provenance {
            Provenance::Configured { network_id } => Some(network_id),
            _ => None,
        }
    }

    /// Signal level in dBm, for scanned access points
    pub fn level(&self) -> Option<i32> {
        match self.provenance {
            Provenance::Scanned { level, .. } => Some(level),
            _ => None,
        }
    }

    /// Frequency in MHz, for scanned access points
    pub fn frequency(&self) -> Option<u32> {
        match self.provenance {
            Provenance::Scanned { frequency, .. } => Some(frequency),
            _ => None,
        }
    }

    /// Rebuild the saved record this access point was loaded from
    ///
    /// Returns `None` unless the access point came from the saved list. A WEP
    /// key slot is marked with the platform's mask since keys are never read.
    pub fn to_configured(&self) -> Option<ConfiguredNetwork> {
        let Provenance::Configured { network_id } = self.provenance else {
            return None;
        };

        let (key_mgmt, wep_key0) = match self.security_mode {
            SecurityMode::Open => (vec![KeyMgmt::None], None),
            SecurityMode::Wep => (vec![KeyMgmt::None], Some("*".to_string())),
            SecurityMode::Psk => (vec![KeyMgmt::WpaPsk], None),
            SecurityMode::Eap => (vec![KeyMgmt::WpaEap, KeyMgmt::Ieee8021x], None),
        };

        Some(ConfiguredNetwork {
            network_id,
            ssid: self.ssid.clone(),
            bssid: self.bssid.clone(),
            key_mgmt,
            wep_key0,
            status: self.status.code(),
        })
    }
}

impl From<&ConfiguredNetwork> for AccessPoint {
    fn from(config: &ConfiguredNetwork) -> Self {
        let security_mode = SecurityMode::from_configured(config);
        Self {
            ssid: config.ssid.clone(),
            security_mode,
            // saved profiles do not say which WPA generation they use
            security_label: security_label(security_mode, PskType::Unknown),
            bssid: config.bssid.clone(),
            status: ApStatus::from_code(config.status),
            provenance: Provenance::Configured {
                network_id: config.network_id,
            },
            username: None,
            password: None,
        }
    }
}

impl From<&ScanEntry> for AccessPoint {
    /// Status is left `Unknown`; the scan orchestrator assigns it.
    fn from(entry: &ScanEntry) -> Self {
        let security_mode = SecurityMode::from_capabilities(&entry.capabilities);
        Self {
            ssid: entry.ssid.clone(),
            security_mode,
            security_label: security_label(
                security_mode,
                PskType::from_capabilities(&entry.capabilities),
            ),
            bssid: Some(entry.bssid.clone()),
            status: ApStatus::Unknown,
            provenance: Provenance::Scanned {
                level: entry.level,
                frequency: entry.frequency,
            },
            username: None,
            password: None,
        }
    }
}
