//! Domain types shared by the orchestrators and the backends

use serde::{Deserialize, Serialize};

/// Platform-local handle of a saved network profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub usize);

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier attached to the log lines of one orchestrated request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// WiFi scan state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Scanning = 1,
    Finished = 2,
    Error = 3,
}

/// WiFi connection state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Failed = 3,
}

/// Outcome of the last connect request as tracked by the connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Current connection state
    pub state: ConnectionState,
    /// SSID of the requested network (if any)
    pub ssid: Option<String>,
    /// Handle of the joined network (if connected)
    pub network_id: Option<NetworkId>,
    /// Reason of the last failure
    pub error: Option<String>,
}

/// Progress of the authentication handshake as reported by the supplicant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplicantState {
    Disconnected,
    InterfaceDisabled,
    Inactive,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    Completed,
    Unknown,
}

impl SupplicantState {
    /// Map a wpa_supplicant `wpa_state` value
    pub fn from_wpa_state(state: &str) -> Self {
        match state {
            "DISCONNECTED" => SupplicantState::Disconnected,
            "INTERFACE_DISABLED" => SupplicantState::InterfaceDisabled,
            "INACTIVE" => SupplicantState::Inactive,
            "SCANNING" => SupplicantState::Scanning,
            "AUTHENTICATING" => SupplicantState::Authenticating,
            "ASSOCIATING" => SupplicantState::Associating,
            "ASSOCIATED" => SupplicantState::Associated,
            "4WAY_HANDSHAKE" => SupplicantState::FourWayHandshake,
            "GROUP_HANDSHAKE" => SupplicantState::GroupHandshake,
            "COMPLETED" => SupplicantState::Completed,
            _ => SupplicantState::Unknown,
        }
    }
}

/// Snapshot of the current association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub network_id: Option<NetworkId>,
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub supplicant_state: SupplicantState,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    /// Link speed in Mbps
    pub link_speed: Option<u32>,
    /// Signal strength in dBm
    pub rssi: Option<i32>,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            network_id: None,
            ssid: None,
            bssid: None,
            supplicant_state: SupplicantState::Disconnected,
            ip_address: None,
            mac_address: None,
            link_speed: None,
            rssi: None,
        }
    }
}

/// Addressing information handed out with the lease
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpInfo {
    pub dns1: Option<String>,
    pub dns2: Option<String>,
    pub gateway: Option<String>,
}

/// One raw entry of the platform's last scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub ssid: String,
    pub bssid: String,
    /// Capability description, e.g. `[WPA2-PSK-CCMP][ESS]`
    pub capabilities: String,
    /// Signal level in dBm
    pub level: i32,
    /// Frequency in MHz
    pub frequency: u32,
}

/// Key management schemes a saved profile may allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyMgmt {
    None,
    WpaPsk,
    WpaEap,
    Ieee8021x,
}

impl KeyMgmt {
    /// wpa_supplicant `key_mgmt` token
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMgmt::None => "NONE",
            KeyMgmt::WpaPsk => "WPA-PSK",
            KeyMgmt::WpaEap => "WPA-EAP",
            KeyMgmt::Ieee8021x => "IEEE8021X",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "NONE" => Some(KeyMgmt::None),
            "WPA-PSK" => Some(KeyMgmt::WpaPsk),
            "WPA-EAP" => Some(KeyMgmt::WpaEap),
            "IEEE8021X" => Some(KeyMgmt::Ieee8021x),
            _ => None,
        }
    }
}

/// A saved network record as read back from the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredNetwork {
    pub network_id: NetworkId,
    pub ssid: String,
    pub bssid: Option<String>,
    pub key_mgmt: Vec<KeyMgmt>,
    /// Raw key slot 0; platforms usually mask the value
    pub wep_key0: Option<String>,
    /// 0 = current, 1 = disabled, 2 = enabled
    pub status: i32,
}

/// Link types the connectivity watcher can query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Ethernet,
    Wifi,
    Bluetooth,
}

/// Type of the active network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetType {
    None,
    Wifi,
    Ethernet,
    Bluetooth,
    Unknown,
}

/// System notifications a backend delivers to subscribers
///
/// Events carry no payload; receivers re-query the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    SupplicantStateChanged,
    ScanResultsAvailable,
    ConnectivityChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplicant_state_mapping() {
        assert_eq!(
            SupplicantState::from_wpa_state("COMPLETED"),
            SupplicantState::Completed
        );
        assert_eq!(
            SupplicantState::from_wpa_state("4WAY_HANDSHAKE"),
            SupplicantState::FourWayHandshake
        );
        assert_eq!(
            SupplicantState::from_wpa_state("bogus"),
            SupplicantState::Unknown
        );
    }

    #[test]
    fn test_key_mgmt_tokens() {
        for k in [
            KeyMgmt::None,
            KeyMgmt::WpaPsk,
            KeyMgmt::WpaEap,
            KeyMgmt::Ieee8021x,
        ] {
            assert_eq!(KeyMgmt::from_token(k.as_str()), Some(k));
        }
        assert_eq!(KeyMgmt::from_token("SAE"), None);
    }
}
