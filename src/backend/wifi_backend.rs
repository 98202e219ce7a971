//! WiFi backend trait definition

use tokio::sync::broadcast;
use trait_variant::make;

use crate::core::error::WifiResult;
use crate::core::profile::NetworkProfile;
use crate::core::types::{
    ConfiguredNetwork, ConnectionInfo, DhcpInfo, LinkKind, NetworkId, PlatformEvent, ScanEntry,
};

/// Abstraction over the host network stack (typically wpa_supplicant)
///
/// Mutating requests return as soon as the platform accepted them; their
/// outcome is announced through the events delivered to [`subscribe`]rs.
///
/// [`subscribe`]: WifiBackend::subscribe
#[make(Send)]
pub trait WifiBackend: Send + Sync + 'static {
    /// Whether the radio is administratively enabled
    async fn is_radio_enabled(&self) -> WifiResult<bool>;

    /// Enable or disable the radio
    async fn set_radio_enabled(&self, enabled: bool) -> WifiResult<()>;

    /// Submit a network profile and return its local handle
    ///
    /// A profile the platform refuses yields `WifiError::ProfileRejected`.
    async fn add_network(&self, profile: &NetworkProfile) -> WifiResult<NetworkId>;

    /// Select a network for association, disabling the others
    async fn enable_network(&self, id: NetworkId) -> WifiResult<()>;

    async fn disable_network(&self, id: NetworkId) -> WifiResult<()>;

    async fn remove_network(&self, id: NetworkId) -> WifiResult<()>;

    /// Persist the saved-network store
    async fn save_config(&self) -> WifiResult<()>;

    /// Request a radio scan
    ///
    /// Completion is announced with `PlatformEvent::ScanResultsAvailable`.
    async fn start_scan(&self) -> WifiResult<()>;

    /// Entries of the last completed scan
    async fn scan_results(&self) -> WifiResult<Vec<ScanEntry>>;

    async fn connection_info(&self) -> WifiResult<ConnectionInfo>;

    async fn dhcp_info(&self) -> WifiResult<DhcpInfo>;

    async fn configured_networks(&self) -> WifiResult<Vec<ConfiguredNetwork>>;

    async fn disconnect(&self) -> WifiResult<()>;

    async fn reconnect(&self) -> WifiResult<()>;

    async fn reassociate(&self) -> WifiResult<()>;

    /// Whether a link of the given kind is currently connected
    async fn is_link_connected(&self, link: LinkKind) -> WifiResult<bool>;

    /// Register for platform events; dropping the receiver unregisters
    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent>;
}
