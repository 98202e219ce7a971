//! Main WiFi link manager facade

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    backend::WifiBackend,
    config::Timeouts,
    core::{
        access_point::AccessPoint,
        completion::Pending,
        connector::Connector,
        error::{ConnectError, ScanError, ServiceResult, WifiResult},
        listener::{ConnectListener, NetStateListener, SearchListener},
        profile::ConnectRequest,
        scanner::Searcher,
        types::{
            ConnectionInfo, ConnectionStatus, DhcpInfo, NetType, NetworkId, ScanState,
        },
        watcher::ConnectivityWatcher,
    },
};

/// Unit of [`WifiManager::link_speed`]
pub const LINK_SPEED_UNITS: &str = "Mbps";

const MIN_RSSI: i32 = -100;
const MAX_RSSI: i32 = -55;

/// Map a signal strength onto `num_levels` bars
///
/// Everything at or below -100 dBm is level 0, everything at or above
/// -55 dBm is the top level.
pub fn calculate_signal_level(rssi: i32, num_levels: u32) -> u32 {
    if num_levels == 0 {
        return 0;
    }
    if rssi <= MIN_RSSI {
        0
    } else if rssi >= MAX_RSSI {
        num_levels - 1
    } else {
        let input_range = (MAX_RSSI - MIN_RSSI) as f32;
        let output_range = (num_levels - 1) as f32;
        ((rssi - MIN_RSSI) as f32 * output_range / input_range) as u32
    }
}

/// Connection and addressing state as of the last [`WifiManager::refresh`]
#[derive(Debug, Clone, Default)]
struct Snapshot {
    connection: ConnectionInfo,
    dhcp: DhcpInfo,
}

/// Main WiFi link manager facade
///
/// Orchestrates all service components (connect, scan, connectivity watch)
/// and exposes the saved-network and association controls of the backend.
pub struct WifiManager<B: WifiBackend> {
    backend: Arc<B>,
    pub connector: Arc<Connector<B>>,
    pub searcher: Arc<Searcher<B>>,
    pub watcher: Arc<ConnectivityWatcher<B>>,
    snapshot: RwLock<Option<Snapshot>>,
}

impl<B: WifiBackend> WifiManager<B> {
    /// Create a new WiFi link manager
    pub fn new(backend: Arc<B>, timeouts: Timeouts) -> Self {
        let connector = Arc::new(Connector::new(backend.clone(), timeouts));
        let searcher = Arc::new(Searcher::new(backend.clone(), timeouts));
        let watcher = Arc::new(ConnectivityWatcher::new(backend.clone()));

        Self {
            backend,
            connector,
            searcher,
            watcher,
            snapshot: RwLock::new(None),
        }
    }

    /// Connect to a WiFi network
    pub async fn connect(
        &self,
        request: ConnectRequest,
    ) -> ServiceResult<Pending<NetworkId, ConnectError>> {
        self.connector.connect(request).await
    }

    pub async fn connect_with_listener<L: ConnectListener>(
        &self,
        request: ConnectRequest,
        listener: L,
    ) -> ServiceResult<()> {
        self.connector.connect_with_listener(request, listener).await
    }

    /// Get connection status
    pub async fn connection_status(&self) -> ConnectionStatus {
        self.connector.status().await
    }

    /// Start a WiFi scan
    pub async fn search(&self) -> ServiceResult<Pending<Vec<AccessPoint>, ScanError>> {
        self.searcher.search().await
    }

    pub async fn search_with_listener<L: SearchListener>(&self, listener: L) -> ServiceResult<()> {
        self.searcher.search_with_listener(listener).await
    }

    /// Get scan state
    pub async fn scan_state(&self) -> ScanState {
        self.searcher.state().await
    }

    pub async fn register_net_state_listener<L: NetStateListener>(&self, listener: L) {
        self.watcher.register(listener).await
    }

    pub async fn unregister_net_state_listener(&self) {
        self.watcher.unregister().await
    }

    pub async fn is_network_connected(&self) -> WifiResult<bool> {
        self.watcher.is_network_connected().await
    }

    pub async fn is_wifi_connected(&self) -> WifiResult<bool> {
        self.watcher.is_wifi_connected().await
    }

    pub async fn is_ethernet_connected(&self) -> WifiResult<bool> {
        self.watcher.is_ethernet_connected().await
    }

    pub async fn active_network_type(&self) -> WifiResult<NetType> {
        self.watcher.active_network_type().await
    }

    pub async fn is_wifi_enabled(&self) -> WifiResult<bool> {
        self.backend.is_radio_enabled().await
    }

    pub async fn set_wifi_enabled(&self, enabled: bool) -> WifiResult<()> {
        self.backend.set_radio_enabled(enabled).await
    }

    /// Saved networks
    pub async fn configured_networks(&self) -> WifiResult<Vec<AccessPoint>> {
        Ok(self
            .backend
            .configured_networks()
            .await?
            .iter()
            .map(AccessPoint::from)
            .collect())
    }

    /// Saved network with the given SSID, if any
    pub async fn find_configured(&self, ssid: &str) -> WifiResult<Option<AccessPoint>> {
        Ok(self
            .backend
            .configured_networks()
            .await?
            .iter()
            .find(|network| network.ssid == ssid)
            .map(AccessPoint::from))
    }

    pub async fn remove_network(&self, id: NetworkId) -> WifiResult<()> {
        self.backend.remove_network(id).await?;
        self.backend.save_config().await
    }

    pub async fn disable_network(&self, id: NetworkId) -> WifiResult<()> {
        self.backend.disable_network(id).await
    }

    /// Disable the current network, then disconnect from it
    pub async fn disconnect_wifi(&self) -> ServiceResult<()> {
        self.connector.disconnect().await
    }

    pub async fn reconnect(&self) -> WifiResult<()> {
        self.backend.reconnect().await
    }

    pub async fn reassociate(&self) -> WifiResult<()> {
        self.backend.reassociate().await
    }

    /// Re-read connection and DHCP information for the accessors below
    pub async fn refresh(&self) -> WifiResult<()> {
        let connection = self.backend.connection_info().await?;
        let dhcp = self.backend.dhcp_info().await?;
        debug!(?connection, ?dhcp, "Refreshed link snapshot");
        *self.snapshot.write().await = Some(Snapshot { connection, dhcp });
        Ok(())
    }

    async fn read<T: Default>(&self, f: impl FnOnce(&Snapshot) -> Option<T>) -> T {
        self.snapshot
            .read()
            .await
            .as_ref()
            .and_then(f)
            .unwrap_or_default()
    }

    pub async fn ssid(&self) -> String {
        self.read(|s| s.connection.ssid.clone()).await
    }

    pub async fn bssid(&self) -> String {
        self.read(|s| s.connection.bssid.clone()).await
    }

    pub async fn network_id(&self) -> Option<NetworkId> {
        self.read(|s| s.connection.network_id.map(Some)).await
    }

    pub async fn ip_address(&self) -> String {
        self.read(|s| s.connection.ip_address.clone()).await
    }

    pub async fn mac_address(&self) -> String {
        self.read(|s| s.connection.mac_address.clone()).await
    }

    /// Link speed in [`LINK_SPEED_UNITS`]
    pub async fn link_speed(&self) -> u32 {
        self.read(|s| s.connection.link_speed).await
    }

    pub async fn rssi(&self) -> i32 {
        self.read(|s| s.connection.rssi).await
    }

    pub async fn dns1(&self) -> String {
        self.read(|s| s.dhcp.dns1.clone()).await
    }

    pub async fn dns2(&self) -> String {
        self.read(|s| s.dhcp.dns2.clone()).await
    }

    pub async fn gateway(&self) -> String {
        self.read(|s| s.dhcp.gateway.clone()).await
    }
}
