//! Mock WiFi backend for testing

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};

use crate::backend::WifiBackend;
use crate::core::error::{WifiError, WifiResult};
use crate::core::profile::NetworkProfile;
use crate::core::types::{
    ConfiguredNetwork, ConnectionInfo, DhcpInfo, LinkKind, NetworkId, PlatformEvent, ScanEntry,
    SupplicantState,
};

const EVENT_CAPACITY: usize = 64;

/// Internal state for the mock backend
#[derive(Debug, Clone)]
struct MockState {
    radio_enabled: bool,
    radio_enable_requests: usize,
    networks: BTreeMap<NetworkId, ConfiguredNetwork>,
    next_id: usize,
    reject_profiles: bool,
    associate_on_enable: bool,
    scan_results: Vec<ScanEntry>,
    complete_scans: bool,
    should_fail_scan: bool,
    scan_read_error: Option<WifiError>,
    scan_read_delay: Duration,
    connection: ConnectionInfo,
    dhcp: DhcpInfo,
    links: HashMap<LinkKind, bool>,
    save_count: usize,
}

/// Mock WiFi backend for testing
///
/// Allows configuring behavior for tests without requiring actual hardware.
/// Events are only emitted in response to requests when the matching
/// behavior is switched on, or explicitly through [`emit`](Self::emit).
#[derive(Debug, Clone)]
pub struct MockWifiBackend {
    inner: Arc<Mutex<MockState>>,
    events: broadcast::Sender<PlatformEvent>,
}

impl MockWifiBackend {
    /// Create a new mock backend with the radio on and nothing scripted
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(MockState {
                radio_enabled: true,
                radio_enable_requests: 0,
                networks: BTreeMap::new(),
                next_id: 0,
                reject_profiles: false,
                associate_on_enable: false,
                scan_results: vec![],
                complete_scans: false,
                should_fail_scan: false,
                scan_read_error: None,
                scan_read_delay: Duration::ZERO,
                connection: ConnectionInfo::default(),
                dhcp: DhcpInfo::default(),
                links: HashMap::new(),
                save_count: 0,
            })),
            events,
        }
    }

    /// Set the radio state without counting it as a request
    pub async fn set_radio(&self, enabled: bool) {
        self.inner.lock().await.radio_enabled = enabled;
    }

    /// Configure mock to reject submitted profiles
    pub async fn set_profile_rejection(&self, reject: bool) {
        self.inner.lock().await.reject_profiles = reject;
    }

    /// Configure mock to associate as soon as a network is enabled
    pub async fn set_associate_on_enable(&self, associate: bool) {
        self.inner.lock().await.associate_on_enable = associate;
    }

    /// Configure mock to return specific entries once a scan completes
    pub async fn set_scan_results(&self, entries: Vec<ScanEntry>) {
        self.inner.lock().await.scan_results = entries;
    }

    /// Configure mock to announce scan completion right after the request
    pub async fn set_complete_scans(&self, complete: bool) {
        self.inner.lock().await.complete_scans = complete;
    }

    /// Configure mock to refuse scan requests
    pub async fn set_scan_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_scan = should_fail;
    }

    /// Configure mock to fail reading the results of a completed scan
    pub async fn set_scan_read_error(&self, error: Option<WifiError>) {
        self.inner.lock().await.scan_read_error = error;
    }

    /// Configure mock to take `delay` to hand out scan results
    pub async fn set_scan_read_delay(&self, delay: Duration) {
        self.inner.lock().await.scan_read_delay = delay;
    }

    pub async fn set_link(&self, link: LinkKind, connected: bool) {
        self.inner.lock().await.links.insert(link, connected);
    }

    pub async fn set_connection(&self, info: ConnectionInfo) {
        self.inner.lock().await.connection = info;
    }

    pub async fn set_dhcp(&self, dhcp: DhcpInfo) {
        self.inner.lock().await.dhcp = dhcp;
    }

    /// Add a saved network as if it had been configured earlier
    pub async fn insert_configured(&self, network: ConfiguredNetwork) {
        let mut state = self.inner.lock().await;
        state.next_id = state.next_id.max(network.network_id.0 + 1);
        state.networks.insert(network.network_id, network);
    }

    /// Simulate association with a saved network
    pub async fn complete_association(&self, id: NetworkId) {
        let mut state = self.inner.lock().await;
        Self::associate(&mut state, id);
        drop(state);
        self.emit(PlatformEvent::SupplicantStateChanged);
        self.emit(PlatformEvent::ConnectivityChanged);
    }

    /// Deliver an event to every subscriber
    pub fn emit(&self, event: PlatformEvent) {
        // no receivers is not an error for a broadcast
        let _ = self.events.send(event);
    }

    /// Number of live event registrations
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub async fn save_count(&self) -> usize {
        self.inner.lock().await.save_count
    }

    pub async fn radio_enable_requests(&self) -> usize {
        self.inner.lock().await.radio_enable_requests
    }

    pub async fn network_ids(&self) -> Vec<NetworkId> {
        self.inner.lock().await.networks.keys().copied().collect()
    }

    fn associate(state: &mut MockState, id: NetworkId) {
        let ssid = state.networks.get(&id).map(|n| n.ssid.clone());
        for (other, network) in state.networks.iter_mut() {
            network.status = if *other == id { 0 } else { 2 };
        }
        state.connection = ConnectionInfo {
            network_id: Some(id),
            ssid,
            bssid: Some("02:00:00:00:00:01".into()),
            supplicant_state: SupplicantState::Completed,
            ip_address: Some("192.168.1.100".into()),
            mac_address: Some("02:00:00:00:00:ff".into()),
            link_speed: Some(72),
            rssi: Some(-55),
        };
        state.links.insert(LinkKind::Wifi, true);
    }
}

impl Default for MockWifiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiBackend for MockWifiBackend {
    async fn is_radio_enabled(&self) -> WifiResult<bool> {
        Ok(self.inner.lock().await.radio_enabled)
    }

    async fn set_radio_enabled(&self, enabled: bool) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.radio_enable_requests += 1;
        state.radio_enabled = enabled;
        Ok(())
    }

    async fn add_network(&self, profile: &NetworkProfile) -> WifiResult<NetworkId> {
        let mut state = self.inner.lock().await;
        if state.reject_profiles {
            return Err(WifiError::ProfileRejected("Mock profile rejection".into()));
        }

        let id = NetworkId(state.next_id);
        state.next_id += 1;
        state.networks.insert(
            id,
            ConfiguredNetwork {
                network_id: id,
                ssid: profile.ssid.trim_matches('"').to_string(),
                bssid: None,
                key_mgmt: profile.key_mgmt.clone(),
                wep_key0: profile.wep_key0.as_ref().map(|_| "*".to_string()),
                status: 2,
            },
        );
        Ok(id)
    }

    async fn enable_network(&self, id: NetworkId) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        if !state.networks.contains_key(&id) {
            return Err(WifiError::UnknownNetwork(id));
        }

        if state.associate_on_enable {
            Self::associate(&mut state, id);
            drop(state);
            self.emit(PlatformEvent::SupplicantStateChanged);
            self.emit(PlatformEvent::ConnectivityChanged);
        } else {
            state.connection.supplicant_state = SupplicantState::Associating;
            drop(state);
            self.emit(PlatformEvent::SupplicantStateChanged);
        }
        Ok(())
    }

    async fn disable_network(&self, id: NetworkId) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        let network = state
            .networks
            .get_mut(&id)
            .ok_or(WifiError::UnknownNetwork(id))?;
        network.status = 1;
        Ok(())
    }

    async fn remove_network(&self, id: NetworkId) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state
            .networks
            .remove(&id)
            .map(|_| ())
            .ok_or(WifiError::UnknownNetwork(id))
    }

    async fn save_config(&self) -> WifiResult<()> {
        self.inner.lock().await.save_count += 1;
        Ok(())
    }

    async fn start_scan(&self) -> WifiResult<()> {
        let state = self.inner.lock().await;
        if state.should_fail_scan {
            return Err(WifiError::ScanFailed("Mock scan failure".into()));
        }
        let complete = state.complete_scans;
        drop(state);

        if complete {
            self.emit(PlatformEvent::ScanResultsAvailable);
        }
        Ok(())
    }

    async fn scan_results(&self) -> WifiResult<Vec<ScanEntry>> {
        let state = self.inner.lock().await;
        let delay = state.scan_read_delay;
        let result = match &state.scan_read_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.scan_results.clone()),
        };
        drop(state);

        tokio::time::sleep(delay).await;
        result
    }

    async fn connection_info(&self) -> WifiResult<ConnectionInfo> {
        Ok(self.inner.lock().await.connection.clone())
    }

    async fn dhcp_info(&self) -> WifiResult<DhcpInfo> {
        Ok(self.inner.lock().await.dhcp.clone())
    }

    async fn configured_networks(&self) -> WifiResult<Vec<ConfiguredNetwork>> {
        Ok(self.inner.lock().await.networks.values().cloned().collect())
    }

    async fn disconnect(&self) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.connection = ConnectionInfo::default();
        state.links.insert(LinkKind::Wifi, false);
        drop(state);
        self.emit(PlatformEvent::SupplicantStateChanged);
        self.emit(PlatformEvent::ConnectivityChanged);
        Ok(())
    }

    async fn reconnect(&self) -> WifiResult<()> {
        Ok(())
    }

    async fn reassociate(&self) -> WifiResult<()> {
        Ok(())
    }

    async fn is_link_connected(&self, link: LinkKind) -> WifiResult<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .links
            .get(&link)
            .copied()
            .unwrap_or(false))
    }

    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::access_point::SecurityMode;
    use crate::core::profile::ConnectRequest;

    fn profile(ssid: &str) -> NetworkProfile {
        NetworkProfile::from_request(&ConnectRequest::new(ssid, SecurityMode::Psk, "password1"))
    }

    #[tokio::test]
    async fn test_mock_backend_add_and_remove() {
        let backend = MockWifiBackend::new();

        let id = backend.add_network(&profile("MyNetwork")).await.unwrap();
        let saved = backend.configured_networks().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].ssid, "MyNetwork");
        assert_eq!(saved[0].network_id, id);

        backend.remove_network(id).await.unwrap();
        assert!(backend.configured_networks().await.unwrap().is_empty());
        assert_eq!(
            backend.remove_network(id).await,
            Err(WifiError::UnknownNetwork(id))
        );
    }

    #[tokio::test]
    async fn test_mock_backend_profile_rejection() {
        let backend = MockWifiBackend::new();
        backend.set_profile_rejection(true).await;

        let result = backend.add_network(&profile("MyNetwork")).await;
        assert!(matches!(result, Err(WifiError::ProfileRejected(_))));
    }

    #[tokio::test]
    async fn test_mock_backend_associate_on_enable() {
        let backend = MockWifiBackend::new();
        backend.set_associate_on_enable(true).await;
        let mut events = backend.subscribe();

        let id = backend.add_network(&profile("MyNetwork")).await.unwrap();
        backend.enable_network(id).await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            PlatformEvent::SupplicantStateChanged
        );
        let info = backend.connection_info().await.unwrap();
        assert_eq!(info.network_id, Some(id));
        assert_eq!(info.supplicant_state, SupplicantState::Completed);
        assert_eq!(info.ssid.as_deref(), Some("MyNetwork"));
        assert!(backend.is_link_connected(LinkKind::Wifi).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_backend_disconnect() {
        let backend = MockWifiBackend::new();
        let id = backend.add_network(&profile("MyNetwork")).await.unwrap();
        backend.complete_association(id).await;

        backend.disconnect().await.unwrap();

        let info = backend.connection_info().await.unwrap();
        assert_eq!(info.network_id, None);
        assert_eq!(info.supplicant_state, SupplicantState::Disconnected);
        assert!(!backend.is_link_connected(LinkKind::Wifi).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_backend_scan_failure() {
        let backend = MockWifiBackend::new();
        backend.set_scan_failure(true).await;

        let result = backend.start_scan().await;
        assert!(result.is_err());
    }
}
