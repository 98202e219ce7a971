//! wifi-ctrl backend implementation

use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use wifi_ctrl::sta::{Broadcast, BroadcastReceiver, RequestClient, WifiSetup};

use crate::{
    backend::WifiBackend,
    core::{
        error::{WifiError, WifiResult},
        profile::NetworkProfile,
        types::{
            ConfiguredNetwork, ConnectionInfo, DhcpInfo, KeyMgmt, LinkKind, NetworkId,
            PlatformEvent, ScanEntry, SupplicantState,
        },
    },
};

const EVENT_CAPACITY: usize = 64;
const RESOLV_CONF: &str = "/etc/resolv.conf";
const BLUETOOTH_INTERFACE: &str = "bnep0";

/// Outcome of the latest scan request
///
/// Each request bumps `generation`; a scan task only reports if no newer
/// request was made in the meantime.
#[derive(Debug)]
struct ScanSlot {
    generation: u64,
    result: WifiResult<Vec<ScanEntry>>,
    task: Option<JoinHandle<()>>,
}

impl ScanSlot {
    fn new() -> Self {
        Self {
            generation: 0,
            result: Ok(Vec::new()),
            task: None,
        }
    }

    /// Start tracking a new request, aborting the previous one
    fn begin(&mut self) -> u64 {
        if let Some(previous) = self.task.take() {
            previous.abort();
        }
        self.generation += 1;
        self.generation
    }

    /// Store the outcome of request `generation`; false if it is stale
    fn finish(&mut self, generation: u64, result: WifiResult<Vec<ScanEntry>>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.result = result;
        self.task = None;
        true
    }
}

/// wpa_supplicant backend driven through its control socket
pub struct WifiCtrlBackend {
    interface: String,
    ethernet_interface: String,
    client: Arc<RequestClient>,
    events: broadcast::Sender<PlatformEvent>,
    last_scan: Arc<Mutex<ScanSlot>>,
}

impl WifiCtrlBackend {
    pub async fn new(interface: String, ethernet_interface: String) -> WifiResult<Self> {
        let path = format!("/var/run/wpa_supplicant/{}", interface);
        let mut setup =
            WifiSetup::new().map_err(|e| WifiError::WpaSupplicantError(e.to_string()))?;
        setup.set_socket_path(path);

        let client = setup.get_request_client();
        let broadcast_receiver = setup.get_broadcast_receiver();
        let station = setup.complete();

        // Spawn the station runtime
        tokio::spawn(async move {
            if let Err(e) = station.run().await {
                error!("WifiStation runtime error: {}", e);
            }
        });

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        tokio::spawn(Self::forward_broadcasts(broadcast_receiver, events.clone()));

        Ok(Self {
            interface,
            ethernet_interface,
            client: Arc::new(client),
            events,
            last_scan: Arc::new(Mutex::new(ScanSlot::new())),
        })
    }

    /// Re-emit supplicant broadcasts as platform events
    async fn forward_broadcasts(
        mut receiver: BroadcastReceiver,
        events: broadcast::Sender<PlatformEvent>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    debug!("Received broadcast event: {:?}", event);
                    for platform_event in map_broadcast(&event) {
                        let _ = events.send(*platform_event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Broadcast receiver lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("wpa_supplicant broadcast channel closed");
                    break;
                }
            }
        }
    }

    /// Send a raw control command and return the reply as is
    async fn send(&self, command: &str) -> WifiResult<String> {
        self.client
            .send_custom(command.to_string())
            .await
            .map_err(|e| WifiError::WpaSupplicantError(format!("{} failed: {}", verb(command), e)))
    }

    /// Send a raw control command, treating `FAIL` as an error
    async fn request(&self, command: &str) -> WifiResult<String> {
        let reply = self.send(command).await?;
        if is_fail(&reply) {
            return Err(WifiError::WpaSupplicantError(format!(
                "{} returned FAIL",
                verb(command)
            )));
        }
        Ok(reply)
    }

    async fn status_map(&self) -> WifiResult<std::collections::HashMap<String, String>> {
        self.client
            .get_status()
            .await
            .map_err(|e| WifiError::WpaSupplicantError(format!("Failed to get status: {}", e)))
    }

    /// Run an `ip` subcommand and return its stdout
    async fn ip(args: &[&str]) -> WifiResult<String> {
        let output = Command::new("ip")
            .args(args)
            .output()
            .await
            .map_err(|e| WifiError::InterfaceError(format!("Failed to run ip: {}", e)))?;

        if !output.status.success() {
            return Err(WifiError::InterfaceError(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Get IP address using ip command
    async fn get_ip_address(&self) -> Option<String> {
        let stdout = Self::ip(&["-4", "addr", "show", self.interface.as_str()]).await.ok()?;
        parse_ip_address(&stdout)
    }

    async fn carrier(interface: &str) -> bool {
        tokio::fs::read_to_string(format!("/sys/class/net/{}/carrier", interface))
            .await
            .map(|s| s.trim() == "1")
            .unwrap_or(false)
    }
}

/// Platform events a supplicant broadcast stands for
fn map_broadcast(event: &Broadcast) -> &'static [PlatformEvent] {
    match event {
        Broadcast::Connected | Broadcast::Disconnected => &[
            PlatformEvent::SupplicantStateChanged,
            PlatformEvent::ConnectivityChanged,
        ],
        Broadcast::WrongPsk | Broadcast::NetworkNotFound => {
            &[PlatformEvent::SupplicantStateChanged]
        }
        _ => &[],
    }
}

fn verb(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

/// Whether a control reply reports a refused command
fn is_fail(reply: &str) -> bool {
    reply.trim().starts_with("FAIL")
}

/// Extract the first IPv4 address from `ip -4 addr show` output
fn parse_ip_address(output: &str) -> Option<String> {
    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("inet ") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                let ip = parts[1].split('/').next()?;
                return Some(ip.to_string());
            }
        }
    }
    None
}

/// Whether `ip link show` reports the interface administratively up
fn parse_link_up(output: &str) -> bool {
    output
        .split_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .map(|(flags, _)| flags.split(',').any(|flag| flag == "UP"))
        .unwrap_or(false)
}

/// Extract the gateway from `ip -4 route show default` output
fn parse_default_gateway(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        while let Some(part) = parts.next() {
            if part == "via" {
                return parts.next().map(str::to_string);
            }
        }
        None
    })
}

fn parse_nameservers(resolv_conf: &str) -> Vec<String> {
    resolv_conf
        .lines()
        .filter_map(|line| line.trim().strip_prefix("nameserver"))
        .map(|rest| rest.trim().to_string())
        .filter(|server| !server.is_empty())
        .collect()
}

/// Parse `SIGNAL_POLL` output into (rssi, link speed)
fn parse_signal_poll(output: &str) -> (Option<i32>, Option<u32>) {
    let mut rssi = None;
    let mut link_speed = None;
    for line in output.lines() {
        if let Some(value) = line.strip_prefix("RSSI=") {
            rssi = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("LINKSPEED=") {
            link_speed = value.trim().parse().ok();
        }
    }
    (rssi, link_speed)
}

/// Parse `LIST_NETWORKS` output
///
/// Flags map onto status codes: `[CURRENT]` is 0, `[DISABLED]` is 1 and
/// anything else is 2. Key management is filled in separately.
fn parse_list_networks(output: &str) -> Vec<ConfiguredNetwork> {
    let mut networks = Vec::new();

    for line in output.lines().skip(1) {
        // Skip header line
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            continue;
        }
        let Ok(id) = parts[0].trim().parse::<usize>() else {
            continue;
        };
        let bssid = parts
            .get(2)
            .filter(|b| !b.is_empty() && **b != "any")
            .map(|b| b.to_string());
        let flags = parts.get(3).copied().unwrap_or("");
        let status = if flags.contains("[CURRENT]") {
            0
        } else if flags.contains("[DISABLED]") {
            1
        } else {
            2
        };

        networks.push(ConfiguredNetwork {
            network_id: NetworkId(id),
            ssid: parts[1].to_string(),
            bssid,
            key_mgmt: Vec::new(),
            wep_key0: None,
            status,
        });
    }

    networks
}

fn parse_key_mgmt(value: &str) -> Vec<KeyMgmt> {
    value
        .split_whitespace()
        .filter_map(KeyMgmt::from_token)
        .collect()
}

impl WifiBackend for WifiCtrlBackend {
    async fn is_radio_enabled(&self) -> WifiResult<bool> {
        let stdout = Self::ip(&["link", "show", "dev", self.interface.as_str()]).await?;
        Ok(parse_link_up(&stdout))
    }

    async fn set_radio_enabled(&self, enabled: bool) -> WifiResult<()> {
        let state = if enabled { "up" } else { "down" };
        debug!("Setting interface {} {}", self.interface, state);
        Self::ip(&["link", "set", "dev", self.interface.as_str(), state]).await?;
        Ok(())
    }

    async fn add_network(&self, profile: &NetworkProfile) -> WifiResult<NetworkId> {
        let id = self.client.add_network().await.map_err(|e| {
            WifiError::ProfileRejected(format!("Failed to add network: {}", e))
        })?;
        let id = NetworkId(id);

        for (key, value) in profile.settings() {
            let command = format!("SET_NETWORK {} {} {}", id, key, value);
            if let Err(e) = self.request(&command).await {
                // do not leave a half-configured profile behind
                if let Err(remove_err) = self.remove_network(id).await {
                    warn!("Failed to remove rejected network {}: {}", id, remove_err);
                }
                return Err(WifiError::ProfileRejected(format!("{} rejected: {}", key, e)));
            }
        }

        debug!("Added network {}", id);
        Ok(id)
    }

    async fn enable_network(&self, id: NetworkId) -> WifiResult<()> {
        // Select network (enables it and disables the others)
        self.client.select_network(id.0).await.map_err(|e| {
            WifiError::WpaSupplicantError(format!("Failed to select network: {}", e))
        })?;
        Ok(())
    }

    async fn disable_network(&self, id: NetworkId) -> WifiResult<()> {
        self.request(&format!("DISABLE_NETWORK {}", id)).await?;
        Ok(())
    }

    async fn remove_network(&self, id: NetworkId) -> WifiResult<()> {
        let reply = self.send(&format!("REMOVE_NETWORK {}", id)).await?;
        if is_fail(&reply) {
            return Err(WifiError::UnknownNetwork(id));
        }
        Ok(())
    }

    async fn save_config(&self) -> WifiResult<()> {
        self.client.save_config().await.map_err(|e| {
            WifiError::WpaSupplicantError(format!("Failed to save config: {}", e))
        })?;
        debug!("wpa_supplicant configuration saved successfully");
        Ok(())
    }

    async fn start_scan(&self) -> WifiResult<()> {
        debug!("Starting WiFi scan on interface: {}", self.interface);

        let mut slot = self.last_scan.lock().await;
        let generation = slot.begin();

        let client = self.client.clone();
        let last_scan = self.last_scan.clone();
        let events = self.events.clone();

        slot.task = Some(tokio::spawn(async move {
            let result = client
                .get_scan()
                .await
                .map(|results| {
                    results
                        .iter()
                        .map(|res| ScanEntry {
                            ssid: res.name.clone(),
                            bssid: res.mac.clone(),
                            capabilities: res.flags.clone(),
                            level: res.signal as i32,
                            frequency: res.frequency.parse().unwrap_or(0),
                        })
                        .collect::<Vec<_>>()
                })
                .map_err(|e| WifiError::ScanFailed(e.to_string()));

            match &result {
                Ok(entries) => debug!("Scan complete, found {} networks", entries.len()),
                Err(e) => warn!("Scan failed: {}", e),
            }

            // failures are announced too, scan_results hands out the error
            if last_scan.lock().await.finish(generation, result) {
                let _ = events.send(PlatformEvent::ScanResultsAvailable);
            } else {
                debug!("Dropping outcome of superseded scan");
            }
        }));

        Ok(())
    }

    async fn scan_results(&self) -> WifiResult<Vec<ScanEntry>> {
        self.last_scan.lock().await.result.clone()
    }

    async fn connection_info(&self) -> WifiResult<ConnectionInfo> {
        let status = self.status_map().await?;

        let supplicant_state = SupplicantState::from_wpa_state(
            status.get("wpa_state").map(|s| s.as_str()).unwrap_or("UNKNOWN"),
        );
        let completed = supplicant_state == SupplicantState::Completed;

        let (rssi, link_speed) = if completed {
            match self.request("SIGNAL_POLL").await {
                Ok(output) => parse_signal_poll(&output),
                Err(e) => {
                    warn!("Signal poll failed: {}", e);
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        let ip_address = match status.get("ip_address").cloned() {
            Some(ip) => Some(ip),
            None if completed => self.get_ip_address().await,
            None => None,
        };

        Ok(ConnectionInfo {
            network_id: status
                .get("id")
                .and_then(|id| id.parse().ok())
                .map(NetworkId),
            ssid: status.get("ssid").cloned(),
            bssid: status.get("bssid").cloned(),
            supplicant_state,
            ip_address,
            mac_address: status.get("address").cloned(),
            link_speed,
            rssi,
        })
    }

    async fn dhcp_info(&self) -> WifiResult<DhcpInfo> {
        let resolv_conf = tokio::fs::read_to_string(RESOLV_CONF)
            .await
            .unwrap_or_default();
        let mut servers = parse_nameservers(&resolv_conf).into_iter();

        let gateway = Self::ip(&["-4", "route", "show", "default", "dev", self.interface.as_str()])
            .await
            .ok()
            .and_then(|out| parse_default_gateway(&out));

        Ok(DhcpInfo {
            dns1: servers.next(),
            dns2: servers.next(),
            gateway,
        })
    }

    async fn configured_networks(&self) -> WifiResult<Vec<ConfiguredNetwork>> {
        let output = self.request("LIST_NETWORKS").await?;
        let mut networks = parse_list_networks(&output);

        for network in networks.iter_mut() {
            let id = network.network_id;
            network.key_mgmt = self
                .request(&format!("GET_NETWORK {} key_mgmt", id))
                .await
                .map(|v| parse_key_mgmt(&v))
                .unwrap_or_default();
            network.wep_key0 = self
                .request(&format!("GET_NETWORK {} wep_key0", id))
                .await
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }

        Ok(networks)
    }

    async fn disconnect(&self) -> WifiResult<()> {
        debug!("Disconnecting");
        self.request("DISCONNECT").await?;
        Ok(())
    }

    async fn reconnect(&self) -> WifiResult<()> {
        self.request("RECONNECT").await?;
        Ok(())
    }

    async fn reassociate(&self) -> WifiResult<()> {
        self.request("REASSOCIATE").await?;
        Ok(())
    }

    async fn is_link_connected(&self, link: LinkKind) -> WifiResult<bool> {
        match link {
            LinkKind::Wifi => {
                let status = self.status_map().await?;
                Ok(status.get("wpa_state").map(|s| s.as_str()) == Some("COMPLETED"))
            }
            LinkKind::Ethernet => Ok(Self::carrier(&self.ethernet_interface).await),
            LinkKind::Bluetooth => Ok(Self::carrier(BLUETOOTH_INTERFACE).await),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }
}
