//! WiFi scan orchestration with state machine

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    backend::WifiBackend,
    config::Timeouts,
    core::{
        access_point::{AccessPoint, ApStatus},
        completion::Pending,
        error::{ScanError, ServiceError, ServiceResult},
        listener::SearchListener,
        radio::ensure_radio_enabled,
        types::{PlatformEvent, RequestId, ScanEntry, ScanState},
        wait::{Subscription, WaitError},
    },
};

/// Scan state machine
///
/// Manages the state transitions for WiFi scanning operations
#[derive(Debug)]
struct ScanStateMachine {
    state: ScanState,
    results: Option<Vec<AccessPoint>>,
    error: Option<String>,
}

impl ScanStateMachine {
    fn new() -> Self {
        Self {
            state: ScanState::Idle,
            results: None,
            error: None,
        }
    }

    /// Start a scan operation
    fn start_scan(&mut self) -> ServiceResult<()> {
        match self.state {
            ScanState::Idle | ScanState::Finished | ScanState::Error => {
                self.state = ScanState::Scanning;
                self.results = None;
                self.error = None;
                Ok(())
            }
            _ => Err(ServiceError::OperationInProgress),
        }
    }

    /// Mark scan as completed with results
    fn complete_scan(&mut self, access_points: Vec<AccessPoint>) {
        self.state = ScanState::Finished;
        self.results = Some(access_points);
        self.error = None;
    }

    /// Mark scan as failed
    fn fail_scan(&mut self, error: String) {
        self.state = ScanState::Error;
        self.error = Some(error);
        self.results = None;
    }

    fn state(&self) -> ScanState {
        self.state
    }

    fn results(&self) -> Option<&[AccessPoint]> {
        self.results.as_deref()
    }
}

/// WiFi scan orchestrator
pub struct Searcher<B: WifiBackend> {
    backend: Arc<B>,
    timeouts: Timeouts,
    state_machine: Arc<RwLock<ScanStateMachine>>,
}

impl<B: WifiBackend> Searcher<B> {
    pub fn new(backend: Arc<B>, timeouts: Timeouts) -> Self {
        Self {
            backend,
            timeouts,
            state_machine: Arc::new(RwLock::new(ScanStateMachine::new())),
        }
    }

    /// Start a WiFi scan
    ///
    /// Returns an error if a scan is already in progress. The handle
    /// resolves with the visible access points, the associated one first.
    pub async fn search(&self) -> ServiceResult<Pending<Vec<AccessPoint>, ScanError>> {
        // Check and update state
        self.state_machine.write().await.start_scan()?;

        let request_id = RequestId::new();
        info!(request = %request_id, "Scan requested");

        // Perform scan in background
        let backend = self.backend.clone();
        let state_machine = self.state_machine.clone();
        let timeouts = self.timeouts;
        let (sender, pending) = Pending::channel();

        tokio::spawn(async move {
            let outcome = scan(&*backend, &timeouts, request_id).await;

            match &outcome {
                Ok(access_points) => {
                    info!(
                        request = %request_id,
                        count = access_points.len(),
                        "Scan finished"
                    );
                    state_machine
                        .write()
                        .await
                        .complete_scan(access_points.clone());
                }
                Err(e) => {
                    info!(request = %request_id, error = %e, "Scan failed");
                    state_machine.write().await.fail_scan(e.to_string());
                }
            }

            let _ = sender.send(outcome);
        });

        Ok(pending)
    }

    /// Scan and report the outcome to `listener` exactly once
    pub async fn search_with_listener<L: SearchListener>(&self, listener: L) -> ServiceResult<()> {
        let pending = self.search().await?;

        tokio::spawn(async move {
            match pending.await {
                Ok(access_points) => listener.on_search_success(access_points),
                Err(e) => listener.on_search_failed(e),
            }
        });

        Ok(())
    }

    /// Get the current scan state
    pub async fn state(&self) -> ScanState {
        self.state_machine.read().await.state()
    }

    /// Access points of the last successful scan
    pub async fn last_results(&self) -> Option<Vec<AccessPoint>> {
        self.state_machine.read().await.results().map(|r| r.to_vec())
    }
}

async fn scan<B: WifiBackend>(
    backend: &B,
    timeouts: &Timeouts,
    request_id: RequestId,
) -> Result<Vec<AccessPoint>, ScanError> {
    ensure_radio_enabled(backend, timeouts.radio_enable).await?;

    let mut subscription = Subscription::new(backend.subscribe());
    backend.start_scan().await?;
    debug!(request = %request_id, "Scan started, waiting for results");

    let entries = subscription
        .wait_for(timeouts.scan, move |event| async move {
            if event != PlatformEvent::ScanResultsAvailable {
                return None;
            }
            Some(backend.scan_results().await)
        })
        .await;
    drop(subscription);

    let entries = match entries {
        Ok(result) => result?,
        Err(WaitError::Timeout(_)) => return Err(ScanError::SearchTimeout),
        Err(WaitError::Interrupted) => return Err(ScanError::Interrupted),
    };

    if entries.is_empty() {
        return Err(ScanError::NoWifiFound);
    }

    let current_bssid = match backend.connection_info().await {
        Ok(info) => info.bssid,
        Err(e) => {
            warn!(request = %request_id, "Failed to read connection info: {}", e);
            None
        }
    };

    Ok(order_results(&entries, current_bssid.as_deref()))
}

/// Translate scan entries, moving the associated one to the front
///
/// The associated entry is marked `Current`, every other one `Enabled`. The
/// remaining entries keep the platform's order.
fn order_results(entries: &[ScanEntry], current_bssid: Option<&str>) -> Vec<AccessPoint> {
    let is_current = |entry: &ScanEntry| {
        current_bssid.is_some_and(|bssid| entry.bssid.eq_ignore_ascii_case(bssid))
    };

    let mut access_points = Vec::with_capacity(entries.len());
    let mut current = None;
    for entry in entries {
        let mut ap = AccessPoint::from(entry);
        if current.is_none() && is_current(entry) {
            ap.status = ApStatus::Current;
            current = Some(ap);
        } else {
            ap.status = ApStatus::Enabled;
            access_points.push(ap);
        }
    }

    if let Some(ap) = current {
        access_points.insert(0, ap);
    }
    access_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockWifiBackend;
    use crate::core::access_point::SecurityMode;
    use crate::core::error::WifiError;
    use crate::core::types::ConnectionInfo;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn timeouts() -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(100),
            scan: Duration::from_millis(100),
            radio_enable: Duration::from_millis(50),
        }
    }

    fn entry(ssid: &str, bssid: &str, capabilities: &str, level: i32) -> ScanEntry {
        ScanEntry {
            ssid: ssid.into(),
            bssid: bssid.into(),
            capabilities: capabilities.into(),
            level,
            frequency: 2437,
        }
    }

    fn sample_entries() -> Vec<ScanEntry> {
        vec![
            entry("Cafe", "aa:aa:aa:aa:aa:01", "[ESS]", -70),
            entry("Home", "aa:aa:aa:aa:aa:02", "[WPA2-PSK-CCMP][ESS]", -50),
            entry("Office", "aa:aa:aa:aa:aa:03", "[WPA2-EAP-CCMP][ESS]", -60),
        ]
    }

    struct ChannelListener(mpsc::UnboundedSender<Result<Vec<AccessPoint>, ScanError>>);

    impl SearchListener for ChannelListener {
        fn on_search_success(&self, results: Vec<AccessPoint>) {
            let _ = self.0.send(Ok(results));
        }

        fn on_search_failed(&self, error: ScanError) {
            let _ = self.0.send(Err(error));
        }
    }

    #[test]
    fn test_scan_state_machine_transitions() {
        let mut sm = ScanStateMachine::new();
        assert_eq!(sm.state(), ScanState::Idle);

        // Start scan
        sm.start_scan().unwrap();
        assert_eq!(sm.state(), ScanState::Scanning);

        // Cannot start another scan while scanning
        assert!(sm.start_scan().is_err());

        // Complete scan
        let access_points = vec![AccessPoint::manual("TestNetwork", SecurityMode::Open)];
        sm.complete_scan(access_points);
        assert_eq!(sm.state(), ScanState::Finished);
        assert_eq!(sm.results().unwrap().len(), 1);

        // Can scan again
        sm.start_scan().unwrap();
        assert!(sm.results().is_none());
    }

    #[test]
    fn test_scan_state_machine_error() {
        let mut sm = ScanStateMachine::new();
        sm.start_scan().unwrap();
        sm.fail_scan("Test error".into());

        assert_eq!(sm.state(), ScanState::Error);
        assert!(sm.results().is_none());
    }

    #[test]
    fn test_order_results_moves_current_first() {
        let ordered = order_results(&sample_entries(), Some("AA:AA:AA:AA:AA:03"));

        let ssids: Vec<_> = ordered.iter().map(|ap| ap.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["Office", "Cafe", "Home"]);
        let statuses: Vec<_> = ordered.iter().map(|ap| ap.status).collect();
        assert_eq!(
            statuses,
            vec![ApStatus::Current, ApStatus::Enabled, ApStatus::Enabled]
        );
    }

    #[test]
    fn test_order_results_without_association() {
        let ordered = order_results(&sample_entries(), None);

        let ssids: Vec<_> = ordered.iter().map(|ap| ap.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["Cafe", "Home", "Office"]);
        assert!(ordered.iter().all(|ap| ap.status == ApStatus::Enabled));
        assert_eq!(ordered[1].security_label, "WPA2 PSK");
        assert_eq!(ordered[1].level(), Some(-50));
    }

    #[tokio::test]
    async fn test_search_success() {
        let backend = Arc::new(MockWifiBackend::new());
        backend.set_scan_results(sample_entries()).await;
        backend.set_complete_scans(true).await;
        backend
            .set_connection(ConnectionInfo {
                bssid: Some("aa:aa:aa:aa:aa:02".into()),
                ..ConnectionInfo::default()
            })
            .await;
        let searcher = Searcher::new(backend.clone(), timeouts());

        let results = searcher.search().await.unwrap().await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].ssid, "Home");
        assert_eq!(results[0].status, ApStatus::Current);
        assert_eq!(searcher.state().await, ScanState::Finished);
        assert_eq!(searcher.last_results().await, Some(results));
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_search_empty_results() {
        let backend = Arc::new(MockWifiBackend::new());
        backend.set_complete_scans(true).await;
        let searcher = Searcher::new(backend.clone(), timeouts());

        let result = searcher.search().await.unwrap().await;

        assert_eq!(result, Err(ScanError::NoWifiFound));
        assert_eq!(searcher.state().await, ScanState::Error);
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_search_timeout() {
        let backend = Arc::new(MockWifiBackend::new());
        backend.set_scan_results(sample_entries()).await;
        let searcher = Searcher::new(backend.clone(), timeouts());
        let (tx, mut rx) = mpsc::unbounded_channel();

        searcher
            .search_with_listener(ChannelListener(tx))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), Err(ScanError::SearchTimeout));
        assert_eq!(backend.subscriber_count(), 0);

        // a late notification produces no second callback
        backend.emit(PlatformEvent::ScanResultsAvailable);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_search_slow_empty_read_is_no_wifi_found() {
        let backend = Arc::new(MockWifiBackend::new());
        backend.set_complete_scans(true).await;
        // results arrive in time, reading them ends past the scan bound
        backend.set_scan_read_delay(Duration::from_millis(150)).await;
        let searcher = Searcher::new(backend.clone(), timeouts());

        let result = searcher.search().await.unwrap().await;

        assert_eq!(result, Err(ScanError::NoWifiFound));
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_search_failed_scan_is_reported() {
        let backend = Arc::new(MockWifiBackend::new());
        backend.set_complete_scans(true).await;
        backend
            .set_scan_read_error(Some(WifiError::ScanFailed("busy".into())))
            .await;
        let searcher = Searcher::new(backend.clone(), timeouts());

        let result = searcher.search().await.unwrap().await;

        assert_eq!(
            result,
            Err(ScanError::Backend(WifiError::ScanFailed("busy".into())))
        );
        assert_eq!(searcher.state().await, ScanState::Error);
    }

    #[tokio::test]
    async fn test_search_backend_failure() {
        let backend = Arc::new(MockWifiBackend::new());
        backend.set_scan_failure(true).await;
        let searcher = Searcher::new(backend.clone(), timeouts());

        let result = searcher.search().await.unwrap().await;

        assert!(matches!(result, Err(ScanError::Backend(_))));
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_search_operation_in_progress() {
        let backend = Arc::new(MockWifiBackend::new());
        let searcher = Searcher::new(backend, timeouts());

        let first = searcher.search().await.unwrap();
        assert!(matches!(
            searcher.search().await,
            Err(ServiceError::OperationInProgress)
        ));
        assert_eq!(first.await, Err(ScanError::SearchTimeout));
    }

    #[tokio::test]
    async fn test_search_enables_radio() {
        let backend = Arc::new(MockWifiBackend::new());
        backend.set_radio(false).await;
        backend.set_scan_results(sample_entries()).await;
        backend.set_complete_scans(true).await;
        let searcher = Searcher::new(backend.clone(), timeouts());

        searcher.search().await.unwrap().await.unwrap();

        assert_eq!(backend.radio_enable_requests().await, 1);
    }
}
