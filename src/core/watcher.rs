//! Continuous connectivity observation

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    backend::WifiBackend,
    core::{
        error::WifiResult,
        listener::NetStateListener,
        types::{LinkKind, NetType, PlatformEvent},
        wait::Subscription,
    },
};

/// Reports connectivity edges to a registered listener
///
/// Stays registered until [`unregister`](Self::unregister) is called or the
/// watcher is dropped. Each connectivity notification re-reads the link
/// states from the backend and yields exactly one callback.
pub struct ConnectivityWatcher<B: WifiBackend> {
    backend: Arc<B>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<B: WifiBackend> ConnectivityWatcher<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            task: Mutex::new(None),
        }
    }

    /// Start delivering connectivity edges to `listener`
    ///
    /// Replaces a previously registered listener.
    pub async fn register<L: NetStateListener>(&self, listener: L) {
        // subscribe before returning so no notification after this call is lost
        let subscription = Subscription::new(self.backend.subscribe());
        let backend = self.backend.clone();
        let handle = tokio::spawn(watch(backend, subscription, listener));

        if let Some(previous) = self.task.lock().await.replace(handle) {
            previous.abort();
        }
        debug!("Net state listener registered");
    }

    /// Stop delivering connectivity edges
    pub async fn unregister(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            debug!("Net state listener unregistered");
        }
    }

    pub async fn is_registered(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Whether Ethernet or Wi-Fi is connected
    pub async fn is_network_connected(&self) -> WifiResult<bool> {
        Ok(self.is_ethernet_connected().await? || self.is_wifi_connected().await?)
    }

    pub async fn is_wifi_connected(&self) -> WifiResult<bool> {
        self.backend.is_link_connected(LinkKind::Wifi).await
    }

    pub async fn is_ethernet_connected(&self) -> WifiResult<bool> {
        self.backend.is_link_connected(LinkKind::Ethernet).await
    }

    /// Type of the preferred connected link: Ethernet, then Wi-Fi, then Bluetooth
    pub async fn active_network_type(&self) -> WifiResult<NetType> {
        for (link, net_type) in [
            (LinkKind::Ethernet, NetType::Ethernet),
            (LinkKind::Wifi, NetType::Wifi),
            (LinkKind::Bluetooth, NetType::Bluetooth),
        ] {
            if self.backend.is_link_connected(link).await? {
                return Ok(net_type);
            }
        }
        Ok(NetType::None)
    }
}

impl<B: WifiBackend> Drop for ConnectivityWatcher<B> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn watch<B: WifiBackend, L: NetStateListener>(
    backend: Arc<B>,
    mut subscription: Subscription,
    listener: L,
) {
    while let Some(event) = subscription.next().await {
        if event != PlatformEvent::ConnectivityChanged {
            continue;
        }

        let connected = link_up(&*backend, LinkKind::Ethernet).await
            || link_up(&*backend, LinkKind::Wifi).await;
        debug!(connected, "Connectivity changed");

        if connected {
            listener.on_connect();
        } else {
            listener.on_disconnect();
        }
    }
    debug!("Event source closed, watcher stopped");
}

/// A link whose state cannot be read counts as down
async fn link_up<B: WifiBackend>(backend: &B, link: LinkKind) -> bool {
    backend.is_link_connected(link).await.unwrap_or_else(|e| {
        warn!(?link, "Failed to read link state: {}", e);
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockWifiBackend;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Debug, PartialEq)]
    enum Edge {
        Connect,
        Disconnect,
    }

    struct ChannelListener(mpsc::UnboundedSender<Edge>);

    impl NetStateListener for ChannelListener {
        fn on_connect(&self) {
            let _ = self.0.send(Edge::Connect);
        }

        fn on_disconnect(&self) {
            let _ = self.0.send(Edge::Disconnect);
        }
    }

    async fn registered() -> (
        Arc<MockWifiBackend>,
        ConnectivityWatcher<MockWifiBackend>,
        mpsc::UnboundedReceiver<Edge>,
    ) {
        let backend = Arc::new(MockWifiBackend::new());
        let watcher = ConnectivityWatcher::new(backend.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        watcher.register(ChannelListener(tx)).await;
        (backend, watcher, rx)
    }

    #[tokio::test]
    async fn test_watcher_reports_one_edge_per_notification() {
        let (backend, _watcher, mut rx) = registered().await;

        backend.set_link(LinkKind::Wifi, true).await;
        backend.emit(PlatformEvent::ConnectivityChanged);
        assert_eq!(rx.recv().await, Some(Edge::Connect));

        backend.set_link(LinkKind::Wifi, false).await;
        backend.emit(PlatformEvent::ConnectivityChanged);
        assert_eq!(rx.recv().await, Some(Edge::Disconnect));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watcher_ethernet_counts_as_connected() {
        let (backend, _watcher, mut rx) = registered().await;

        backend.set_link(LinkKind::Ethernet, true).await;
        backend.emit(PlatformEvent::ConnectivityChanged);
        assert_eq!(rx.recv().await, Some(Edge::Connect));
    }

    #[tokio::test]
    async fn test_watcher_ignores_other_events() {
        let (backend, _watcher, mut rx) = registered().await;

        backend.emit(PlatformEvent::ScanResultsAvailable);
        backend.emit(PlatformEvent::SupplicantStateChanged);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watcher_unregister() {
        let (backend, watcher, mut rx) = registered().await;
        assert!(watcher.is_registered().await);
        assert_eq!(backend.subscriber_count(), 1);

        watcher.unregister().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!watcher.is_registered().await);
        assert_eq!(backend.subscriber_count(), 0);

        backend.emit(PlatformEvent::ConnectivityChanged);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_watcher_register_replaces_listener() {
        let (backend, watcher, mut first) = registered().await;
        let (tx, mut second) = mpsc::unbounded_channel();
        watcher.register(ChannelListener(tx)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        backend.emit(PlatformEvent::ConnectivityChanged);
        assert_eq!(second.recv().await, Some(Edge::Disconnect));
        assert_eq!(first.recv().await, None);
        assert_eq!(backend.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_unregister_without_listener_is_noop() {
        let backend = Arc::new(MockWifiBackend::new());
        let watcher = ConnectivityWatcher::new(backend);
        watcher.unregister().await;
        assert!(!watcher.is_registered().await);
    }

    #[tokio::test]
    async fn test_active_network_type_precedence() {
        let backend = Arc::new(MockWifiBackend::new());
        let watcher = ConnectivityWatcher::new(backend.clone());
        assert_eq!(watcher.active_network_type().await.unwrap(), NetType::None);
        assert!(!watcher.is_network_connected().await.unwrap());

        backend.set_link(LinkKind::Bluetooth, true).await;
        assert_eq!(
            watcher.active_network_type().await.unwrap(),
            NetType::Bluetooth
        );
        // bluetooth tethering does not count as network connectivity
        assert!(!watcher.is_network_connected().await.unwrap());

        backend.set_link(LinkKind::Wifi, true).await;
        assert_eq!(watcher.active_network_type().await.unwrap(), NetType::Wifi);

        backend.set_link(LinkKind::Ethernet, true).await;
        assert_eq!(
            watcher.active_network_type().await.unwrap(),
            NetType::Ethernet
        );
        assert!(watcher.is_network_connected().await.unwrap());
    }
}
