//! WiFi connect orchestration with state machine
//!
//! A connect request runs on its own task: register for supplicant events,
//! submit the profile, select it, then wait for the association that
//! matches the new network handle. The subscription is dropped on every
//! exit path before the outcome is reported.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    backend::WifiBackend,
    config::Timeouts,
    core::{
        completion::Pending,
        error::{ConnectError, ServiceError, ServiceResult},
        listener::ConnectListener,
        profile::{ConnectRequest, NetworkProfile},
        radio::ensure_radio_enabled,
        types::{
            ConnectionState, ConnectionStatus, NetworkId, PlatformEvent, RequestId,
            SupplicantState,
        },
        wait::{Subscription, WaitError},
    },
};

/// Connection state machine
#[derive(Debug)]
struct ConnectionStateMachine {
    state: ConnectionState,
    ssid: Option<String>,
    network_id: Option<NetworkId>,
    error: Option<String>,
}

impl ConnectionStateMachine {
    fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            ssid: None,
            network_id: None,
            error: None,
        }
    }

    /// Start connection attempt
    fn start_connect(&mut self, ssid: String) -> ServiceResult<()> {
        match self.state {
            ConnectionState::Connecting => Err(ServiceError::OperationInProgress),
            _ => {
                self.state = ConnectionState::Connecting;
                self.ssid = Some(ssid);
                self.network_id = None;
                self.error = None;
                Ok(())
            }
        }
    }

    /// Mark connection as successful
    fn complete_connect(&mut self, network_id: NetworkId) {
        self.state = ConnectionState::Connected;
        self.network_id = Some(network_id);
        self.error = None;
    }

    /// Mark connection as failed
    fn fail_connect(&mut self, error: String) {
        self.state = ConnectionState::Failed;
        self.error = Some(error);
        self.network_id = None;
    }

    /// Disconnect
    ///
    /// An attempt in flight owns the state until it reports.
    fn disconnect(&mut self) -> ServiceResult<()> {
        if self.state == ConnectionState::Connecting {
            return Err(ServiceError::OperationInProgress);
        }
        self.state = ConnectionState::Idle;
        self.ssid = None;
        self.network_id = None;
        self.error = None;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            ssid: self.ssid.clone(),
            network_id: self.network_id,
            error: self.error.clone(),
        }
    }
}

/// WiFi connect orchestrator
///
/// One instance serves many requests, one at a time: a request issued while
/// another is outstanding is rejected with
/// [`ServiceError::OperationInProgress`].
pub struct Connector<B: WifiBackend> {
    backend: Arc<B>,
    timeouts: Timeouts,
    state_machine: Arc<RwLock<ConnectionStateMachine>>,
}

impl<B: WifiBackend> Connector<B> {
    /// Create a new connector
    pub fn new(backend: Arc<B>, timeouts: Timeouts) -> Self {
        Self {
            backend,
            timeouts,
            state_machine: Arc::new(RwLock::new(ConnectionStateMachine::new())),
        }
    }

    /// Connect to a WiFi network
    ///
    /// Returns once the attempt is running; the handle resolves with the
    /// joined network's handle or the reason the attempt failed.
    pub async fn connect(
        &self,
        request: ConnectRequest,
    ) -> ServiceResult<Pending<NetworkId, ConnectError>> {
        request.validate()?;

        // Check and update state
        self.state_machine
            .write()
            .await
            .start_connect(request.ssid.clone())?;

        let request_id = RequestId::new();
        info!(
            request = %request_id,
            ssid = %request.ssid,
            mode = ?request.security_mode,
            "Connect requested"
        );

        // Perform connection in background
        let backend = self.backend.clone();
        let state_machine = self.state_machine.clone();
        let timeouts = self.timeouts;
        let (sender, pending) = Pending::channel();

        tokio::spawn(async move {
            let outcome = attempt(&*backend, &request, &timeouts, request_id).await;

            match &outcome {
                Ok(id) => {
                    info!(request = %request_id, network = %id, "Connected");
                    state_machine.write().await.complete_connect(*id);
                }
                Err(e) => {
                    info!(request = %request_id, error = %e, "Connect failed");
                    state_machine.write().await.fail_connect(e.to_string());
                }
            }

            // the caller may have dropped the handle
            let _ = sender.send(outcome);
        });

        Ok(pending)
    }

    /// Connect and report the outcome to `listener` exactly once
    pub async fn connect_with_listener<L: ConnectListener>(
        &self,
        request: ConnectRequest,
        listener: L,
    ) -> ServiceResult<()> {
        let pending = self.connect(request).await?;

        tokio::spawn(async move {
            match pending.await {
                Ok(_) => listener.on_completed(),
                Err(e) => listener.on_failed(e),
            }
        });

        Ok(())
    }

    /// Disable the current network and disconnect from it
    ///
    /// Rejected with [`ServiceError::OperationInProgress`] while a connect
    /// attempt is running.
    pub async fn disconnect(&self) -> ServiceResult<()> {
        // held throughout so no attempt can start half way
        let mut state_machine = self.state_machine.write().await;
        if state_machine.state() == ConnectionState::Connecting {
            return Err(ServiceError::OperationInProgress);
        }

        let info = self.backend.connection_info().await?;
        if let Some(id) = info.network_id {
            self.backend.disable_network(id).await?;
        }
        self.backend.disconnect().await?;
        state_machine.disconnect()
    }

    /// Get current connection state
    pub async fn state(&self) -> ConnectionState {
        self.state_machine.read().await.state()
    }

    /// Get current connection status
    pub async fn status(&self) -> ConnectionStatus {
        self.state_machine.read().await.status()
    }
}

/// One complete connect attempt, from radio check to cleanup
async fn attempt<B: WifiBackend>(
    backend: &B,
    request: &ConnectRequest,
    timeouts: &Timeouts,
    request_id: RequestId,
) -> Result<NetworkId, ConnectError> {
    ensure_radio_enabled(backend, timeouts.radio_enable).await?;

    // Register before mutating state so the association event cannot be missed
    let mut subscription = Subscription::new(backend.subscribe());

    let profile = NetworkProfile::from_request(request);
    let id = backend.add_network(&profile).await?;
    debug!(request = %request_id, network = %id, "Profile accepted");

    let joined = join(backend, &mut subscription, id, timeouts.connect).await;
    drop(subscription);

    match joined {
        Ok(()) => {
            if request.persist {
                if let Err(e) = backend.save_config().await {
                    warn!(request = %request_id, "Failed to save configuration: {}", e);
                }
            }
            Ok(id)
        }
        Err(e) => {
            if let Err(remove_err) = backend.remove_network(id).await {
                warn!(
                    request = %request_id,
                    network = %id,
                    "Failed to remove network: {}",
                    remove_err
                );
            }
            Err(e)
        }
    }
}

/// Select the network and wait for its association
async fn join<B: WifiBackend>(
    backend: &B,
    subscription: &mut Subscription,
    id: NetworkId,
    timeout: Duration,
) -> Result<(), ConnectError> {
    backend.enable_network(id).await?;

    subscription
        .wait_for(timeout, move |event| async move {
            if event != PlatformEvent::SupplicantStateChanged {
                return None;
            }
            match backend.connection_info().await {
                Ok(info) => (info.network_id == Some(id)
                    && info.supplicant_state == SupplicantState::Completed)
                    .then_some(()),
                Err(e) => {
                    warn!("Failed to read connection info: {}", e);
                    None
                }
            }
        })
        .await
        .map_err(|e| match e {
            WaitError::Timeout(after) => ConnectError::Timeout(after),
            WaitError::Interrupted => ConnectError::Interrupted,
        })
}
