//! Radio power handling shared by the orchestrators

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{backend::WifiBackend, core::error::WifiResult};

const RADIO_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Enable the radio if needed and wait until the platform reports it on
///
/// Gives up after `timeout` with a warning and lets the caller proceed; a
/// radio that is still coming up surfaces later as a failed request.
pub(crate) async fn ensure_radio_enabled<B: WifiBackend>(
    backend: &B,
    timeout: Duration,
) -> WifiResult<()> {
    if backend.is_radio_enabled().await? {
        return Ok(());
    }

    info!("Radio is disabled, enabling it");
    backend.set_radio_enabled(true).await?;

    let deadline = Instant::now() + timeout;
    loop {
        if backend.is_radio_enabled().await? {
            debug!("Radio enabled");
            return Ok(());
        }
        if Instant::now() >= deadline {
            warn!("Radio still disabled after {:?}, proceeding anyway", timeout);
            return Ok(());
        }
        tokio::time::sleep(RADIO_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockWifiBackend;

    #[tokio::test]
    async fn test_enabled_radio_is_left_alone() {
        let backend = MockWifiBackend::new();
        ensure_radio_enabled(&backend, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(backend.radio_enable_requests().await, 0);
    }

    #[tokio::test]
    async fn test_disabled_radio_is_enabled() {
        let backend = MockWifiBackend::new();
        backend.set_radio(false).await;

        ensure_radio_enabled(&backend, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(backend.radio_enable_requests().await, 1);
        assert!(backend.is_radio_enabled().await.unwrap());
    }
}
