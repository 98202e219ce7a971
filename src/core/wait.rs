//! Bounded waits on platform notifications
//!
//! A [`Subscription`] is the registration for platform events. It is taken
//! before the request that triggers the event and released when dropped, so
//! every exit path of a wait unregisters.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::types::PlatformEvent;

/// Why a wait ended without a match
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("notification source closed")]
    Interrupted,
}

/// Scoped registration for platform events
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<PlatformEvent>,
}

impl Subscription {
    pub fn new(receiver: broadcast::Receiver<PlatformEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event, skipping over lag
    pub async fn next(&mut self) -> Option<PlatformEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event receiver lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until `on_event` yields a value, bounded by `timeout`
    ///
    /// `on_event` sees every event received while armed and returns `Some`
    /// once the awaited condition holds. Events it returns `None` for are
    /// dropped. The bound applies to receiving events only: an event that
    /// arrived in time is always evaluated to the end.
    pub async fn wait_for<T, F, Fut>(
        &mut self,
        timeout: Duration,
        mut on_event: F,
    ) -> Result<T, WaitError>
    where
        F: FnMut(PlatformEvent) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let deadline = Instant::now() + timeout;

        loop {
            let event = match tokio::time::timeout_at(deadline, self.next()).await {
                Ok(Some(event)) => event,
                Ok(None) => return Err(WaitError::Interrupted),
                Err(_) => return Err(WaitError::Timeout(timeout)),
            };

            debug!(?event, "Received platform event");
            if let Some(value) = on_event(event).await {
                return Ok(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_matches_after_unrelated_events() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(rx);

        tx.send(PlatformEvent::ConnectivityChanged).unwrap();
        tx.send(PlatformEvent::ScanResultsAvailable).unwrap();

        let result = sub
            .wait_for(Duration::from_millis(200), |event| async move {
                (event == PlatformEvent::ScanResultsAvailable).then_some(7)
            })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(rx);
        tx.send(PlatformEvent::ConnectivityChanged).unwrap();

        let timeout = Duration::from_millis(30);
        let result: Result<(), _> = sub.wait_for(timeout, |_| async { None }).await;
        assert_eq!(result, Err(WaitError::Timeout(timeout)));
    }

    #[tokio::test]
    async fn test_wait_interrupted_when_source_closes() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(rx);
        drop(tx);

        let result: Result<(), _> = sub
            .wait_for(Duration::from_secs(5), |_| async { None })
            .await;
        assert_eq!(result, Err(WaitError::Interrupted));
    }

    #[tokio::test]
    async fn test_event_received_in_time_is_evaluated_past_deadline() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(rx);
        tx.send(PlatformEvent::ScanResultsAvailable).unwrap();

        let result = sub
            .wait_for(Duration::from_millis(50), |_| async {
                tokio::time::sleep(Duration::from_millis(80)).await;
                Some(Vec::<u8>::new())
            })
            .await;
        assert_eq!(result, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_unmatched_events_do_not_extend_deadline() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(rx);
        tx.send(PlatformEvent::ConnectivityChanged).unwrap();

        let timeout = Duration::from_millis(50);
        let result: Result<(), _> = sub
            .wait_for(timeout, |_| async {
                tokio::time::sleep(Duration::from_millis(80)).await;
                None
            })
            .await;
        assert_eq!(result, Err(WaitError::Timeout(timeout)));
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let (tx, rx) = broadcast::channel::<PlatformEvent>(8);
        let sub = Subscription::new(rx);
        assert_eq!(tx.receiver_count(), 1);
        drop(sub);
        assert_eq!(tx.receiver_count(), 0);
    }
}
