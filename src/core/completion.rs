//! Per-request completion handles

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Resolves once with the terminal outcome of one orchestrated request
///
/// If the background task goes away without reporting, the handle resolves
/// to the error's `Interrupted` variant.
#[derive(Debug)]
#[must_use = "the outcome is only observable through the handle"]
pub struct Pending<T, E> {
    receiver: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Pending<T, E> {
    /// Create a handle and the sender the background task reports through
    pub(crate) fn channel() -> (oneshot::Sender<Result<T, E>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }
}

impl<T, E> Future for Pending<T, E>
where
    E: From<oneshot::error::RecvError>,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|e| Err(E::from(e))))
    }
}
