//! Callback interfaces for callers that prefer listeners over handles
//!
//! Callbacks run on the background task that finished the request, never on
//! the caller's task.

use crate::core::{
    access_point::AccessPoint,
    error::{ConnectError, ScanError},
};

/// Receives the outcome of one connect attempt
pub trait ConnectListener: Send + Sync + 'static {
    fn on_completed(&self);

    fn on_failed(&self, error: ConnectError);
}

/// Receives the outcome of one scan
pub trait SearchListener: Send + Sync + 'static {
    fn on_search_success(&self, results: Vec<AccessPoint>);

    fn on_search_failed(&self, error: ScanError);
}

/// Receives connectivity edges from the watcher
pub trait NetStateListener: Send + Sync + 'static {
    fn on_connect(&self);

    fn on_disconnect(&self);
}
