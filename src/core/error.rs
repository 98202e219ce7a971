//! Error types for the WiFi link manager

use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use super::types::NetworkId;

/// Result type for WiFi backend operations
pub type WifiResult<T> = Result<T, WifiError>;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors related to WiFi backend operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    #[error("Network profile rejected: {0}")]
    ProfileRejected(String),

    #[error("WiFi scan failed: {0}")]
    ScanFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(NetworkId),

    #[error("Network interface error: {0}")]
    InterfaceError(String),

    #[error("wpa_supplicant error: {0}")]
    WpaSupplicantError(String),
}

/// Errors returned synchronously when a request is issued
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Operation already in progress")]
    OperationInProgress,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend error: {0}")]
    Backend(#[from] WifiError),
}

/// Terminal failure of a connect attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Network profile rejected: {0}")]
    ProfileRejected(String),

    #[error("No association within {0:?}")]
    Timeout(Duration),

    #[error("Wait for association was interrupted")]
    Interrupted,

    #[error("Backend error: {0}")]
    Backend(WifiError),
}

impl From<WifiError> for ConnectError {
    fn from(err: WifiError) -> Self {
        match err {
            WifiError::ProfileRejected(reason) => ConnectError::ProfileRejected(reason),
            other => ConnectError::Backend(other),
        }
    }
}

impl From<oneshot::error::RecvError> for ConnectError {
    fn from(_: oneshot::error::RecvError) -> Self {
        ConnectError::Interrupted
    }
}

/// Terminal failure of a scan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Search wifi timeout")]
    SearchTimeout,

    #[error("No wifi found")]
    NoWifiFound,

    #[error("Wait for scan results was interrupted")]
    Interrupted,

    #[error("Backend error: {0}")]
    Backend(WifiError),
}

impl From<WifiError> for ScanError {
    fn from(err: WifiError) -> Self {
        ScanError::Backend(err)
    }
}

impl From<oneshot::error::RecvError> for ScanError {
    fn from(_: oneshot::error::RecvError) -> Self {
        ScanError::Interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_rejection_maps_to_connect_error() {
        let err: ConnectError = WifiError::ProfileRejected("bad psk".into()).into();
        assert_eq!(err, ConnectError::ProfileRejected("bad psk".into()));

        let err: ConnectError = WifiError::BackendUnavailable("gone".into()).into();
        assert!(matches!(err, ConnectError::Backend(_)));
    }

    #[test]
    fn test_scan_error_display() {
        assert_eq!(ScanError::SearchTimeout.to_string(), "Search wifi timeout");
        assert_eq!(ScanError::NoWifiFound.to_string(), "No wifi found");
    }
}
