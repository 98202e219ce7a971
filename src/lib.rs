//! WiFi Link Manager
//!
//! Connect, scan and connectivity watching on top of wpa_supplicant:
//! - one-shot connect and scan requests resolved through completion handles
//!   or listener callbacks
//! - continuous Ethernet / Wi-Fi connectivity notifications
//! - access point classification and saved-network management

pub mod backend;
pub mod config;
pub mod core;

pub use core::{
    access_point::{AccessPoint, ApStatus, SecurityMode},
    error::{ConnectError, ScanError, ServiceError, WifiError},
    profile::ConnectRequest,
    service::WifiManager,
    types::{ConnectionState, ConnectionStatus, NetType, NetworkId, ScanState},
};
