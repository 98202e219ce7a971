//! Connect requests and the platform profiles built from them

use crate::core::{
    access_point::{AccessPoint, SecurityMode},
    error::{ServiceError, ServiceResult},
    types::KeyMgmt,
};

/// Maximum SSID length in bytes
const MAX_SSID_LEN: usize = 32;

/// EAP method used for enterprise networks
const ENTERPRISE_EAP: &str = "PEAP";

/// Parameters of one connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub ssid: String,
    pub security_mode: SecurityMode,
    pub password: String,
    /// Identity, only used for EAP
    pub username: Option<String>,
    /// Save the profile once the network is joined
    pub persist: bool,
}

impl ConnectRequest {
    pub fn new(
        ssid: impl Into<String>,
        security_mode: SecurityMode,
        password: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            security_mode,
            password: password.into(),
            username: None,
            persist: false,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Build a request from an access point carrying credentials
    pub fn for_access_point(ap: &AccessPoint, persist: bool) -> Self {
        Self {
            ssid: ap.ssid.clone(),
            security_mode: ap.security_mode,
            password: ap.password.clone().unwrap_or_default(),
            username: ap.username.clone(),
            persist,
        }
    }

    /// Reject requests no platform could act on
    pub fn validate(&self) -> ServiceResult<()> {
        if self.ssid.is_empty() {
            return Err(ServiceError::InvalidRequest("SSID is empty".into()));
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ServiceError::InvalidRequest(format!(
                "SSID is {} bytes, at most {} allowed",
                self.ssid.len(),
                MAX_SSID_LEN
            )));
        }
        if self.security_mode == SecurityMode::Eap
            && self.username.as_deref().is_none_or(str::is_empty)
        {
            return Err(ServiceError::InvalidRequest(
                "EAP networks require a username".into(),
            ));
        }
        Ok(())
    }
}

/// Authentication algorithms for WEP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAlg {
    Open,
    Shared,
}

impl AuthAlg {
    fn as_str(&self) -> &'static str {
        match self {
            AuthAlg::Open => "OPEN",
            AuthAlg::Shared => "SHARED",
        }
    }
}

/// Enterprise credentials, supplied alongside the profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapCredentials {
    pub method: &'static str,
    pub identity: String,
    pub password: String,
}

/// Network profile submitted to the platform
///
/// String values follow the supplicant convention: quoted values are
/// passphrases or names, bare hex values are raw keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub ssid: String,
    pub key_mgmt: Vec<KeyMgmt>,
    pub auth_alg: Vec<AuthAlg>,
    pub wep_key0: Option<String>,
    pub psk: Option<String>,
    pub eap: Option<EapCredentials>,
    pub group: Vec<&'static str>,
    pub pairwise: Vec<&'static str>,
    pub proto: Vec<&'static str>,
}

impl NetworkProfile {
    fn empty(ssid: &str) -> Self {
        Self {
            ssid: quote(ssid),
            key_mgmt: Vec::new(),
            auth_alg: Vec::new(),
            wep_key0: None,
            psk: None,
            eap: None,
            group: Vec::new(),
            pairwise: Vec::new(),
            proto: Vec::new(),
        }
    }

    /// Select key management and credentials for the request's security mode
    pub fn from_request(request: &ConnectRequest) -> Self {
        let mut profile = Self::empty(&request.ssid);
        let password = request.password.as_str();

        match request.security_mode {
            SecurityMode::Open => {
                profile.key_mgmt = vec![KeyMgmt::None];
            }
            SecurityMode::Wep => {
                profile.key_mgmt = vec![KeyMgmt::None];
                profile.auth_alg = vec![AuthAlg::Open, AuthAlg::Shared];
                if !password.is_empty() {
                    // WEP-40, WEP-104 and WEP-232 raw keys
                    let raw = matches!(password.len(), 10 | 26 | 58) && is_hex(password);
                    profile.wep_key0 = Some(if raw {
                        password.to_string()
                    } else {
                        quote(password)
                    });
                }
            }
            SecurityMode::Psk => {
                profile.key_mgmt = vec![KeyMgmt::WpaPsk];
                if !password.is_empty() {
                    let raw = password.len() == 64 && is_hex(password);
                    profile.psk = Some(if raw {
                        password.to_string()
                    } else {
                        quote(password)
                    });
                }
            }
            SecurityMode::Eap => {
                profile.key_mgmt = vec![KeyMgmt::WpaEap, KeyMgmt::Ieee8021x];
                profile.group = vec!["CCMP", "TKIP", "WEP104", "WEP40"];
                profile.pairwise = vec!["TKIP", "CCMP"];
                profile.proto = vec!["RSN", "WPA"];
                profile.eap = Some(EapCredentials {
                    method: ENTERPRISE_EAP,
                    identity: request.username.clone().unwrap_or_default(),
                    password: password.to_string(),
                });
            }
        }

        profile
    }

    /// Ordered `(key, value)` pairs for the supplicant's `SET_NETWORK`
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        let mut settings = vec![("ssid", self.ssid.clone())];

        if !self.key_mgmt.is_empty() {
            settings.push(("key_mgmt", join(self.key_mgmt.iter().map(KeyMgmt::as_str))));
        }
        if !self.auth_alg.is_empty() {
            settings.push(("auth_alg", join(self.auth_alg.iter().map(AuthAlg::as_str))));
        }
        if let Some(key) = &self.wep_key0 {
            settings.push(("wep_key0", key.clone()));
            settings.push(("wep_tx_keyidx", "0".to_string()));
        }
        if let Some(psk) = &self.psk {
            settings.push(("psk", psk.clone()));
        }
        if !self.group.is_empty() {
            settings.push(("group", join(self.group.iter().copied())));
        }
        if !self.pairwise.is_empty() {
            settings.push(("pairwise", join(self.pairwise.iter().copied())));
        }
        if !self.proto.is_empty() {
            settings.push(("proto", join(self.proto.iter().copied())));
        }
        if let Some(eap) = &self.eap {
            settings.push(("eap", eap.method.to_string()));
            settings.push(("identity", quote(&eap.identity)));
            settings.push(("password", quote(&eap.password)));
        }

        settings
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value)
}

fn is_hex(value: &str) -> bool {
    hex::decode(value).is_ok()
}

fn join<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens.collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build(ssid: &str, mode: SecurityMode, password: impl Into<String>) -> NetworkProfile {
        NetworkProfile::from_request(&ConnectRequest::new(ssid, mode, password))
    }

    #[test]
    fn test_open_profile() {
        let profile = build("Lobby", SecurityMode::Open, "");
        assert_eq!(
            profile.settings(),
            vec![
                ("ssid", "\"Lobby\"".to_string()),
                ("key_mgmt", "NONE".to_string())
            ]
        );
    }

    #[test]
    fn test_wep_raw_keys_by_length() {
        for key in ["0123456789", "0123456789abcdef0123456789", &"aB".repeat(29)] {
            let profile = build("W", SecurityMode::Wep, key);
            assert_eq!(profile.wep_key0.as_deref(), Some(key));
            assert_eq!(profile.key_mgmt, vec![KeyMgmt::None]);
            assert_eq!(profile.auth_alg, vec![AuthAlg::Open, AuthAlg::Shared]);
        }
    }

    #[test]
    fn test_wep_passphrase_is_quoted() {
        // right length but not hex
        let profile = build("W", SecurityMode::Wep, "zzzzzzzzzz");
        assert_eq!(profile.wep_key0.as_deref(), Some("\"zzzzzzzzzz\""));

        // hex but wrong length
        let profile = build("W", SecurityMode::Wep, "abcdef");
        assert_eq!(profile.wep_key0.as_deref(), Some("\"abcdef\""));

        let profile = build("W", SecurityMode::Wep, "");
        assert_eq!(profile.wep_key0, None);
    }

    #[test]
    fn test_psk_raw_and_passphrase() {
        let raw = "0f".repeat(32);
        let profile = build("P", SecurityMode::Psk, raw.clone());
        assert_eq!(profile.key_mgmt, vec![KeyMgmt::WpaPsk]);
        assert_eq!(profile.psk, Some(raw));

        let profile = build("P", SecurityMode::Psk, "hunter22");
        assert_eq!(profile.psk.as_deref(), Some("\"hunter22\""));

        // 63 hex digits is a passphrase
        let profile = build("P", SecurityMode::Psk, "a".repeat(63));
        assert_eq!(profile.psk, Some(format!("\"{}\"", "a".repeat(63))));
    }

    #[test]
    fn test_eap_profile_settings() {
        let request = ConnectRequest::new("Corp", SecurityMode::Eap, "pw").with_username("bob");
        let profile = NetworkProfile::from_request(&request);

        assert_eq!(
            profile.settings(),
            vec![
                ("ssid", "\"Corp\"".to_string()),
                ("key_mgmt", "WPA-EAP IEEE8021X".to_string()),
                ("group", "CCMP TKIP WEP104 WEP40".to_string()),
                ("pairwise", "TKIP CCMP".to_string()),
                ("proto", "RSN WPA".to_string()),
                ("eap", "PEAP".to_string()),
                ("identity", "\"bob\"".to_string()),
                ("password", "\"pw\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_validate() {
        assert!(ConnectRequest::new("", SecurityMode::Open, "").validate().is_err());
        assert!(ConnectRequest::new("x".repeat(33), SecurityMode::Open, "").validate().is_err());
        assert!(ConnectRequest::new("Corp", SecurityMode::Eap, "pw").validate().is_err());
        assert!(ConnectRequest::new("Corp", SecurityMode::Eap, "pw")
            .with_username("bob")
            .validate()
            .is_ok());
        assert!(ConnectRequest::new("Home", SecurityMode::Psk, "pw").validate().is_ok());
    }

    #[test]
    fn test_request_from_access_point() {
        let ap = AccessPoint::manual("Corp", SecurityMode::Eap)
            .with_username("bob")
            .with_password("pw");
        let request = ConnectRequest::for_access_point(&ap, true);
        assert_eq!(
            request,
            ConnectRequest::new("Corp", SecurityMode::Eap, "pw")
                .with_username("bob")
                .persist(true)
        );
    }
}
