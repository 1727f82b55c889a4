use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A synthetic extension answered locally for quality testing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestExtension {
    pub name: String,
    pub description: String,
}

impl TestExtension {
    fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// SIP registrar / proxy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    /// Address all SIP listeners bind to
    pub bind_host: IpAddr,
    pub udp_port: u16,
    pub tcp_port: u16,
    pub tls_port: u16,

    /// Domain, also used as the digest realm in challenges
    pub domain: String,

    /// Expiry granted when the client does not ask for one (seconds)
    pub registration_expires: u32,

    /// Digest credentials, username to password
    pub users: BTreeMap<String, String>,

    /// Extensions answered locally with real RTP analysis
    pub test_extensions: BTreeMap<String, TestExtension>,

    /// Offer TLS when the certificate and key can be loaded
    pub tls_enabled: bool,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,

    /// TLS handshake deadline (ms)
    pub tls_handshake_timeout_ms: u64,

    /// IP written into SDP and Contact headers; discovered when unset
    pub advertised_ip: Option<IpAddr>,

    /// Address RTP processors bind to
    pub rtp_bind_ip: IpAddr,
    pub rtp_port_min: u16,
    pub rtp_port_max: u16,

    /// Server header on registrar responses
    pub server_header: String,

    /// Server header on redirect responses
    pub proxy_server_header: String,

    /// User part of the echo URI redirects point at
    pub echo_user: String,

    /// Registration expiry sweep interval (seconds)
    pub expiry_sweep_interval_secs: u64,

    /// Largest stream-framed message accepted (bytes)
    pub max_message_size: usize,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        let users = [
            ("gateway-monitor", "VoipQuality2025!"),
            ("gateway-test", "TestMonitor123"),
            ("welcome-gw", "WelcomeGW456"),
        ]
        .into_iter()
        .map(|(u, p)| (u.to_string(), p.to_string()))
        .collect();

        let test_extensions = [
            ("999", TestExtension::new("Test Audio Qualità", "Analisi RTP reale per test qualità")),
            ("998", TestExtension::new("Test con Rumore", "Analisi RTP reale con monitoraggio rumore")),
            ("997", TestExtension::new("Test Echo/Delay", "Analisi RTP reale per delay e echo")),
            ("996", TestExtension::new("Test Packet Loss", "Analisi RTP reale per packet loss")),
        ]
        .into_iter()
        .map(|(ext, info)| (ext.to_string(), info))
        .collect();

        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            udp_port: 5060,
            tcp_port: 5060,
            tls_port: 5061,
            domain: "voip-monitor.local".to_string(),
            registration_expires: 3600,
            users,
            test_extensions,
            tls_enabled: true,
            tls_cert_path: PathBuf::from("certificates/sip-server.local-cert.pem"),
            tls_key_path: PathBuf::from("certificates/sip-server.local-private-key.pem"),
            tls_handshake_timeout_ms: 5000,
            advertised_ip: None,
            rtp_bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rtp_port_min: 10000,
            rtp_port_max: 20000,
            server_header: "VoIP-Quality-Monitor-Registrar/1.0".to_string(),
            proxy_server_header: "VoIP-Quality-Monitor-Proxy/1.0".to_string(),
            echo_user: "echo".to_string(),
            expiry_sweep_interval_secs: 60,
            max_message_size: 65535,
        }
    }
}

impl RegistrarConfig {
    pub fn rtp_port_range(&self) -> RangeInclusive<u16> {
        let (lo, hi) = if self.rtp_port_min <= self.rtp_port_max {
            (self.rtp_port_min, self.rtp_port_max)
        } else {
            (self.rtp_port_max, self.rtp_port_min)
        };
        lo..=hi
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs.max(1))
    }

    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.tls_handshake_timeout_ms.max(1))
    }

    pub fn password_for(&self, username: &str) -> Option<&str> {
        self.users.get(username).map(String::as_str)
    }

    pub fn test_extension(&self, extension: &str) -> Option<&TestExtension> {
        self.test_extensions.get(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistrarConfig::default();
        assert_eq!(config.udp_port, 5060);
        assert_eq!(config.tls_port, 5061);
        assert_eq!(config.password_for("welcome-gw"), Some("WelcomeGW456"));
        assert_eq!(config.password_for("nobody"), None);
        assert_eq!(config.test_extensions.len(), 4);
        assert_eq!(config.test_extension("998").map(|t| t.name.as_str()), Some("Test con Rumore"));
        assert_eq!(config.rtp_port_range(), 10000..=20000);
    }

    #[test]
    fn inverted_rtp_range_is_normalized() {
        let config = RegistrarConfig {
            rtp_port_min: 30000,
            rtp_port_max: 20000,
            ..Default::default()
        };
        assert_eq!(config.rtp_port_range(), 20000..=30000);
    }
}
