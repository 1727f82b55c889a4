//! Registration table

use std::net::SocketAddr;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::transport::Transport;

/// A device bound to an extension by a successful REGISTER
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDevice {
    pub extension: String,
    pub contact: String,
    pub transport: Transport,
    pub expires: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub source: SocketAddr,
}

impl RegisteredDevice {
    pub fn new(
        extension: impl Into<String>,
        contact: impl Into<String>,
        transport: Transport,
        source: SocketAddr,
        expires_secs: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            extension: extension.into(),
            contact: contact.into(),
            transport,
            expires: now + ChronoDuration::seconds(i64::from(expires_secs)),
            last_seen: now,
            source,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    pub fn view(&self) -> DeviceView {
        DeviceView {
            extension: self.extension.clone(),
            contact: self.contact.clone(),
            expires: self.expires,
            last_seen: self.last_seen,
            transport: self.transport,
            addr: self.source.to_string(),
        }
    }
}

/// Serializable snapshot of a registered device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceView {
    pub extension: String,
    pub contact: String,
    pub expires: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub transport: Transport,
    /// Source address as `ip:port`
    pub addr: String,
}

/// Devices keyed by extension; a later REGISTER replaces the earlier entry
#[derive(Debug, Default)]
pub struct RegistrationTable {
    devices: DashMap<String, RegisteredDevice>,
}

impl RegistrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh; returns the replaced entry if any
    pub fn register(&self, device: RegisteredDevice) -> Option<RegisteredDevice> {
        self.devices.insert(device.extension.clone(), device)
    }

    pub fn unregister(&self, extension: &str) -> Option<RegisteredDevice> {
        self.devices.remove(extension).map(|(_, d)| d)
    }

    pub fn get(&self, extension: &str) -> Option<RegisteredDevice> {
        self.devices.get(extension).map(|d| d.clone())
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.devices.contains_key(extension)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// All devices sorted by extension
    pub fn list(&self) -> Vec<RegisteredDevice> {
        let mut devices: Vec<_> = self.devices.iter().map(|e| e.value().clone()).collect();
        devices.sort_by(|a, b| a.extension.cmp(&b.extension));
        devices
    }

    pub fn views(&self) -> Vec<DeviceView> {
        self.list().iter().map(RegisteredDevice::view).collect()
    }

    /// Drop every device whose expiry has passed; returns their extensions
    pub fn remove_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .devices
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();

        expired
            .into_iter()
            .filter(|ext| self.devices.remove_if(ext, |_, d| d.is_expired(now)).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(ext: &str, expires: u32, now: DateTime<Utc>) -> RegisteredDevice {
        RegisteredDevice::new(
            ext,
            format!("sip:{}@10.0.0.2:5060", ext),
            Transport::Udp,
            "10.0.0.2:5060".parse().unwrap(),
            expires,
            now,
        )
    }

    #[test]
    fn register_replaces_previous_entry() {
        let table = RegistrationTable::new();
        let now = Utc::now();
        assert!(table.register(device("201", 60, now)).is_none());
        let later = now + ChronoDuration::seconds(30);
        let old = table.register(device("201", 60, later)).unwrap();
        assert_eq!(old.last_seen, now);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("201").unwrap().expires, later + ChronoDuration::seconds(60));
    }

    #[test]
    fn unregister_and_views() {
        let table = RegistrationTable::new();
        let now = Utc::now();
        table.register(device("202", 60, now));
        table.register(device("201", 60, now));
        let views = table.views();
        assert_eq!(views[0].extension, "201");
        assert_eq!(views[0].addr, "10.0.0.2:5060");
        assert!(table.unregister("201").is_some());
        assert!(!table.contains("201"));
        assert!(table.unregister("201").is_none());
    }

    #[test]
    fn sweep_removes_only_expired() {
        let table = RegistrationTable::new();
        let now = Utc::now();
        table.register(device("201", 10, now));
        table.register(device("202", 3600, now));
        let removed = table.remove_expired(now + ChronoDuration::seconds(11));
        assert_eq!(removed, vec!["201".to_string()]);
        assert_eq!(table.len(), 1);
        assert!(table.remove_expired(now + ChronoDuration::seconds(11)).is_empty());
    }
}
