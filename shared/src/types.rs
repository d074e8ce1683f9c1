use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Service type label, e.g. "_http._tcp.local."
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Stable identity of a physical device, taken from its `serial` attribute.
/// Never empty: construct through [`DeviceIdentity::parse`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Returns `None` for an empty value
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// TXT attribute key-value pairs. Keys are case-sensitive.
pub type AttributeMap = BTreeMap<String, String>;

/// Snapshot of one device as seen through one of its services.
/// Built fresh for every discovered/updated notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub identity: DeviceIdentity,

    /// Leading label of the service instance name, e.g. "hostA"
    pub hostname: String,

    pub address: IpAddr,

    pub service: ServiceName,

    /// Absent when the device was seen only through an announcement
    pub port: Option<u16>,

    /// Global attributes overlaid by the service-specific ones
    pub attributes: AttributeMap,
}

/// Emitted once per device when it leaves the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedDevice {
    pub identity: DeviceIdentity,

    /// Services known for the device at removal time
    pub services: BTreeSet<ServiceName>,
}

/// A present device as exposed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub identity: DeviceIdentity,
    pub hostname: String,
    pub address: IpAddr,
    pub services: BTreeSet<ServiceName>,

    /// First time this device was seen
    pub first_seen: DateTime<Utc>,

    /// Last response from this device
    pub last_seen: DateTime<Utc>,
}
