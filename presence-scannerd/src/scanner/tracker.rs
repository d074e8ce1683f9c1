use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use shared::types::{DeviceIdentity, DeviceSummary, RemovedDevice, ServiceName};

#[derive(Debug, Clone)]
struct DeviceState {
    hostname: String,
    address: IpAddr,
    /// Grows monotonically; never empty
    services: BTreeSet<ServiceName>,
    last_contact: Instant,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Table of present devices keyed by identity.
///
/// A device enters on its first contact and leaves only through
/// [`sweep`](Self::sweep) or [`clear_all`](Self::clear_all); individual
/// services are never forgotten while the device stays present.
#[derive(Debug)]
pub struct PresenceTracker {
    devices: BTreeMap<DeviceIdentity, DeviceState>,
    staleness: Duration,
}

impl PresenceTracker {
    pub fn new(staleness: Duration) -> Self {
        Self {
            devices: BTreeMap::new(),
            staleness,
        }
    }

    pub fn set_staleness(&mut self, staleness: Duration) {
        self.staleness = staleness;
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, identity: &DeviceIdentity) -> bool {
        self.devices.contains_key(identity)
    }

    /// Whether `service` has already been seen on `identity`
    pub fn knows(&self, identity: &DeviceIdentity, service: &ServiceName) -> bool {
        self.devices
            .get(identity)
            .is_some_and(|state| state.services.contains(service))
    }

    /// Mark the device as alive at `now` and remember the service
    pub fn record_contact(
        &mut self,
        identity: &DeviceIdentity,
        service: &ServiceName,
        hostname: &str,
        address: IpAddr,
        now: Instant,
    ) {
        let wall = Utc::now();
        let state = self
            .devices
            .entry(identity.clone())
            .or_insert_with(|| DeviceState {
                hostname: hostname.to_string(),
                address,
                services: BTreeSet::new(),
                last_contact: now,
                first_seen: wall,
                last_seen: wall,
            });

        state.hostname = hostname.to_string();
        state.address = address;
        state.services.insert(service.clone());
        state.last_contact = state.last_contact.max(now);
        state.last_seen = wall;
    }

    /// Remove every device silent for longer than the staleness threshold
    pub fn sweep(&mut self, now: Instant) -> Vec<RemovedDevice> {
        let staleness = self.staleness;
        let stale: Vec<DeviceIdentity> = self
            .devices
            .iter()
            .filter(|(_, state)| now.saturating_duration_since(state.last_contact) > staleness)
            .map(|(identity, _)| identity.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|identity| self.remove(&identity))
            .collect()
    }

    /// Remove every device, one notification each
    pub fn clear_all(&mut self) -> Vec<RemovedDevice> {
        std::mem::take(&mut self.devices)
            .into_iter()
            .map(|(identity, state)| RemovedDevice {
                identity,
                services: state.services,
            })
            .collect()
    }

    /// Pretend every device answered at `now`, without touching membership
    pub fn reset_timeouts(&mut self, now: Instant) {
        for state in self.devices.values_mut() {
            state.last_contact = now;
        }
    }

    pub fn snapshot(&self) -> Vec<DeviceSummary> {
        self.devices
            .iter()
            .map(|(identity, state)| DeviceSummary {
                identity: identity.clone(),
                hostname: state.hostname.clone(),
                address: state.address,
                services: state.services.clone(),
                first_seen: state.first_seen,
                last_seen: state.last_seen,
            })
            .collect()
    }

    fn remove(&mut self, identity: &DeviceIdentity) -> Option<RemovedDevice> {
        self.devices.remove(identity).map(|state| RemovedDevice {
            identity: identity.clone(),
            services: state.services,
        })
    }
}
