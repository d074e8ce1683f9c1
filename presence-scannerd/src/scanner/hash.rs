use std::collections::BTreeSet;
use std::net::IpAddr;
use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::{DeviceSummary, ServiceName};

/// Only the fields that describe the device; timestamps move on every
/// response and would make the hash useless for change detection.
#[derive(Serialize)]
struct HashView<'a> {
    identity: &'a str,
    hostname: &'a str,
    address: IpAddr,
    services: &'a BTreeSet<ServiceName>,
}

/// SHA-256 fingerprint of a device snapshot.
/// Devices are sorted by identity for deterministic output.
pub fn compute_hash(devices: &[DeviceSummary]) -> String {
    let mut views: Vec<HashView<'_>> = devices
        .iter()
        .map(|d| HashView {
            identity: d.identity.as_str(),
            hostname: &d.hostname,
            address: d.address,
            services: &d.services,
        })
        .collect();
    views.sort_by(|a, b| a.identity.cmp(b.identity));

    let mut hasher = Sha256::new();
    for view in &views {
        // Serializing plain strings, sets and addresses cannot fail
        if let Ok(json) = serde_json::to_vec(view) {
            hasher.update(&json);
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
