use std::time::Instant;
use shared::types::{AttributeMap, DeviceRecord};
use super::decode::ValidResponse;
use super::discard::Discard;
use super::tracker::PresenceTracker;
use super::ScannerEvent;

/// Fold one validated response into the tracker.
///
/// Matched SRV data is authoritative: when present, exactly those services
/// are reported and bare announcements are ignored. A response with only
/// announcements refreshes an already-present device and never creates one.
/// Returns one discovered-or-updated event per reported service.
pub fn aggregate(
    response: &ValidResponse,
    tracker: &mut PresenceTracker,
    now: Instant,
) -> Result<Vec<ScannerEvent>, Discard> {
    let records: Vec<DeviceRecord> = if !response.per_service.is_empty() {
        response
            .per_service
            .iter()
            .map(|(service, endpoint)| DeviceRecord {
                identity: response.identity.clone(),
                hostname: endpoint.hostname.clone(),
                address: response.address,
                service: service.clone(),
                port: Some(endpoint.port),
                attributes: overlay(&response.attributes, &endpoint.attributes),
            })
            .collect()
    } else {
        if !tracker.contains(&response.identity) {
            return Err(Discard::UnknownIdentity(response.identity.to_string()));
        }
        response
            .announced
            .iter()
            .map(|service| DeviceRecord {
                identity: response.identity.clone(),
                hostname: response.hostname.clone(),
                address: response.address,
                service: service.clone(),
                port: None,
                attributes: response.attributes.clone(),
            })
            .collect()
    };

    let events = records
        .into_iter()
        .map(|record| {
            let known = tracker.knows(&record.identity, &record.service);
            tracker.record_contact(
                &record.identity,
                &record.service,
                &record.hostname,
                record.address,
                now,
            );
            if known {
                ScannerEvent::Updated(record)
            } else {
                ScannerEvent::Discovered(record)
            }
        })
        .collect();

    Ok(events)
}

fn overlay(global: &AttributeMap, specific: &AttributeMap) -> AttributeMap {
    let mut merged = global.clone();
    merged.extend(specific.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
