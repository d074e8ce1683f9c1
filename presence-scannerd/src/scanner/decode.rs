use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::IpAddr;
use shared::protocol::SERIAL_KEY;
use shared::types::{AttributeMap, DeviceIdentity, ServiceName};
use crate::mdns::Message;
use super::classify::{classify, Fragment};
use super::discard::Discard;
use super::filter::{ContentFilter, ServiceFilter};

/// Where one matched service lives on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub hostname: String,
    pub port: u16,
    /// Attributes published under this service's instance name only
    pub attributes: AttributeMap,
}

/// Fragments of one message joined by owner name. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedResponse {
    pub hostname: Option<String>,
    pub address: Option<IpAddr>,
    pub serial: Option<DeviceIdentity>,
    /// Every attribute in the message, later records overwriting earlier ones
    pub attributes: AttributeMap,
    pub announced: BTreeSet<ServiceName>,
    pub per_service: BTreeMap<ServiceName, ServiceEndpoint>,
}

/// A decoded response that carries everything needed to name a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidResponse {
    pub identity: DeviceIdentity,
    pub hostname: String,
    pub address: IpAddr,
    pub attributes: AttributeMap,
    pub announced: BTreeSet<ServiceName>,
    pub per_service: BTreeMap<ServiceName, ServiceEndpoint>,
}

/// Join the fragments of one message. Services outside `services` are dropped.
pub fn decode(
    source: Option<IpAddr>,
    fragments: &[Fragment],
    services: &ServiceFilter,
) -> DecodedResponse {
    let mut decoded = DecodedResponse::default();
    let mut address_owner: Option<&str> = None;
    // instance fullname -> service, to attach per-instance TXT records
    let mut instances: HashMap<&str, ServiceName> = HashMap::new();

    for fragment in fragments {
        match fragment {
            Fragment::Address { name, address } => {
                if decoded.address.is_none() {
                    decoded.address = Some(*address);
                    address_owner = Some(name.as_str());
                }
            }
            Fragment::Service { fullname, hostname, service, port } => {
                if !services.matches(service) {
                    continue;
                }
                if decoded.hostname.is_none() {
                    decoded.hostname = Some(hostname.clone());
                }
                instances.insert(fullname.as_str(), service.clone());
                decoded.per_service.insert(
                    service.clone(),
                    ServiceEndpoint {
                        hostname: hostname.clone(),
                        port: *port,
                        attributes: AttributeMap::new(),
                    },
                );
            }
            Fragment::Announcement { service } => {
                if services.matches(service) {
                    decoded.announced.insert(service.clone());
                }
            }
            Fragment::Attributes { .. } => {}
        }
    }

    for fragment in fragments {
        if let Fragment::Attributes { name, attributes } = fragment {
            decoded.attributes.extend(attributes.clone());
            let endpoint = instances
                .get(name.as_str())
                .and_then(|service| decoded.per_service.get_mut(service));
            if let Some(endpoint) = endpoint {
                endpoint.attributes.extend(attributes.clone());
            }
        }
    }

    decoded.address = decoded.address.or(source);
    if decoded.hostname.is_none() {
        decoded.hostname = address_owner
            .and_then(|owner| owner.split('.').next())
            .filter(|label| !label.is_empty())
            .map(str::to_string);
    }
    decoded.serial = decoded
        .attributes
        .get(SERIAL_KEY)
        .and_then(|value| DeviceIdentity::parse(value));

    decoded
}

impl DecodedResponse {
    pub fn validate(self) -> Result<ValidResponse, Discard> {
        if self.per_service.is_empty() && self.announced.is_empty() {
            return Err(Discard::NoMatchingService);
        }
        let identity = self.serial.ok_or(Discard::IncompleteIdentity("serial"))?;
        let hostname = self
            .hostname
            .filter(|h| !h.is_empty())
            .ok_or(Discard::IncompleteIdentity("hostname"))?;
        let address = self.address.ok_or(Discard::IncompleteIdentity("address"))?;

        Ok(ValidResponse {
            identity,
            hostname,
            address,
            attributes: self.attributes,
            announced: self.announced,
            per_service: self.per_service,
        })
    }
}

/// Full inbound pipeline short of aggregation: classify, gate on content, join, validate
pub fn decode_message(
    message: &Message,
    content: &ContentFilter,
    services: &ServiceFilter,
) -> Result<ValidResponse, Discard> {
    if !message.is_response {
        return Err(Discard::NotAResponse);
    }

    let mut fragments = Vec::with_capacity(message.records.len());
    for record in &message.records {
        if let Some(fragment) = classify(record)? {
            fragments.push(fragment);
        }
    }

    if !content.accepts(&fragments) {
        return Err(Discard::FilteredOut);
    }

    decode(message.source, &fragments, services).validate()
}
