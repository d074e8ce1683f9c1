use std::net::IpAddr;
use shared::protocol::BROWSE_TYPE;
use shared::types::{AttributeMap, ServiceName};
use crate::mdns::{Record, RecordData};
use super::discard::Discard;

/// The part of a record that matters for device discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A/AAAA: an address owned by `name`
    Address { name: String, address: IpAddr },

    /// SRV: `fullname` split into its leading host label and trailing service type
    Service {
        fullname: String,
        hostname: String,
        service: ServiceName,
        port: u16,
    },

    /// TXT: attributes owned by `name`
    Attributes { name: String, attributes: AttributeMap },

    /// PTR: a service type is being advertised
    Announcement { service: ServiceName },
}

/// Extract the discovery-relevant fragment of one record.
///
/// `Ok(None)` means the record is irrelevant; `Err` means it is relevant
/// but unusable, which spoils the whole message.
pub fn classify(record: &Record) -> Result<Option<Fragment>, Discard> {
    let fragment = match &record.data {
        RecordData::A(address) | RecordData::Aaaa(address) => Fragment::Address {
            name: record.name.clone(),
            address: *address,
        },
        RecordData::Srv { port, .. } => {
            let (hostname, service) = split_instance_name(&record.name)?;
            Fragment::Service {
                fullname: record.name.clone(),
                hostname,
                service,
                port: *port,
            }
        }
        RecordData::Txt(pairs) => {
            if pairs.is_empty() {
                return Ok(None);
            }
            // Later pairs overwrite earlier ones with the same key
            let attributes: AttributeMap = pairs.iter().cloned().collect();
            Fragment::Attributes {
                name: record.name.clone(),
                attributes,
            }
        }
        RecordData::Ptr { target } => {
            // Meta-query answers point at the advertised type itself
            let service = if record.name == BROWSE_TYPE {
                target.as_str()
            } else {
                record.name.as_str()
            };
            Fragment::Announcement {
                service: ServiceName::new(service),
            }
        }
        RecordData::Other(_) => return Ok(None),
    };
    Ok(Some(fragment))
}

/// "hostA._http._tcp.local." -> ("hostA", "_http._tcp.local.")
fn split_instance_name(fullname: &str) -> Result<(String, ServiceName), Discard> {
    let malformed = |reason| Discard::Malformed {
        name: fullname.to_string(),
        reason,
    };

    let (host, service) = fullname
        .split_once('.')
        .ok_or_else(|| malformed("no service component"))?;
    if host.is_empty() {
        return Err(malformed("empty host component"));
    }
    if service.is_empty() {
        return Err(malformed("empty service component"));
    }
    Ok((host.to_string(), ServiceName::new(service)))
}
