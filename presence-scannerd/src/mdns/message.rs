use std::net::IpAddr;

/// A resource record as delivered by the discovery engine, already parsed
/// from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Owner name, e.g. "hostA._http._tcp.local."
    pub name: String,
    pub data: RecordData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(IpAddr),
    Aaaa(IpAddr),
    Ptr { target: String },
    Srv { target: String, port: u16 },
    Txt(Vec<(String, String)>),
    /// Any record type the scanner has no use for, by numeric type
    Other(u16),
}

impl Record {
    pub fn new(name: impl Into<String>, data: RecordData) -> Self {
        Self { name: name.into(), data }
    }
}

/// One inbound mDNS message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Address the message arrived from, when the engine knows it
    pub source: Option<IpAddr>,
    pub is_response: bool,
    pub records: Vec<Record>,
}

impl Message {
    pub fn response(source: Option<IpAddr>, records: Vec<Record>) -> Self {
        Self { source, is_response: true, records }
    }
}
