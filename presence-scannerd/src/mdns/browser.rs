use std::collections::HashMap;
use std::net::IpAddr;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;
use anyhow::{Context, Result};
use shared::protocol::BROWSE_TYPE;
use shared::types::ServiceName;
use crate::config::MdnsConfig;
use crate::scanner::ScannerHandle;
use super::message::{Message, Record, RecordData};

type RecvResult = (usize, flume::Receiver<ServiceEvent>, std::result::Result<ServiceEvent, flume::RecvError>);
type RecvFuture = Pin<Box<dyn Future<Output = RecvResult> + Send>>;

/// The future owns its receiver and hands it back with the event, so the
/// loop can re-arm it. flume::Receiver is Clone (multi-consumer).
fn make_recv_future(idx: usize, rx: flume::Receiver<ServiceEvent>) -> RecvFuture {
    Box::pin(async move {
        let result = rx.recv_async().await;
        (idx, rx, result)
    })
}

/// Starts mdns-sd daemons bound the configured way
#[derive(Debug, Clone, Default)]
pub struct Engine {
    interface: Option<String>,
}

impl Engine {
    pub fn new(config: &MdnsConfig) -> Self {
        Self {
            interface: config.interface.clone(),
        }
    }

    pub fn start(&self) -> Result<ServiceDaemon> {
        let daemon = ServiceDaemon::new().context("Failed to create mDNS daemon")?;
        if let Some(interface) = &self.interface {
            daemon
                .disable_interface(mdns_sd::IfKind::All)
                .context("Failed to disable default interfaces")?;
            daemon
                .enable_interface(interface.as_str())
                .with_context(|| format!("Failed to enable interface {}", interface))?;
        }
        Ok(daemon)
    }
}

fn retire(daemon: Option<ServiceDaemon>) {
    if let Some(daemon) = daemon {
        if let Err(e) = daemon.shutdown() {
            tracing::warn!("Failed to shut down mDNS daemon: {}", e);
        }
    }
}

/// What the browser does with one engine event
#[derive(Debug)]
enum Reaction {
    /// The meta-query named a type not browsed yet this round
    BrowseType(String),
    Deliver(Message),
    Ignore,
    /// Drop the receiver
    Finished,
}

/// Browse receivers of the current query round keyed by service type
struct Browses {
    current: HashMap<String, usize>,
    next_idx: usize,
    futures: FuturesUnordered<RecvFuture>,
}

impl Browses {
    fn new() -> Self {
        Self {
            current: HashMap::new(),
            next_idx: 0,
            futures: FuturesUnordered::new(),
        }
    }

    /// A query for a type already browsed this round starts the next round
    fn opens_round(&self, service_type: &str) -> bool {
        self.current.is_empty() || self.current.contains_key(service_type)
    }

    /// Retire every receiver of the current round
    fn new_round(&mut self) {
        self.current.clear();
    }

    fn browse(&mut self, daemon: &ServiceDaemon, service_type: &str) {
        match daemon.browse(service_type) {
            Ok(receiver) => {
                self.track(service_type, receiver);
            }
            Err(e) => {
                tracing::error!("Failed to browse {}: {}", service_type, e);
            }
        }
    }

    fn track(&mut self, service_type: &str, receiver: flume::Receiver<ServiceEvent>) -> usize {
        let idx = self.next_idx;
        self.next_idx += 1;
        self.current.insert(service_type.to_string(), idx);
        self.futures.push(make_recv_future(idx, receiver));
        idx
    }

    fn is_current(&self, idx: usize) -> bool {
        self.current.values().any(|&live| live == idx)
    }

    fn is_meta(&self, idx: usize) -> bool {
        self.current.get(BROWSE_TYPE) == Some(&idx)
    }

    fn react(&self, idx: usize, event: ServiceEvent) -> Reaction {
        if !self.is_current(idx) {
            tracing::trace!("Receiver {} retired", idx);
            return Reaction::Finished;
        }
        match event {
            // The meta-query only ever reports types, never resolutions
            ServiceEvent::ServiceFound(_, name) if self.is_meta(idx) => {
                if self.current.contains_key(&name) {
                    Reaction::Ignore
                } else {
                    Reaction::BrowseType(name)
                }
            }
            ServiceEvent::ServiceResolved(info) => Reaction::Deliver(message_from_service_info(&info)),
            ServiceEvent::ServiceRemoved(_typ, fullname) => {
                // Presence is decided by silence, not by goodbye packets
                tracing::debug!("Service goodbye: {}", fullname);
                Reaction::Ignore
            }
            ServiceEvent::SearchStopped(ty) => {
                tracing::debug!("Browse stopped for {}", ty);
                Reaction::Finished
            }
            _ => Reaction::Ignore,
        }
    }
}

/// Bridge between the scanner and the mdns-sd engine.
///
/// Queries are grouped into rounds. Each round runs on a freshly started
/// daemon with an empty cache and ends when a type is queried again. A
/// daemon never replays answers it did not receive during its own round, so
/// every resolved service handed to the scanner was answered on the wire
/// since the previous rescan. Types found through the meta-query are browsed
/// within the same round.
pub async fn run_browser(
    engine: Engine,
    mut queries: mpsc::Receiver<ServiceName>,
    scanner: ScannerHandle,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!("Starting mDNS browser");

    let mut browses = Browses::new();
    let mut daemon: Option<ServiceDaemon> = None;

    loop {
        tokio::select! {
            Some(service) = queries.recv() => {
                if browses.opens_round(service.as_str()) {
                    retire(daemon.take());
                    browses.new_round();
                    daemon = match engine.start() {
                        Ok(daemon) => Some(daemon),
                        Err(e) => {
                            tracing::error!("Failed to start query round: {:#}", e);
                            None
                        }
                    };
                }
                if let Some(daemon) = &daemon {
                    browses.browse(daemon, service.as_str());
                }
            }

            Some((idx, rx, result)) = browses.futures.next() => {
                let reaction = match result {
                    Ok(event) => browses.react(idx, event),
                    Err(e) => {
                        if browses.is_current(idx) {
                            tracing::warn!("Receiver {} disconnected: {}", idx, e);
                        }
                        Reaction::Finished
                    }
                };
                match reaction {
                    Reaction::BrowseType(service_type) => {
                        tracing::debug!("Browsing service type {} this round", service_type);
                        if let Some(daemon) = &daemon {
                            browses.browse(daemon, &service_type);
                        }
                        browses.futures.push(make_recv_future(idx, rx));
                    }
                    Reaction::Deliver(message) => {
                        if let Err(e) = scanner.deliver(message).await {
                            tracing::error!("Failed to deliver response: {}", e);
                        }
                        browses.futures.push(make_recv_future(idx, rx));
                    }
                    Reaction::Ignore => {
                        browses.futures.push(make_recv_future(idx, rx));
                    }
                    Reaction::Finished => {}
                }
            }

            _ = cancel.cancelled() => {
                tracing::info!("mDNS browser shutting down");
                break;
            }
        }
    }

    retire(daemon.take());
    Ok(())
}

/// Rebuild the records of the response that resolved `info`: the PTR
/// announcement, the SRV endpoint, its TXT attributes and the host addresses.
pub fn message_from_service_info(info: &ServiceInfo) -> Message {
    let fullname = info.get_fullname();
    let hostname = info.get_hostname();

    let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
    addresses.sort_by_key(|addr| (addr.is_ipv6(), *addr));

    let txt: Vec<(String, String)> = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
        .collect();

    let mut records = vec![
        Record::new(
            info.get_type(),
            RecordData::Ptr { target: fullname.to_string() },
        ),
        Record::new(
            fullname,
            RecordData::Srv { target: hostname.to_string(), port: info.get_port() },
        ),
        Record::new(fullname, RecordData::Txt(txt)),
    ];
    records.extend(addresses.iter().map(|addr| {
        let data = match addr {
            IpAddr::V4(_) => RecordData::A(*addr),
            IpAddr::V6(_) => RecordData::Aaaa(*addr),
        };
        Record::new(hostname, data)
    }));

    Message::response(addresses.first().copied(), records)
}
