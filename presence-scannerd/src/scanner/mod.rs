//! Device presence tracking on top of mDNS responses.
//!
//! One task owns the device table, the filters and both timers. Callers and
//! the discovery engine talk to it only through [`ScannerHandle`], so every
//! mutation is serialized without locks.

pub mod aggregate;
pub mod classify;
pub mod decode;
pub mod discard;
pub mod filter;
pub mod hash;
pub mod schedule;
pub mod tracker;

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::{DeviceRecord, DeviceSummary, RemovedDevice, ServiceName};
use crate::config::ScannerConfig;
use crate::mdns::Message;
use self::aggregate::aggregate;
use self::decode::decode_message;
use self::discard::Discard;
use self::filter::{ContentFilter, ServiceFilter};
use self::schedule::{QueryScheduler, Tick};
use self::tracker::PresenceTracker;

const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Notifications published by the scanner, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerEvent {
    Discovered(DeviceRecord),
    Updated(DeviceRecord),
    Removed(RemovedDevice),
}

/// Commands sent to the scanner task
#[derive(Debug)]
pub enum ScannerCommand {
    Start(oneshot::Sender<bool>),
    Stop(oneshot::Sender<bool>),
    SetServiceFilter(Vec<ServiceName>, oneshot::Sender<()>),
    AddServiceFilter(ServiceName, oneshot::Sender<()>),
    SetContentFilter(ContentFilter, oneshot::Sender<()>),
    SetRescanPeriod(Duration, oneshot::Sender<()>),
    SetStalenessThreshold(Duration, oneshot::Sender<()>),
    ClearAll(oneshot::Sender<usize>),
    ResetTimeouts(oneshot::Sender<()>),
    Devices(oneshot::Sender<Vec<DeviceSummary>>),
    Response(Message),
    Shutdown,
}

/// Handle to interact with the scanner task
#[derive(Clone)]
pub struct ScannerHandle {
    tx: mpsc::Sender<ScannerCommand>,
    events: broadcast::Sender<ScannerEvent>,
}

impl ScannerHandle {
    /// Spawn the scanner task. Queries go out on `query_tx`; the device
    /// table fingerprint is published on `hash_tx` after every change.
    pub fn spawn(
        config: &ScannerConfig,
        query_tx: mpsc::Sender<ServiceName>,
        hash_tx: watch::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let scanner = Scanner::new(config, query_tx, events.clone(), hash_tx);
        tokio::spawn(scanner.run(rx, cancel));

        Self { tx, events }
    }

    /// Receive every notification published from now on.
    ///
    /// The channel keeps the latest 256 events. A subscriber that falls
    /// further behind gets `RecvError::Lagged` with the number of events it
    /// missed, then resumes from the oldest one still held; a large
    /// `clear_all_devices` can overrun it on its own.
    pub fn subscribe(&self) -> broadcast::Receiver<ScannerEvent> {
        self.events.subscribe()
    }

    /// Start scanning. Returns false if already scanning.
    pub async fn start(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::Start(reply)).await?;
        Ok(rx.await?)
    }

    /// Stop scanning, keeping known devices. Returns false if not scanning.
    pub async fn stop(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::Stop(reply)).await?;
        Ok(rx.await?)
    }

    pub async fn set_service_filter(&self, names: Vec<ServiceName>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::SetServiceFilter(names, reply)).await?;
        Ok(rx.await?)
    }

    pub async fn add_service_filter(&self, name: ServiceName) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::AddServiceFilter(name, reply)).await?;
        Ok(rx.await?)
    }

    pub async fn set_content_filter(&self, filter: ContentFilter) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::SetContentFilter(filter, reply)).await?;
        Ok(rx.await?)
    }

    pub async fn set_rescan_period(&self, period: Duration) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::SetRescanPeriod(period, reply)).await?;
        Ok(rx.await?)
    }

    pub async fn set_staleness_threshold(&self, threshold: Duration) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::SetStalenessThreshold(threshold, reply)).await?;
        Ok(rx.await?)
    }

    /// Remove every device. Returns how many were removed.
    pub async fn clear_all_devices(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::ClearAll(reply)).await?;
        Ok(rx.await?)
    }

    /// Restart every device's silence countdown, e.g. after resuming a scan
    pub async fn reset_all_timeouts(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::ResetTimeouts(reply)).await?;
        Ok(rx.await?)
    }

    /// Snapshot of the present devices, ordered by identity
    pub async fn devices(&self) -> Result<Vec<DeviceSummary>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ScannerCommand::Devices(reply)).await?;
        Ok(rx.await?)
    }

    /// Queue an inbound message from the discovery engine
    pub async fn deliver(&self, message: Message) -> Result<()> {
        self.tx.send(ScannerCommand::Response(message)).await?;
        Ok(())
    }

    /// Stop the scanner task
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(ScannerCommand::Shutdown).await?;
        Ok(())
    }
}

struct Scanner {
    tracker: PresenceTracker,
    services: ServiceFilter,
    content: ContentFilter,
    schedule: QueryScheduler,
    query_tx: mpsc::Sender<ServiceName>,
    events: broadcast::Sender<ScannerEvent>,
    hash_tx: watch::Sender<String>,
}

impl Scanner {
    fn new(
        config: &ScannerConfig,
        query_tx: mpsc::Sender<ServiceName>,
        events: broadcast::Sender<ScannerEvent>,
        hash_tx: watch::Sender<String>,
    ) -> Self {
        Self {
            tracker: PresenceTracker::new(config.staleness()),
            services: config.service_filter(),
            content: config.content_filter(),
            schedule: QueryScheduler::new(config.rescan_period(), config.sweep_period()),
            query_tx,
            events,
            hash_tx,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ScannerCommand>, cancel: CancellationToken) {
        self.publish_hash();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Scanner shutting down");
                    break;
                }

                tick = self.schedule.tick() => match tick {
                    Tick::Query => {
                        let sent = self.schedule.issue_queries(&self.services, &self.query_tx);
                        tracing::trace!("Issued {} queries", sent);
                    }
                    Tick::Sweep => {
                        if self.on_sweep_tick(&mut rx).is_break() {
                            break;
                        }
                    }
                },

                cmd = rx.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle(cmd).is_break() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    }

    fn on_sweep_tick(&mut self, rx: &mut mpsc::Receiver<ScannerCommand>) -> ControlFlow<()> {
        // Responses already queued count as contact made before this sweep
        self.drain(rx)?;
        if self.schedule.is_active() {
            self.sweep();
        }
        ControlFlow::Continue(())
    }

    fn drain(&mut self, rx: &mut mpsc::Receiver<ScannerCommand>) -> ControlFlow<()> {
        for _ in 0..COMMAND_BUFFER {
            match rx.try_recv() {
                Ok(cmd) => self.handle(cmd)?,
                Err(_) => break,
            }
        }
        ControlFlow::Continue(())
    }

    fn handle(&mut self, cmd: ScannerCommand) -> ControlFlow<()> {
        match cmd {
            ScannerCommand::Response(message) => self.on_message(message),
            ScannerCommand::Start(reply) => {
                let started = self.schedule.start();
                if started {
                    tracing::info!("Scan started");
                }
                let _ = reply.send(started);
            }
            ScannerCommand::Stop(reply) => {
                let stopped = self.schedule.stop();
                if stopped {
                    tracing::info!("Scan stopped, keeping {} devices", self.tracker.len());
                }
                let _ = reply.send(stopped);
            }
            ScannerCommand::SetServiceFilter(names, reply) => {
                self.services.set(names);
                let _ = reply.send(());
            }
            ScannerCommand::AddServiceFilter(name, reply) => {
                self.services.add(name);
                let _ = reply.send(());
            }
            ScannerCommand::SetContentFilter(filter, reply) => {
                self.content = filter;
                let _ = reply.send(());
            }
            ScannerCommand::SetRescanPeriod(period, reply) => {
                self.schedule.set_rescan_period(period);
                let _ = reply.send(());
            }
            ScannerCommand::SetStalenessThreshold(threshold, reply) => {
                self.tracker.set_staleness(threshold);
                let _ = reply.send(());
            }
            ScannerCommand::ClearAll(reply) => {
                let removed = self.tracker.clear_all();
                let count = removed.len();
                self.emit_removed(removed);
                let _ = reply.send(count);
            }
            ScannerCommand::ResetTimeouts(reply) => {
                self.tracker.reset_timeouts(now());
                let _ = reply.send(());
            }
            ScannerCommand::Devices(reply) => {
                let _ = reply.send(self.tracker.snapshot());
            }
            ScannerCommand::Shutdown => {
                tracing::info!("Scanner shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn on_message(&mut self, message: Message) {
        let result = if self.schedule.is_active() {
            decode_message(&message, &self.content, &self.services)
                .and_then(|response| aggregate(&response, &mut self.tracker, now()))
        } else {
            Err(Discard::ScannerStopped)
        };

        match result {
            Ok(events) => {
                for event in events {
                    self.emit(event);
                }
                self.publish_hash();
            }
            Err(reason) => {
                tracing::debug!("Discarded response from {:?}: {}", message.source, reason);
            }
        }
    }

    fn sweep(&mut self) {
        let removed = self.tracker.sweep(now());
        self.emit_removed(removed);
    }

    fn emit_removed(&mut self, removed: Vec<RemovedDevice>) {
        if removed.is_empty() {
            return;
        }
        for device in removed {
            tracing::info!(
                "Device {} does not respond anymore | Attached services: {:?}",
                device.identity,
                device.services
            );
            self.emit(ScannerEvent::Removed(device));
        }
        self.publish_hash();
    }

    fn emit(&self, event: ScannerEvent) {
        match &event {
            ScannerEvent::Discovered(record) => {
                tracing::info!(
                    "New device discovered: {} | Service: {} at {}",
                    record.identity,
                    record.service,
                    record.address
                );
            }
            ScannerEvent::Updated(record) => {
                tracing::debug!(
                    "Already known device response: {} | Service: {}",
                    record.identity,
                    record.service
                );
            }
            ScannerEvent::Removed(_) => {}
        }
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn publish_hash(&self) {
        let new_hash = hash::compute_hash(&self.tracker.snapshot());
        self.hash_tx.send_if_modified(|current| {
            if *current == new_hash {
                false
            } else {
                *current = new_hash;
                true
            }
        });
    }
}

/// Current time on the tokio clock, so paused-time tests control it
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time;
    use shared::types::DeviceIdentity;
    use crate::mdns::{Record, RecordData};

    const HTTP: &str = "_http._tcp.local.";

    struct Harness {
        handle: ScannerHandle,
        queries: mpsc::Receiver<ServiceName>,
        events: broadcast::Receiver<ScannerEvent>,
        hash_rx: watch::Receiver<String>,
        _cancel: CancellationToken,
    }

    fn harness() -> Harness {
        let config = ScannerConfig {
            services: vec![HTTP.to_string()],
            ..ScannerConfig::default()
        };
        let (query_tx, queries) = mpsc::channel(64);
        let (hash_tx, hash_rx) = watch::channel(String::new());
        let cancel = CancellationToken::new();
        let handle = ScannerHandle::spawn(&config, query_tx, hash_tx, cancel.clone());
        let events = handle.subscribe();
        Harness {
            handle,
            queries,
            events,
            hash_rx,
            _cancel: cancel,
        }
    }

    fn response(instance: &str, serial: Option<&str>) -> Message {
        let mut records = vec![Record::new(
            instance,
            RecordData::Srv { target: "hostA.local.".to_string(), port: 80 },
        )];
        if let Some(serial) = serial {
            records.push(Record::new(
                instance,
                RecordData::Txt(vec![("serial".to_string(), serial.to_string())]),
            ));
        }
        Message::response(Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))), records)
    }

    fn id(value: &str) -> DeviceIdentity {
        DeviceIdentity::parse(value).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_queries_immediately() {
        let mut h = harness();
        assert!(h.handle.start().await.unwrap());
        assert!(!h.handle.start().await.unwrap());

        let query = h.queries.recv().await.unwrap();
        assert_eq!(query.as_str(), HTTP);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovered_then_updated() {
        let mut h = harness();
        h.handle.start().await.unwrap();

        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        let devices = h.handle.devices().await.unwrap();
        assert_eq!(devices.len(), 1);

        match h.events.recv().await.unwrap() {
            ScannerEvent::Discovered(record) => {
                assert_eq!(record.identity, id("S1"));
                assert_eq!(record.hostname, "hostA");
                assert_eq!(record.port, Some(80));
            }
            other => panic!("expected discovered, got {:?}", other),
        }
        assert!(matches!(h.events.recv().await.unwrap(), ScannerEvent::Updated(_)));
        assert!(!h.hash_rx.borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_dropped_while_stopped() {
        let mut h = harness();

        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        assert!(h.handle.devices().await.unwrap().is_empty());
        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);

        time::advance(Duration::from_secs(30)).await;
        assert!(h.queries.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_serial_changes_nothing() {
        let mut h = harness();
        h.handle.start().await.unwrap();

        h.handle.deliver(response("hostA._http._tcp.local.", None)).await.unwrap();
        assert!(h.handle.devices().await.unwrap().is_empty());
        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_devices() {
        let mut h = harness();
        h.handle.start().await.unwrap();
        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        assert!(h.handle.stop().await.unwrap());
        assert!(!h.handle.stop().await.unwrap());

        // No sweeps while stopped, however long
        time::advance(Duration::from_secs(60)).await;
        assert_eq!(h.handle.devices().await.unwrap().len(), 1);

        assert!(matches!(h.events.recv().await.unwrap(), ScannerEvent::Discovered(_)));
        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_device_removed_once() {
        let mut h = harness();
        h.handle.start().await.unwrap();
        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        assert!(matches!(h.events.recv().await.unwrap(), ScannerEvent::Discovered(_)));

        // Paused time auto-advances until the sweep evicts the device
        match h.events.recv().await.unwrap() {
            ScannerEvent::Removed(removed) => {
                assert_eq!(removed.identity, id("S1"));
                assert!(removed.services.contains(&ServiceName::new(HTTP)));
            }
            other => panic!("expected removed, got {:?}", other),
        }

        time::advance(Duration::from_secs(30)).await;
        assert!(h.handle.devices().await.unwrap().is_empty());
        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_timeouts_after_pause() {
        let mut h = harness();
        h.handle.start().await.unwrap();
        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        h.handle.stop().await.unwrap();

        time::advance(Duration::from_secs(60)).await;
        h.handle.reset_all_timeouts().await.unwrap();
        h.handle.start().await.unwrap();

        // First sweep after resuming is one period away
        time::advance(Duration::from_secs(2)).await;
        assert_eq!(h.handle.devices().await.unwrap().len(), 1);
        assert!(matches!(h.events.recv().await.unwrap(), ScannerEvent::Discovered(_)));
        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_all_devices() {
        let mut h = harness();
        h.handle.start().await.unwrap();
        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        h.handle.deliver(response("hostB._http._tcp.local.", Some("S2"))).await.unwrap();

        assert_eq!(h.handle.clear_all_devices().await.unwrap(), 2);
        assert!(h.handle.devices().await.unwrap().is_empty());

        let mut removed = 0;
        while let Ok(event) = h.events.try_recv() {
            if matches!(event, ScannerEvent::Removed(_)) {
                removed += 1;
            }
        }
        assert_eq!(removed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_filter_changes_apply() {
        let mut h = harness();
        h.handle.start().await.unwrap();

        h.handle.deliver(response("hostA._ssh._tcp.local.", Some("S1"))).await.unwrap();
        assert!(h.handle.devices().await.unwrap().is_empty());

        h.handle.add_service_filter(ServiceName::new("_ssh._tcp.local.")).await.unwrap();
        h.handle.deliver(response("hostA._ssh._tcp.local.", Some("S1"))).await.unwrap();
        assert_eq!(h.handle.devices().await.unwrap().len(), 1);
        assert!(matches!(h.events.recv().await.unwrap(), ScannerEvent::Discovered(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_filter_change_applies() {
        let h = harness();
        h.handle.start().await.unwrap();
        h.handle
            .set_content_filter(ContentFilter::new("victron", filter::MatchScope::Keys))
            .await
            .unwrap();

        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        assert!(h.handle.devices().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_filter_replaced() {
        let mut h = harness();
        h.handle.start().await.unwrap();
        assert_eq!(h.queries.recv().await.unwrap().as_str(), HTTP);

        h.handle
            .set_service_filter(vec![ServiceName::new("_ssh._tcp.local.")])
            .await
            .unwrap();
        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();
        assert!(h.handle.devices().await.unwrap().is_empty());
        h.handle.deliver(response("hostB._ssh._tcp.local.", Some("S2"))).await.unwrap();
        let devices = h.handle.devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].identity, id("S2"));

        assert_eq!(h.queries.recv().await.unwrap().as_str(), "_ssh._tcp.local.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescan_period_change_while_active() {
        let mut h = harness();
        h.handle.start().await.unwrap();
        let started = time::Instant::now();
        h.queries.recv().await.unwrap();

        h.handle.set_rescan_period(Duration::from_secs(10)).await.unwrap();
        h.queries.recv().await.unwrap();
        assert!(time::Instant::now() - started >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_threshold_change_applies() {
        let mut h = harness();
        h.handle.start().await.unwrap();
        let started = time::Instant::now();
        h.handle.set_staleness_threshold(Duration::from_secs(2)).await.unwrap();
        h.handle.deliver(response("hostA._http._tcp.local.", Some("S1"))).await.unwrap();

        assert!(matches!(h.events.recv().await.unwrap(), ScannerEvent::Discovered(_)));
        assert!(matches!(h.events.recv().await.unwrap(), ScannerEvent::Removed(_)));
        assert!(time::Instant::now() - started <= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_subscriber_sees_lag() {
        let mut h = harness();
        h.handle.start().await.unwrap();
        for i in 0..EVENT_BUFFER + 10 {
            let instance = format!("host{}._http._tcp.local.", i);
            let serial = format!("S{}", i);
            h.handle.deliver(response(&instance, Some(serial.as_str()))).await.unwrap();
        }
        assert_eq!(h.handle.devices().await.unwrap().len(), EVENT_BUFFER + 10);

        match h.events.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert_eq!(missed, 10),
            other => panic!("expected lag, got {:?}", other),
        }
        assert!(matches!(h.events.recv().await.unwrap(), ScannerEvent::Discovered(_)));
    }

    fn scanner() -> (Scanner, broadcast::Receiver<ScannerEvent>) {
        let config = ScannerConfig {
            services: vec![HTTP.to_string()],
            ..ScannerConfig::default()
        };
        let (query_tx, _) = mpsc::channel(64);
        let (hash_tx, _) = watch::channel(String::new());
        let (events, rx) = broadcast::channel(EVENT_BUFFER);
        (Scanner::new(&config, query_tx, events, hash_tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_response_counts_before_sweep() {
        let (mut scanner, mut events) = scanner();
        let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
        scanner.schedule.start();
        scanner.on_message(response("hostA._http._tcp.local.", Some("S1")));
        assert!(matches!(events.try_recv().unwrap(), ScannerEvent::Discovered(_)));

        // Past the 10s threshold, with a fresh answer still waiting in the queue
        time::advance(Duration::from_secs(11)).await;
        let answer = response("hostA._http._tcp.local.", Some("S1"));
        tx.try_send(ScannerCommand::Response(answer)).unwrap();
        assert!(scanner.on_sweep_tick(&mut rx).is_continue());

        assert_eq!(scanner.tracker.len(), 1);
        assert!(matches!(events.try_recv().unwrap(), ScannerEvent::Updated(_)));
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);

        // Nothing queued this time
        time::advance(Duration::from_secs(11)).await;
        assert!(scanner.on_sweep_tick(&mut rx).is_continue());
        assert!(scanner.tracker.is_empty());
        assert!(matches!(events.try_recv().unwrap(), ScannerEvent::Removed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_handle() {
        let h = harness();
        h.handle.shutdown().await.unwrap();
        assert!(h.handle.devices().await.is_err());
    }
}
