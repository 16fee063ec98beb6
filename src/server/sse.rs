//! SSE transport (spec §4.11): fans out outbound `kiosk.command.*` events
//! to connected kiosk clients, and mirrors them plus pending-card snapshots
//! to connected staff consoles.

use crate::executor::kiosk_command::{KioskCommand, KioskCommandSink};
use async_trait::async_trait;
use axum::response::sse::{Event as SseEvent, KeepAlive};
use axum::response::Sse;
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

/// Broadcasts outbound kiosk commands to every connected kiosk SSE stream.
/// `send` never blocks on slow/absent subscribers: `broadcast::Sender::send`
/// only fails when there are zero receivers, which is a normal and silent
/// no-op here (nobody is listening yet).
pub struct KioskBroadcaster {
    tx: broadcast::Sender<KioskCommand>,
}

impl KioskBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KioskCommand> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl KioskCommandSink for KioskBroadcaster {
    async fn send(&self, command: KioskCommand) {
        let _ = self.tx.send(command);
    }
}

/// Staff-facing broadcast payload: either a mirrored kiosk command or a
/// pending-card snapshot (deduplicated against the last serialized JSON
/// string before being sent, per spec §5).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum StaffBroadcastPayload {
    KioskCommand(KioskCommand),
    PendingSnapshot { pending_memory_count: usize, pending_summary_count: usize },
}

pub struct StaffBroadcaster {
    tx: broadcast::Sender<StaffBroadcastPayload>,
    last_serialized: tokio::sync::Mutex<Option<String>>,
}

impl StaffBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx, last_serialized: tokio::sync::Mutex::new(None) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StaffBroadcastPayload> {
        self.tx.subscribe()
    }

    pub async fn publish(&self, payload: StaffBroadcastPayload) {
        let Ok(serialized) = serde_json::to_string(&payload) else { return };
        let mut last = self.last_serialized.lock().await;
        if last.as_deref() == Some(serialized.as_str()) {
            return;
        }
        *last = Some(serialized);
        let _ = self.tx.send(payload);
    }

    pub async fn mirror_kiosk_command(&self, command: KioskCommand) {
        self.publish(StaffBroadcastPayload::KioskCommand(command)).await;
    }
}

/// The executor's single `KioskCommandSink`: fans every command out to the
/// kiosk broadcaster and mirrors a copy to the staff console feed, so staff
/// consoles see what the kiosk is doing without a second dispatch point in
/// the executor itself.
pub struct FanoutKioskSink {
    kiosk: std::sync::Arc<KioskBroadcaster>,
    staff: std::sync::Arc<StaffBroadcaster>,
}

impl FanoutKioskSink {
    pub fn new(kiosk: std::sync::Arc<KioskBroadcaster>, staff: std::sync::Arc<StaffBroadcaster>) -> Self {
        Self { kiosk, staff }
    }
}

#[async_trait]
impl KioskCommandSink for FanoutKioskSink {
    async fn send(&self, command: KioskCommand) {
        self.kiosk.send(command.clone()).await;
        self.staff.mirror_kiosk_command(command).await;
    }
}

fn to_sse_event<T: Serialize>(value: &T) -> Option<SseEvent> {
    serde_json::to_string(value).ok().map(|json| SseEvent::default().data(json))
}

pub fn kiosk_sse_stream(
    rx: broadcast::Receiver<KioskCommand>,
    keepalive_interval_ms: u64,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(command) => to_sse_event(&command).map(Ok),
        Err(_lagged) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_millis(keepalive_interval_ms)).text(": keep-alive"))
}

pub fn staff_sse_stream(
    rx: broadcast::Receiver<StaffBroadcastPayload>,
    keepalive_interval_ms: u64,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(payload) => to_sse_event(&payload).map(Ok),
        Err(_lagged) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_millis(keepalive_interval_ms)).text(": keep-alive"))
}
