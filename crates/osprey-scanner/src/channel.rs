//! Ordered delivery of scan events to consumers.
//!
//! Each scan gets its own channel. The sending half never blocks; the
//! receiving half sees events in exactly the order they were emitted.

use crate::event::ScanEvent;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Create a fresh channel for one scan.
#[must_use]
pub fn event_channel() -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx: Some(tx) }, EventStream { rx })
}

/// Producer side of a scan's event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<ScanEvent>>,
}

impl EventSender {
    /// A sender that discards every event.
    #[must_use]
    pub fn silent() -> Self {
        Self { tx: None }
    }

    /// Whether events go nowhere.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.tx.is_none()
    }

    /// Deliver `event`. Never blocks; a dropped receiver is not an error.
    pub fn emit(&self, event: ScanEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.send(event) {
            trace!(event = e.0.kind(), "event receiver dropped");
        }
    }
}

/// Consumer side of a scan's event channel.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ScanEvent>,
}

impl EventStream {
    /// Next event, or `None` once the producer is gone.
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        self.rx.recv().await
    }

    /// Feed every event to each handler in turn until the terminal event.
    ///
    /// Returns the terminal event, or `None` if the producer went away
    /// without sending one.
    pub async fn dispatch(&mut self, handlers: &mut [&mut dyn EventHandler]) -> Option<ScanEvent> {
        while let Some(event) = self.recv().await {
            for handler in handlers.iter_mut() {
                handler.handle(&event).await;
            }
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }

    /// Drain events up to and including the terminal one.
    pub async fn collect_events(&mut self) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}

impl Stream for EventStream {
    type Item = ScanEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Receives scan events.
#[async_trait]
pub trait EventHandler: Send {
    /// Called once per event, in emission order.
    async fn handle(&mut self, event: &ScanEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

#[async_trait]
impl EventHandler for NullHandler {
    async fn handle(&mut self, _event: &ScanEvent) {}
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

#[async_trait]
impl EventHandler for LogHandler {
    async fn handle(&mut self, event: &ScanEvent) {
        match event {
            ScanEvent::Started => info!("scan started"),
            ScanEvent::Progress { current, total } => debug!(current, total, "scan progress"),
            ScanEvent::PartialResult { site, url, status } => {
                info!(site = %site, url = %url, %status, "account found");
            }
            ScanEvent::Finished { record } => info!(has_record = record.is_some(), "scan finished"),
            ScanEvent::Failed { message } => warn!(%message, "scan failed"),
        }
    }
}
