//! Per-message-type handlers for the feed transport
//!
//! The transport dispatches each Socket.IO event to the handler registered
//! for its name. Handlers never wait on persistence: kept records go onto a
//! bounded channel with `try_send`.

use super::envelope::extract_payload;
use super::normalizer::{normalize, CallRecord, DropReason, Normalized};
use super::stats::IngestStats;
use crate::clock::Clock;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// Record accepted and handed to the writer.
    Queued,
    /// Valid event filtered out by the drop rules. Silent.
    Dropped(DropReason),
    /// Envelope or payload failed structural checks. Logged.
    Malformed(String),
    /// Writer channel full or closed; the event is lost.
    Backpressure,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Socket.IO event name this handler subscribes to
    fn event_name(&self) -> &str;

    /// Handle one event's first data argument
    async fn handle(&self, data: Value) -> HandleOutcome;
}

/// Handler for the call-detail (`mqtt`) event
pub struct CallDetailHandler {
    event: String,
    tx: mpsc::Sender<CallRecord>,
    stats: Arc<IngestStats>,
    clock: Clock,
}

impl CallDetailHandler {
    pub fn new(
        event: impl Into<String>,
        tx: mpsc::Sender<CallRecord>,
        stats: Arc<IngestStats>,
        clock: Clock,
    ) -> Self {
        Self {
            event: event.into(),
            tx,
            stats,
            clock,
        }
    }

    /// Envelope → payload → normalized record, without touching the channel.
    pub fn process(&self, data: &Value) -> Result<Normalized, String> {
        let payload = extract_payload(data).map_err(|e| e.to_string())?;
        Ok(normalize(&payload, (self.clock)()))
    }
}

#[async_trait]
impl MessageHandler for CallDetailHandler {
    fn event_name(&self) -> &str {
        &self.event
    }

    async fn handle(&self, data: Value) -> HandleOutcome {
        self.stats.record_received();

        let record = match self.process(&data) {
            Ok(Normalized::Kept(record)) => record,
            Ok(Normalized::Dropped(reason)) => {
                self.stats.record_dropped(reason);
                log::debug!("Ignoring call: {}", reason.as_str());
                return HandleOutcome::Dropped(reason);
            }
            Err(e) => {
                self.stats.record_malformed();
                log::warn!("⚠️  Discarding malformed {} message: {}", self.event, e);
                return HandleOutcome::Malformed(e);
            }
        };

        match self.tx.try_send(record) {
            Ok(()) => {
                self.stats.record_queued();
                HandleOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.stats.record_backpressure();
                log::warn!(
                    "⚠️  Writer channel full, dropping call to {:?} ({}/{})",
                    record.destination_id,
                    self.tx.max_capacity() - self.tx.capacity(),
                    self.tx.max_capacity()
                );
                HandleOutcome::Backpressure
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.record_backpressure();
                log::error!("❌ Writer channel closed, call discarded");
                HandleOutcome::Backpressure
            }
        }
    }
}
