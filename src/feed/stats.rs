use super::normalizer::DropReason;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion counters shared by the feed handler and the writer task.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    malformed: AtomicU64,
    dropped_no_stop: AtomicU64,
    dropped_local_echo: AtomicU64,
    dropped_direct_call: AtomicU64,
    dropped_too_short: AtomicU64,
    queued: AtomicU64,
    backpressure: AtomicU64,
    persisted: AtomicU64,
    persist_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub received: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub queued: u64,
    pub backpressure: u64,
    pub persisted: u64,
    pub persist_failed: u64,
}

impl IngestStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::NoStop => &self.dropped_no_stop,
            DropReason::LocalEcho => &self.dropped_local_echo,
            DropReason::DirectCall => &self.dropped_direct_call,
            DropReason::TooShort => &self.dropped_too_short,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backpressure(&self) {
        self.backpressure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failed(&self) {
        self.persist_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::NoStop => self.dropped_no_stop.load(Ordering::Relaxed),
            DropReason::LocalEcho => self.dropped_local_echo.load(Ordering::Relaxed),
            DropReason::DirectCall => self.dropped_direct_call.load(Ordering::Relaxed),
            DropReason::TooShort => self.dropped_too_short.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            dropped: [
                DropReason::NoStop,
                DropReason::LocalEcho,
                DropReason::DirectCall,
                DropReason::TooShort,
            ]
            .iter()
            .map(|r| self.dropped(*r))
            .sum(),
            queued: self.queued.load(Ordering::Relaxed),
            backpressure: self.backpressure.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
        }
    }
}
