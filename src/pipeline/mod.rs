//! Runtime tasks: the single writer, retention pruning, periodic broadcast
//!
//! ```text
//! feed handler ──mpsc──▶ start_ingestion ──append──▶ calls
//!                              │ │
//!                              │ └── every N appends ──▶ spawn_prune
//!                              └── publish ──▶ Hub firehose
//!
//! broadcast_scheduler_task ── every 10s ──▶ Hub::refresh_all
//! ```

pub mod ingestion;
pub mod retention;
pub mod scheduler;

pub use ingestion::{start_ingestion, IngestionSettings};
pub use retention::spawn_prune;
pub use scheduler::broadcast_scheduler_task;
