//! Brandmeister feed ingestion: transport, envelope decoding, normalization

pub mod envelope;
pub mod handler;
pub mod normalizer;
pub mod reconnect;
pub mod socketio;
pub mod stats;

pub use envelope::{extract_payload, EnvelopeError};
pub use handler::{CallDetailHandler, HandleOutcome, MessageHandler};
pub use normalizer::{normalize, CallRecord, DropReason, Normalized, StoredCall};
pub use socketio::{FeedClient, TransportError};
pub use stats::{IngestSnapshot, IngestStats};
