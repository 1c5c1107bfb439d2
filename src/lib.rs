//! Brandmeister Last-Heard
//!
//! Ingests the Brandmeister call-detail feed, keeps the last 24 hours in
//! SQLite and serves top-talkgroup and hourly-histogram views to browser
//! subscribers over WebSocket.
//!
//! ```text
//! Socket.IO feed → CallDetailHandler (normalize + drop rules)
//!     ↓ mpsc (try_send, never blocks the feed)
//! ingestion writer → calls table → Hub firehose (broadcast)
//!     ↓ every N appends
//! retention prune
//!
//! subscriber request / 10s timer → AggregationEngine (read pool) → Hub → subscriber
//! ```

pub mod aggregate;
pub mod api;
pub mod clock;
pub mod config;
pub mod feed;
pub mod hub;
pub mod pipeline;
pub mod reference;
pub mod sqlite_pragma;
pub mod store;

pub use clock::{system_clock, Clock};
pub use config::{ConfigError, RuntimeConfig};
