//! Live broadcast hub for dashboard subscribers

pub mod protocol;
pub mod registry;
pub mod session;

pub use protocol::{firehose_frame, ClientRequest, ServerPush};
pub use registry::{Hub, Selection, SubscriberId, Subscription};
pub use session::serve_subscriber;
