use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Wall-clock source shared by the normalizer and the aggregation engine.
///
/// Tests swap in a fixed clock to get deterministic timestamps and windows.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Clock frozen at `at`.
pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}
