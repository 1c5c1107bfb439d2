//! Subscriber registry: selection state, outbound queues, firehose
//!
//! The hub is the only owner of subscriber state. Sessions register on
//! connect and unregister on disconnect; queries that finish after a
//! subscriber left (or changed its selection) are discarded.

use super::protocol::{firehose_frame, ClientRequest, ServerPush};
use crate::aggregate::{AggregationEngine, Scope, TimeRange};
use crate::feed::StoredCall;
use crate::store::{run_blocking, LabeledOption, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{broadcast, mpsc};

pub type SubscriberId = u64;

/// Per-subscriber outbound queue depth.
pub const OUTBOUND_BUFFER: usize = 64;

/// Firehose frames buffered per subscriber before it starts lagging.
pub const FIREHOSE_CAPACITY: usize = 1024;

/// What a subscriber is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Selection {
    #[default]
    None,
    Aggregate {
        range: TimeRange,
        scope: Scope,
    },
    Histogram {
        destination_id: i64,
        tz_offset_minutes: i32,
    },
}

struct Subscriber {
    selection: Selection,
    outbound: mpsc::Sender<ServerPush>,
}

/// Receiving ends handed to a session on registration.
pub struct Subscription {
    pub id: SubscriberId,
    pub outbound: mpsc::Receiver<ServerPush>,
    pub firehose: broadcast::Receiver<Arc<str>>,
}

pub struct Hub {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    firehose: broadcast::Sender<Arc<str>>,
    engine: AggregationEngine,
}

impl Hub {
    pub fn new(engine: AggregationEngine) -> Self {
        let (firehose, _) = broadcast::channel(FIREHOSE_CAPACITY);
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            firehose,
            engine,
        }
    }

    // A panic while holding the lock leaves the map itself intact; keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let firehose = self.firehose.subscribe();

        let mut subscribers = self.write();
        subscribers.insert(
            id,
            Subscriber {
                selection: Selection::None,
                outbound,
            },
        );
        log::info!("👤 Subscriber {} connected ({} active)", id, subscribers.len());
        drop(subscribers);

        Subscription {
            id,
            outbound: outbound_rx,
            firehose,
        }
    }

    pub fn unregister(&self, id: SubscriberId) {
        let mut subscribers = self.write();
        if subscribers.remove(&id).is_some() {
            log::info!("👋 Subscriber {} disconnected ({} active)", id, subscribers.len());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().len()
    }

    /// Fan a freshly persisted record out to every subscriber. Never blocks.
    pub fn publish(&self, call: &StoredCall) -> usize {
        let frame = match firehose_frame(call) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("❌ Failed to serialize call {}: {}", call.id, e);
                return 0;
            }
        };
        // No receivers is not an error here
        self.firehose.send(Arc::from(frame)).unwrap_or(0)
    }

    pub fn selection(&self, id: SubscriberId) -> Option<Selection> {
        self.read().get(&id).map(|sub| sub.selection.clone())
    }

    fn set_selection(&self, id: SubscriberId, selection: Selection) -> bool {
        match self.write().get_mut(&id) {
            Some(sub) => {
                sub.selection = selection;
                true
            }
            None => false,
        }
    }

    /// Queue a push for one subscriber; dropped if its queue is full or gone.
    pub fn push(&self, id: SubscriberId, push: ServerPush) -> bool {
        let Some(sender) = self.read().get(&id).map(|sub| sub.outbound.clone()) else {
            return false;
        };

        match sender.try_send(push) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("⚠️  Subscriber {} outbound queue full, dropping push", id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Run the query a selection stands for.
    pub async fn compute(&self, selection: &Selection) -> Result<Option<ServerPush>, StoreError> {
        match selection {
            Selection::None => Ok(None),
            Selection::Aggregate { range, scope } => {
                let rows = self.engine.top_destinations(*range, scope.clone()).await?;
                Ok(Some(ServerPush::GroupedData(rows)))
            }
            Selection::Histogram {
                destination_id,
                tz_offset_minutes,
            } => {
                let buckets = self
                    .engine
                    .hourly_histogram(*destination_id, *tz_offset_minutes)
                    .await?;
                Ok(Some(ServerPush::TalkgroupHistogram(buckets)))
            }
        }
    }

    /// Recompute and push one subscriber's current selection.
    pub async fn refresh(&self, id: SubscriberId) {
        let Some(selection) = self.selection(id) else {
            return;
        };

        match self.compute(&selection).await {
            Ok(Some(push)) => {
                self.deliver_if_current(id, &selection, push);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("❌ Query failed for subscriber {}: {}", id, e);
                self.push(id, ServerPush::error(format!("query failed: {}", e)));
            }
        }
    }

    /// Recompute every active selection once and push to its subscribers.
    pub async fn refresh_all(&self) -> usize {
        let mut groups: HashMap<Selection, Vec<SubscriberId>> = HashMap::new();
        for (id, sub) in self.read().iter() {
            if sub.selection != Selection::None {
                groups.entry(sub.selection.clone()).or_default().push(*id);
            }
        }

        let mut delivered = 0;
        for (selection, ids) in groups {
            match self.compute(&selection).await {
                Ok(Some(push)) => {
                    for id in ids {
                        if self.deliver_if_current(id, &selection, push.clone()) {
                            delivered += 1;
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("❌ Periodic query failed for {:?}: {}", selection, e);
                    for id in ids {
                        self.push(id, ServerPush::error(format!("query failed: {}", e)));
                    }
                }
            }
        }
        delivered
    }

    fn deliver_if_current(&self, id: SubscriberId, selection: &Selection, push: ServerPush) -> bool {
        if self.selection(id).as_ref() == Some(selection) {
            self.push(id, push)
        } else {
            log::debug!("Discarding stale result for subscriber {}", id);
            false
        }
    }

    pub async fn handle_request(&self, id: SubscriberId, request: ClientRequest) {
        let directory = self.engine.directory().clone();

        let result = match request {
            ClientRequest::GetContinents => run_blocking(move || directory.continents())
                .await
                .map(ServerPush::Continents),
            ClientRequest::GetCountries { continent } => run_blocking(move || directory.countries(&continent))
                .await
                .map(ServerPush::Countries),
            ClientRequest::GetTalkgroups { continent, country } => {
                let scope = Scope::from_selection(continent.as_deref(), country.as_deref());
                run_blocking(move || {
                    let Some(country) = scope.directory_country() else {
                        return Ok(Vec::new());
                    };
                    let options: Vec<LabeledOption> = directory
                        .talkgroups_for_country(country)?
                        .into_iter()
                        .map(|entry| LabeledOption {
                            label: format!("{} - {}", entry.talkgroup, entry.name),
                            value: entry.talkgroup,
                        })
                        .collect();
                    Ok(options)
                })
                .await
                .map(ServerPush::Talkgroups)
            }
            ClientRequest::GetGroupedData {
                time_range,
                continent,
                country,
            } => {
                let scope = Scope::from_selection(continent.as_deref(), country.as_deref());
                if self.set_selection(id, Selection::Aggregate { range: time_range, scope }) {
                    self.refresh(id).await;
                }
                return;
            }
            ClientRequest::GetTalkgroupHistogram {
                talkgroup,
                timezone_offset,
            } => {
                let selection = Selection::Histogram {
                    destination_id: talkgroup,
                    tz_offset_minutes: timezone_offset,
                };
                if self.set_selection(id, selection) {
                    self.refresh(id).await;
                }
                return;
            }
        };

        match result {
            Ok(push) => {
                self.push(id, push);
            }
            Err(e) => {
                log::error!("❌ Directory lookup failed for subscriber {}: {}", id, e);
                self.push(id, ServerPush::error(format!("lookup failed: {}", e)));
            }
        }
    }
}
