//! End-to-end flow without the network: feed handler → writer → store → hub
//!
//! Covers the path a live `mqtt` event takes: envelope decoding and drop
//! rules in the handler, persistence in the writer task, the firehose push,
//! and the aggregate view a subscriber receives afterwards.

use lastheard::aggregate::{AggregationEngine, Scope, TimeRange};
use lastheard::feed::{CallDetailHandler, HandleOutcome, IngestStats, MessageHandler};
use lastheard::hub::{ClientRequest, Hub, ServerPush};
use lastheard::pipeline::{start_ingestion, IngestionSettings};
use lastheard::store::{Database, TalkgroupEntry, GLOBAL_COUNTRY};
use lastheard::system_clock;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

const SCHEMA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sql");

fn envelope(payload: Value) -> Value {
    json!({ "topic": "LH", "payload": payload.to_string() })
}

#[tokio::test]
async fn test_feed_events_reach_store_firehose_and_aggregates() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("lastheard.db"), SCHEMA_DIR, 2).unwrap();
    db.directory()
        .upsert_talkgroup(&TalkgroupEntry {
            talkgroup: "91".to_string(),
            country: GLOBAL_COUNTRY.to_string(),
            name: "Worldwide".to_string(),
        })
        .unwrap();

    let clock = system_clock();
    let engine = AggregationEngine::new(db.readers(), db.directory(), clock.clone());
    let hub = Arc::new(Hub::new(engine.clone()));
    let stats = Arc::new(IngestStats::default());
    let mut subscriber = hub.register();

    let (tx, rx) = mpsc::channel(64);
    let settings = IngestionSettings {
        prune_every_inserts: 100,
        retention: chrono::Duration::hours(24),
        stats_interval: Duration::from_secs(3600),
        clock: clock.clone(),
    };
    let writer = tokio::spawn(start_ingestion(rx, db.calls(), hub.clone(), settings, stats.clone()));
    let handler = CallDetailHandler::new("mqtt", tx, stats.clone(), clock);

    let events = [
        (json!({"Start": 100, "Stop": 105, "DestinationID": 91, "SourceCall": "DL1XYZ"}), HandleOutcome::Queued),
        (json!({"Start": 200, "Stop": 230, "DestinationID": "91"}), HandleOutcome::Queued),
        (json!({"Start": 300, "Stop": 304, "DestinationID": 3100}), HandleOutcome::Queued),
        (json!({"Start": 100, "Stop": 101, "DestinationID": 8}), HandleOutcome::Dropped(lastheard::feed::DropReason::LocalEcho)),
        (json!({"Start": 100, "Stop": 0, "DestinationID": 91}), HandleOutcome::Dropped(lastheard::feed::DropReason::NoStop)),
    ];
    for (payload, expected) in events {
        assert_eq!(handler.handle(envelope(payload)).await, expected);
    }
    assert!(matches!(handler.handle(json!({"payload": "{not json"})).await, HandleOutcome::Malformed(_)));

    // Firehose carries every kept record in arrival order
    for expected in [91, 91, 3100] {
        let frame = timeout(Duration::from_secs(5), subscriber.firehose.recv())
            .await
            .unwrap()
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "brandmeisterData");
        assert_eq!(value["data"]["destinationId"], expected);
    }

    drop(handler);
    writer.await.unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.received, 6);
    assert_eq!(snapshot.persisted, 3);
    assert_eq!(snapshot.dropped, 2);
    assert_eq!(snapshot.malformed, 1);
    assert_eq!(db.calls().count().unwrap(), 3);

    let top = engine.top_destinations(TimeRange::Min5, Scope::All).await.unwrap();
    let ranked: Vec<_> = top.iter().map(|row| (row.destination_id, row.count)).collect();
    assert_eq!(ranked, vec![(Some(91), 2), (Some(3100), 1)]);
    assert_eq!(top[0].total_duration, 35.0);
    assert_eq!(top[0].destination_name.as_deref(), Some("Worldwide"));

    hub.handle_request(
        subscriber.id,
        ClientRequest::GetGroupedData {
            time_range: TimeRange::Min15,
            continent: Some(GLOBAL_COUNTRY.to_string()),
            country: None,
        },
    )
    .await;
    match subscriber.outbound.recv().await {
        Some(ServerPush::GroupedData(rows)) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].destination_id, Some(91));
        }
        other => panic!("unexpected push: {:?}", other),
    }

    hub.handle_request(
        subscriber.id,
        ClientRequest::GetTalkgroupHistogram { talkgroup: 91, timezone_offset: 0 },
    )
    .await;
    match subscriber.outbound.recv().await {
        Some(ServerPush::TalkgroupHistogram(buckets)) => {
            assert_eq!(buckets.len(), 13);
            assert_eq!(buckets.iter().map(|b| b.count).sum::<i64>(), 2);
            // Current hour, or the one before if the clock just rolled over
            assert_eq!(buckets[11].count + buckets[12].count, 2);
        }
        other => panic!("unexpected push: {:?}", other),
    }
}
