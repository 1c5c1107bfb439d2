//! Appends and aggregate queries running at the same time on the WAL database

use chrono::Utc;
use lastheard::aggregate::{AggregationEngine, Scope, TimeRange};
use lastheard::clock::system_clock;
use lastheard::feed::CallRecord;
use lastheard::store::Database;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SCHEMA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sql");

fn record(destination_id: i64) -> CallRecord {
    CallRecord {
        timestamp: Utc::now(),
        link_name: None,
        slot: Some(2),
        source_id: Some(2_041_234),
        destination_id: Some(destination_id),
        route: None,
        link_call: None,
        session_type: None,
        source_name: None,
        destination_call: None,
        destination_name: None,
        state: None,
        start: 10.0,
        stop: 13.0,
        rssi: None,
        ber: None,
        reflector_id: None,
        link_type: None,
        call_types: None,
        loss_count: None,
        total_count: None,
        master: None,
        talker_alias: None,
        flag_set: None,
        event: None,
        link_type_name: None,
        context_id: None,
        session_id: None,
        source_call: Some("PA3ABC".to_string()),
        duration: 3.0,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queries_never_fail_during_appends() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("concurrent.db"), SCHEMA_DIR, 3).unwrap();
    let engine = AggregationEngine::new(db.readers(), db.directory(), system_clock());
    let done = Arc::new(AtomicBool::new(false));

    let store = db.calls();
    let writer_done = done.clone();
    let writer = tokio::task::spawn_blocking(move || {
        for i in 0..1000 {
            store.append(&record(91 + (i % 5))).unwrap();
        }
        writer_done.store(true, Ordering::SeqCst);
    });

    let mut readers = Vec::new();
    for _ in 0..3 {
        let engine = engine.clone();
        let done = done.clone();
        readers.push(tokio::spawn(async move {
            let mut queries = 0;
            let mut last_total = 0;
            while !done.load(Ordering::SeqCst) || queries == 0 {
                let rows = engine.top_destinations(TimeRange::Hour1, Scope::All).await.unwrap();
                let total: i64 = rows.iter().map(|r| r.count).sum();
                // Appends only grow the window
                assert!(total >= last_total);
                last_total = total;

                let histogram = engine.hourly_histogram(91, 0).await.unwrap();
                assert_eq!(histogram.len(), 13);
                queries += 1;
            }
            queries
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }

    let rows = engine.top_destinations(TimeRange::Hour1, Scope::All).await.unwrap();
    assert_eq!(rows.iter().map(|r| r.count).sum::<i64>(), 1000);
    assert!(rows.iter().all(|r| r.count == 200));

    // Prune with nothing expired leaves the data alone
    assert_eq!(db.calls().prune(chrono::Duration::hours(24)).unwrap(), 0);
    assert_eq!(db.calls().count().unwrap(), 1000);
}
