//! Subscriber sessions over a real WebSocket on the `/ws` route

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use lastheard::aggregate::AggregationEngine;
use lastheard::api::{create_router, AppState};
use lastheard::feed::{normalize, StoredCall};
use lastheard::hub::Hub;
use lastheard::store::Database;
use lastheard::system_clock;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const SCHEMA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sql");

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (TempDir, Database, Arc<Hub>, SocketAddr) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("session.db"), SCHEMA_DIR, 2).unwrap();
    let engine = AggregationEngine::new(db.readers(), db.directory(), system_clock());
    let hub = Arc::new(Hub::new(engine));

    let state = AppState {
        hub: hub.clone(),
        directory: db.directory(),
        auth: None,
    };
    let router = create_router(state, "http://localhost:3000");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (dir, db, hub, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    client
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no frame within 5s")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_for_subscribers(hub: &Hub, expected: usize) {
    for _ in 0..100 {
        if hub.subscriber_count() == expected {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {} subscribers, have {}", expected, hub.subscriber_count());
}

#[tokio::test]
async fn test_bad_frame_answered_with_error_and_session_stays_open() {
    let (_dir, db, hub, addr) = start_server().await;
    let mut client = connect(addr).await;

    client.send(Message::Text("not json".into())).await.unwrap();
    let reply = next_event(&mut client).await;
    assert_eq!(reply["event"], "error");
    assert!(reply["data"]["message"].as_str().unwrap().contains("unparsable"));
    assert_eq!(hub.subscriber_count(), 1);

    client
        .send(Message::Text(json!({"event": "getContinents"}).to_string()))
        .await
        .unwrap();
    let reply = next_event(&mut client).await;
    assert_eq!(reply["event"], "continents");
    assert_eq!(reply["data"], json!([]));

    // Live records still reach the same connection
    let payload = json!({"Start": 100, "Stop": 107, "DestinationID": 91});
    let record = normalize(payload.as_object().unwrap(), Utc::now()).kept().unwrap();
    let id = db.calls().append(&record).unwrap();
    assert_eq!(hub.publish(&StoredCall { id, record }), 1);

    let live = next_event(&mut client).await;
    assert_eq!(live["event"], "brandmeisterData");
    assert_eq!(live["data"]["id"], id);
    assert_eq!(live["data"]["duration"], 7.0);
}

#[tokio::test]
async fn test_disconnect_unregisters_subscriber() {
    let (_dir, _db, hub, addr) = start_server().await;

    let mut closing = connect(addr).await;
    let mut dropping = connect(addr).await;
    for client in [&mut closing, &mut dropping] {
        client
            .send(Message::Text(json!({"event": "getContinents"}).to_string()))
            .await
            .unwrap();
        assert_eq!(next_event(client).await["event"], "continents");
    }
    assert_eq!(hub.subscriber_count(), 2);

    closing.close(None).await.unwrap();
    wait_for_subscribers(&hub, 1).await;

    drop(dropping);
    wait_for_subscribers(&hub, 0).await;
}
