use super::protocol::{ClientRequest, ServerPush};
use super::registry::{Hub, Subscription};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Drive one subscriber connection until either side goes away.
pub async fn serve_subscriber(socket: WebSocket, hub: Arc<Hub>) {
    let Subscription {
        id,
        mut outbound,
        mut firehose,
    } = hub.register();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match ClientRequest::parse(&text) {
                    Ok(request) => {
                        log::debug!("Subscriber {} request: {:?}", id, request);
                        let hub = hub.clone();
                        tokio::spawn(async move {
                            hub.handle_request(id, request).await;
                        });
                    }
                    Err(e) => {
                        log::warn!("⚠️  Subscriber {} sent a bad frame: {}", id, e);
                        hub.push(id, ServerPush::error(e));
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::debug!("Subscriber {} socket error: {}", id, e);
                    break;
                }
            },
            Some(push) = outbound.recv() => {
                let text = match serde_json::to_string(&push) {
                    Ok(text) => text,
                    Err(e) => {
                        log::error!("❌ Failed to serialize push for subscriber {}: {}", id, e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            frame = firehose.recv() => match frame {
                Ok(frame) => {
                    if sink.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    log::warn!("⚠️  Subscriber {} lagging, skipped {} live records", id, missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    hub.unregister(id);
}
