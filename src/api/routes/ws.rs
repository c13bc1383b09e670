//! `/batchProgressHub` real-time channel (spec.md §6.2), grounded in the
//! teacher's `api::routes::downloads` WebSocket handler shape (split
//! sender/receiver, heartbeat ping interval, `tokio::select!` event loop)
//! but carrying JSON text frames instead of protobuf binary frames — this
//! crate has no `prost`/`bytes` dependency, and spec.md's wire format for
//! this surface is JSON (see DESIGN.md). A subscriber missing two
//! consecutive 30s heartbeat replies is disconnected per spec.md §4.4.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::server::AppState;
use crate::notifier::{ClientMessage, ServerEvent, Subscription, SubscriptionEvent};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new().route("/batchProgressHub", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One forwarding task per joined batch group, so joining/leaving groups at
/// runtime doesn't require re-polling a fixed `tokio::select!` arm list.
/// Each task pushes `ServerEvent`s onto a single shared mpsc channel that
/// the connection's main loop drains alongside client messages and the
/// heartbeat tick.
fn spawn_forwarder(
    mut subscription: Subscription,
    tx: mpsc::UnboundedSender<ServerEvent>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = subscription.recv() => {
                    match event {
                        SubscriptionEvent::Event(e) => {
                            if tx.send(e).is_err() {
                                break;
                            }
                        }
                        SubscriptionEvent::Closed => break,
                    }
                }
            }
        }
    });
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    let connected = ServerEvent::Connected { connection_id: connection_id.clone(), timestamp: chrono::Utc::now() };
    if send_event(&mut sender, &connected).await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let mut joined: HashMap<String, CancellationToken> = HashMap::new();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately; consume it
    // A subscriber that misses two consecutive heartbeat intervals (60s)
    // without replying is considered gone (spec.md §4.4 liveness rule).
    let mut missed_pongs: u32 = 0;

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_client_message(&text, &state, &tx, &mut joined).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            _ = heartbeat.tick() => {
                if missed_pongs >= 2 {
                    tracing::debug!(connection_id = %connection_id, "disconnecting subscriber after two missed pongs");
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                missed_pongs += 1;
            }
        }
    }

    for (_, token) in joined {
        token.cancel();
    }
}

async fn handle_client_message(
    text: &str,
    state: &AppState,
    tx: &mpsc::UnboundedSender<ServerEvent>,
    joined: &mut HashMap<String, CancellationToken>,
) -> bool {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed client message");
            return true;
        }
    };

    match message {
        ClientMessage::JoinBatchGroup { batch_id } => {
            if !joined.contains_key(&batch_id) {
                let cancel = CancellationToken::new();
                let subscription = state.notifier.subscribe(&batch_id);
                spawn_forwarder(subscription, tx.clone(), cancel.clone());
                joined.insert(batch_id.clone(), cancel);
            }
            let _ = tx.send(ServerEvent::JoinedBatchGroup { batch_id });
        }
        ClientMessage::LeaveBatchGroup { batch_id } => {
            if let Some(token) = joined.remove(&batch_id) {
                token.cancel();
            }
            let _ = tx.send(ServerEvent::LeftBatchGroup { batch_id });
        }
        ClientMessage::RequestProgressUpdate { batch_id } => {
            if let Some(snapshot) = state.scheduler.progress(&batch_id).await {
                let _ = tx.send(ServerEvent::ProgressUpdate { snapshot });
            }
        }
        ClientMessage::Ping => {
            let _ = tx.send(ServerEvent::Pong { timestamp: chrono::Utc::now() });
        }
    }
    true
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(event).unwrap_or_default();
    sender.send(Message::Text(payload.into())).await
}
