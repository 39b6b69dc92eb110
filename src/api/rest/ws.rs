use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamMap;
use tracing::{info, warn};

use crate::realtime::{Event, Room};
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
struct ClientMessage {
    action: ClientAction,
    room: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClientAction {
    Join,
    Leave,
}

/// One loop per connection: client frames drive room membership, and events
/// from every joined room are forwarded as JSON text frames. Membership dies
/// with the connection; there is no replay.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    state.metrics.ws_connections.inc();
    info!("websocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut subscriptions: StreamMap<String, BroadcastStream<Event>> = StreamMap::new();

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let Some(Ok(message)) = incoming else { break };
                match message {
                    Message::Text(text) => {
                        apply_client_message(&state, &mut subscriptions, &text);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some((_room, event)) = subscriptions.next(), if !subscriptions.is_empty() => {
                // a lagged receiver just skips the overwritten events
                let Ok(event) = event else { continue };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize event for ws");
                        continue;
                    }
                };

                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let joined: Vec<Room> = subscriptions
        .keys()
        .filter_map(|key| Room::parse(key))
        .collect();
    drop(subscriptions);
    for room in joined {
        state.hub.prune(room);
    }

    state.metrics.ws_connections.dec();
    info!("websocket client disconnected");
}

fn apply_client_message(
    state: &AppState,
    subscriptions: &mut StreamMap<String, BroadcastStream<Event>>,
    text: &str,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "unparseable ws client message");
            return;
        }
    };

    let Some(room) = Room::parse(&message.room) else {
        warn!(room = %message.room, "ws client named an unknown room");
        return;
    };

    match message.action {
        ClientAction::Join => {
            let key = room.to_string();
            if !subscriptions.contains_key(&key) {
                subscriptions.insert(key, BroadcastStream::new(state.hub.subscribe(room)));
                info!(room = %room, "ws client joined room");
            }
        }
        ClientAction::Leave => {
            if subscriptions.remove(&room.to_string()).is_some() {
                state.hub.prune(room);
                info!(room = %room, "ws client left room");
            }
        }
    }
}
