//! WebSocket push channel.
//!
//! Clients join and leave per-route rooms with `subscribe:route` /
//! `unsubscribe:route` messages; the server forwards each `bus:update`
//! event to connections joined to the event's room. The payload is the same
//! `VehicleUpdate` composite the HTTP paths return.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::broadcast::{Broadcaster, RoomMembership};
use crate::models::VehicleUpdate;

#[derive(Clone)]
pub struct WsState {
    pub broadcaster: Broadcaster,
}

/// Client subscription message
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "subscribe:route")]
    SubscribeRoute {
        #[serde(rename = "routeId")]
        route_id: String,
    },
    #[serde(rename = "unsubscribe:route")]
    UnsubscribeRoute {
        #[serde(rename = "routeId")]
        route_id: String,
    },
}

/// Server message sent to clients
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    /// Initial connection acknowledgment
    #[serde(rename = "connected")]
    Connected { message: String },
    /// A vehicle update for a room the connection joined
    #[serde(rename = "bus:update")]
    BusUpdate { payload: VehicleUpdate },
}

enum MembershipCmd {
    Join(String),
    Leave(String),
}

/// WebSocket endpoint for live bus updates
pub async fn ws_bus(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.broadcaster.subscribe();
    let mut membership = RoomMembership::default();

    // Send connected message
    let connected = ServerMessage::Connected {
        message: "Connected to bus updates. Send subscribe:route with a routeId.".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&connected) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Channel to communicate membership changes from receiver task to sender task
    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::channel::<MembershipCmd>(16);

    // Spawn task to forward broadcast events to the WebSocket
    let forward_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        MembershipCmd::Join(route_id) => {
                            membership.join(&route_id);
                        }
                        MembershipCmd::Leave(route_id) => {
                            membership.leave(&route_id);
                        }
                    }
                }
                result = events.recv() => {
                    match result {
                        Ok(event) => {
                            if !membership.contains(&event.room) {
                                continue;
                            }
                            let msg = ServerMessage::BusUpdate {
                                payload: event.payload,
                            };
                            if let Ok(json) = serde_json::to_string(&msg) {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
    });

    // Handle incoming messages from the client
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    let cmd = match client_msg {
                        ClientMessage::SubscribeRoute { route_id } => MembershipCmd::Join(route_id),
                        ClientMessage::UnsubscribeRoute { route_id } => {
                            MembershipCmd::Leave(route_id)
                        }
                    };
                    let _ = cmd_tx.send(cmd).await;
                }
            }
            Ok(Message::Ping(_)) => {
                // Axum answers pongs automatically
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // Cleanup: dropping the task drops room membership with it
    forward_task.abort();
}
