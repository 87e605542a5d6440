//! WebSocket summary push channel.
//!
//! One socket per subscriber. The session's fan-out feeds a
//! [`ChannelListener`]; this handler forwards each summary as a JSON text
//! frame until the client leaves or the session ends.

use std::borrow::Cow;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use navi_models::{SessionId, SummaryMessage};
use navi_pipeline::ChannelListener;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const WS_ENDPOINT: &str = "summary";

/// Application close code for an unknown session.
pub const CLOSE_SESSION_NOT_FOUND: u16 = 4404;
const CLOSE_NORMAL: u16 = 1000;

/// Summary push endpoint.
pub async fn ws_summary(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection(WS_ENDPOINT);

    ws.on_upgrade(move |socket| async move {
        handle_summary_socket(socket, state, SessionId::from(session_id)).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

fn encode(message: &SummaryMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            warn!("Failed to encode push message: {}", e);
            None
        }
    }
}

fn close(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    }))
}

async fn handle_summary_socket(socket: WebSocket, state: AppState, session_id: SessionId) {
    let (ws_sender, mut receiver) = socket.split();

    // Bounded outbound queue so a slow client stalls only its own sender
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);
    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let (listener, mut summaries) = ChannelListener::channel(WS_SEND_BUFFER_SIZE);
    let subscription = match state.registry.subscribe(&session_id, Arc::new(listener)).await {
        Ok(subscription) => subscription,
        Err(e) => {
            debug!(session_id = %session_id, "Rejecting subscription: {}", e);
            let error = SummaryMessage::error("session not found");
            if let Some(msg) = encode(&error) {
                metrics::record_ws_message_sent(WS_ENDPOINT, error.message_type().as_str());
                let _ = tx.send(msg).await;
            }
            let _ = tx
                .send(close(CLOSE_SESSION_NOT_FOUND, "session not found"))
                .await;
            drop(tx);
            let _ = send_task.await;
            return;
        }
    };

    info!(session_id = %session_id, subscription = %subscription, "Summary subscriber connected");

    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
    // The first tick completes immediately
    heartbeat.tick().await;

    loop {
        tokio::select! {
            summary = summaries.recv() => {
                match summary {
                    Some(summary) => {
                        let message = SummaryMessage::summary(&session_id, &summary);
                        let Some(msg) = encode(&message) else {
                            continue;
                        };
                        if tx.send(msg).await.is_err() {
                            warn!(session_id = %session_id, "WebSocket send failed, client disconnected");
                            break;
                        }
                        metrics::record_ws_message_sent(WS_ENDPOINT, message.message_type().as_str());
                    }
                    None => {
                        // Session stopped; its delivery task dropped our listener
                        let _ = tx.send(close(CLOSE_NORMAL, "session ended")).await;
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if tx.send(Message::Ping(Vec::new())).await.is_err() {
                    warn!(session_id = %session_id, "Heartbeat failed, client disconnected");
                    break;
                }
            }
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        info!(session_id = %session_id, "Client closed connection");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.registry.unsubscribe(&session_id, subscription).await;

    drop(tx);
    let _ = send_task.await;
    info!(session_id = %session_id, "Summary subscriber disconnected");
}
