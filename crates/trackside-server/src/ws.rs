//! WebSocket push channel

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use trackside_core::broadcast::Broadcaster;

use crate::AppState;

pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let broadcaster = state.supervisor().broadcaster().clone();
    ws.on_upgrade(move |socket| push_samples(socket, broadcaster))
}

/// Forward samples until the observer goes away. Anything the client sends
/// is read and ignored so pings keep the connection alive.
async fn push_samples(socket: WebSocket, broadcaster: Broadcaster) {
    let mut subscription = broadcaster.subscribe();
    let id = subscription.id();
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(observer = %id, "Observer connected");

    loop {
        tokio::select! {
            sample = subscription.recv() => {
                let Some(sample) = sample else { break };
                let text = match serde_json::to_string(&sample) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "Cannot encode sample");
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    broadcaster.unsubscribe(id);
    tracing::info!(observer = %id, "Observer disconnected");
}
