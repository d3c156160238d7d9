//! WebSocket handler for live status updates
//!
//! Every accepted connection becomes a subscriber of the registry. The first
//! subscriber starts the monitor loop; the last one to leave stops it.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tracing::{debug, info};

use crate::{api::state::ApiState, monitor::Subscriber};

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

/// Handle an accepted WebSocket connection
async fn handle_websocket(socket: WebSocket, state: ApiState) {
    let (subscriber, mut updates) = Subscriber::channel();
    let subscriber_id = state.registry.add(subscriber).await;
    info!("WebSocket client connected (subscriber {subscriber_id})");

    state.lifecycle.ensure_loop_running().await;

    let (mut sender, mut receiver) = socket.split();

    // Forward broadcast payloads to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = updates.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Inbound frames carry no meaning; drain until the client goes away
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Ping(_) => debug!("Received ping"),
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    // Already gone if the registry was closed during shutdown
    if let Err(e) = state.registry.remove(subscriber_id).await {
        debug!("{e}");
    }
    state.lifecycle.stop_loop_if_idle().await;

    info!("WebSocket client disconnected (subscriber {subscriber_id})");
}
