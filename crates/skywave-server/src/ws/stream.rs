//! The single multiplexed subscriber endpoint (spec §6): one socket per
//! client carrying both binary spectrum/audio frames and JSON
//! command/event text frames. Grounded on the teacher's events handler —
//! the simplest of its four per-purpose sockets, and the only one whose
//! shape (register a sender, split the socket, spawn a forwarding task)
//! survives once demodulation is no longer per-client.

use crate::state::{AppState, ClientId};
use axum::{
    extract::connect_info::ConnectInfo,
    extract::ws::{self, Message, WebSocketUpgrade},
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use skywave_core::protocol::{ClientCommand, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;

pub async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> axum::response::Response {
    let Some(ip_guard) = state.try_acquire_ws_ip(addr.ip()) else {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "too many connections from this IP",
        )
            .into_response();
    };
    if state.clients.len() >= state.cfg.limits.subscribers {
        return (StatusCode::TOO_MANY_REQUESTS, "too many subscribers").into_response();
    }
    ws.on_upgrade(move |socket| handle(socket, state, ip_guard))
}

async fn handle(socket: ws::WebSocket, state: Arc<AppState>, _ip_guard: crate::state::WsIpGuard) {
    let client_id: ClientId = state.alloc_client_id();
    tracing::info!(client_id, "subscriber connected");

    let (tx, mut rx) = state.new_client_channel();
    state.clients.insert(client_id, tx);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let initial = ServerEvent::State {
        streaming: true,
        mode: state.cfg.dsp.mode.clone(),
        squelch_threshold: state.cfg.dsp.squelch_threshold_db,
    };
    if ws_sender
        .send(Message::Text(initial.to_json()))
        .await
        .is_err()
    {
        state.clients.remove(&client_id);
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(cmd) => {
                    let _ = state.command_tx.send((client_id, cmd));
                }
                Err(e) => {
                    tracing::warn!(client_id, error = ?e, "dropping unparsable client command");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.clients.remove(&client_id);
    send_task.abort();
    tracing::info!(client_id, "subscriber disconnected");
}
