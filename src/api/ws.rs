//! WebSocket transport for interview sessions
//!
//! The socket is split: a writer task drains the session's outbound channel
//! while the reader forwards client frames into the session runtime. The
//! session ends when either side finishes.

use super::AppState;
use crate::runtime::{InboundFrame, Outbound, SessionHandle};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

const CLOSE_REASON: &str = "interview complete";

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    client_id: Option<Path<String>>,
    State(state): State<AppState>,
) -> Response {
    let client_id = client_id.map(|Path(id)| id);
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, client_id: Option<String>) {
    let SessionHandle {
        session_id,
        frames,
        mut outbound,
        task,
    } = state.sessions.spawn_session(client_id);
    tracing::info!(session_id = %session_id, "WebSocket connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            let sent = match item {
                Outbound::Message(message) => match message.encode() {
                    Ok(json) => ws_tx.send(Message::Text(json)).await,
                    Err(e) => {
                        tracing::error!(error = %e, kind = message.kind(), "Failed to encode frame");
                        continue;
                    }
                },
                Outbound::Close => {
                    let frame = CloseFrame {
                        code: close_code::NORMAL,
                        reason: CLOSE_REASON.into(),
                    };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    break;
                }
            };
            if sent.is_err() {
                break;
            }
        }
    });

    let reader = async {
        while let Some(message) = ws_rx.next().await {
            let frame = match message {
                Ok(Message::Text(text)) => InboundFrame::Text(text),
                Ok(Message::Binary(_)) => InboundFrame::Binary,
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket read failed");
                    break;
                }
            };
            if frames.send(frame).await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = &mut writer => {}
        () = reader => {}
    }

    // Closing the inbound channel stops the session and discards pending calls
    drop(frames);
    writer.abort();

    match task.await {
        Ok(final_state) => tracing::info!(
            session_id = %session_id,
            phase = final_state.phase.name(),
            turns = final_state.history.len(),
            "WebSocket disconnected"
        ),
        Err(e) => tracing::error!(session_id = %session_id, error = %e, "Session task failed"),
    }
}
