//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to the session. Accepted actions reach every socket as a pushed
//! `state` message; rejections are answered directly with `error` + `state`.
//! Notices and snapshots from finished generations are pushed as they happen.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, error, instrument, debug, warn};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::ActionReport;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "assist_learning", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "assist_learning", "WebSocket connected");
  let mut updates = state.subscribe();

  let hello = ServerWsMessage::State { state: state.snapshot().await };
  if send_json(&mut socket, &hello).await.is_err() {
    return;
  }

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            // Parse, dispatch, serialize response.
            let replies = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "assist_learning", bytes = txt.len(), "WS message received");
                handle_client_ws(incoming, &state).await
              }
              Err(e) => vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
            };
            let mut failed = false;
            for reply in &replies {
              if let Err(e) = send_json(&mut socket, reply).await {
                error!(target: "assist_learning", error = %e, "WS send error");
                failed = true;
                break;
              }
            }
            if failed {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }

      update = updates.recv() => {
        match update {
          Ok(msg) => {
            if let Err(e) = send_json(&mut socket, &msg).await {
              error!(target: "assist_learning", error = %e, "WS push error");
              break;
            }
          }
          Err(RecvError::Lagged(skipped)) => {
            warn!(target: "assist_learning", skipped, "WS subscriber lagged; resending state");
            let msg = ServerWsMessage::State { state: state.snapshot().await };
            if send_json(&mut socket, &msg).await.is_err() {
              break;
            }
          }
          Err(RecvError::Closed) => break,
        }
      }
    }
  }
  info!(target: "assist_learning", "WebSocket disconnected");
}

/// Accepted actions are answered by the broadcast push (every socket, this one
/// included, receives the new state), so only rejections get a direct reply:
/// the error followed by the unchanged state.
#[instrument(level = "info", skip(state, msg))]
async fn handle_client_ws(msg: ClientWsMessage, state: &Arc<AppState>) -> Vec<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

    ClientWsMessage::GetState => vec![ServerWsMessage::State { state: state.snapshot().await }],

    ClientWsMessage::Navigate(event) => rejection_reply(state.apply(event).await),

    ClientWsMessage::SubmitUpload(body) => {
      let (report, handle) = state.submit_upload(body).await;
      info!(target: "generation", started = handle.is_some(), "WS upload submitted");
      rejection_reply(report)
    }
  }
}

fn rejection_reply(report: ActionReport) -> Vec<ServerWsMessage> {
  match report.rejection {
    Some(r) => {
      debug!(target: "lesson", rejection = %r, "WS action rejected");
      vec![
        ServerWsMessage::Error { message: r.to_string() },
        ServerWsMessage::State { state: report.state },
      ]
    }
    None => Vec::new(),
  }
}
