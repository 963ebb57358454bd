mod chat;
mod misc;

use axum::{
    extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::auth::extract_token;
use crate::error::ChatError;
use crate::tenant::ConnectionContext;
use crate::ws::events::{ClientEvent, ServerEvent};
use crate::ws::session::MessagingSession;
use crate::AppState;

/// WebSocket upgrade handler. The handshake runs before the upgrade; a rejected
/// handshake still upgrades so the client gets an `error` frame before the close.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    axum::extract::Query(query): axum::extract::Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let ctx = ConnectionContext::from_parts(&headers, &query, &state.config.tenant_header);
    let token = extract_token(&headers, &query);

    let session = MessagingSession::authenticate(state.clone(), &ctx, token.as_deref()).await;
    if let Err(ref e) = session {
        tracing::warn!("Rejected gateway handshake: {}", e);
    }

    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

async fn handle_socket(socket: WebSocket, session: Result<MessagingSession, ChatError>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let session = match session {
        Ok(s) => Arc::new(s),
        Err(e) => {
            let event = ServerEvent::Error {
                message: e.to_string(),
                details: e.details(),
                temp_id: None,
            };
            if let Ok(text) = serde_json::to_string(&event) {
                let _ = ws_tx.send(Message::Text(text.into())).await;
            }
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Task to forward messages from mpsc to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    if let Err(e) = session.activate(tx).await {
        session.report(e, None).await;
    }

    // Receive loop
    let session_clone = session.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => {
                    let text_str: &str = &text;
                    handle_frame(&session_clone, text_str).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    session.close().await;
}

/// Parses one text frame and handles it. Unparseable frames get an `error` back.
pub async fn handle_frame(session: &MessagingSession, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => handle_client_event(session, event).await,
        Err(e) => {
            session
                .report(ChatError::Validation(format!("Invalid event: {}", e)), None)
                .await;
        }
    }
}

pub async fn handle_client_event(session: &MessagingSession, event: ClientEvent) {
    let temp_id = match &event {
        ClientEvent::SendMessage(send) => send.temp_id.clone(),
        _ => None,
    };

    let result = match session.ensure_active() {
        Err(e) => Err(e),
        Ok(()) => match event {
            ClientEvent::Join { conversation_ids } => misc::join(session, conversation_ids).await,
            ClientEvent::Leave { conversation_id } => misc::leave(session, conversation_id).await,
            ClientEvent::Typing { conversation_id } => {
                chat::typing(session, conversation_id, true).await
            }
            ClientEvent::StopTyping { conversation_id } => {
                chat::typing(session, conversation_id, false).await
            }
            ClientEvent::SendMessage(send) => chat::send_message(session, send).await,
            ClientEvent::EditMessage { message_id, message } => {
                chat::edit_message(session, message_id, message).await
            }
            ClientEvent::DeleteMessage { message_id } => {
                chat::delete_message(session, message_id).await
            }
            ClientEvent::MarkRead {
                conversation_id,
                message_id,
            } => chat::mark_read(session, conversation_id, message_id).await,
            ClientEvent::ChangeStatus { status } => misc::change_status(session, status).await,
            ClientEvent::Ping => Ok(()),
        },
    };

    if let Err(e) = result {
        session.report(e, temp_id).await;
    }
}
