// =============================================================================
// CHAT HANDLERS
// =============================================================================
// Support chat over REST and WebSocket.
//
// WebSocket protocol (GET /api/chat/ws?token=...):
// - inbound text frames:  { "message": "...", "userId": "<uuid>"? }
//   `userId` lets an admin answer into a customer's conversation; customers
//   may only write into their own.
// - outbound text frames: { "event": "new-message", "data": ChatMessage }
//                         { "event": "error", "data": { "message": "..." } }
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Json,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::JsonResult;
use crate::auth::{authenticate, AuthUser};
use crate::chat::{MessageKind, MessagePayload, MessagesPayload, SendMessageRequest};
use crate::error::{AppError, AppResult};
use crate::extract::{AppQuery, ValidatedJson};
use crate::models::{ApiResponse, User};
use crate::AppState;

const MAX_MESSAGE_CHARS: usize = 1000;

/// GET /api/chat/messages
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> JsonResult<MessagesPayload> {
    let messages = state.chat.conversation(user.id).await;
    Ok(Json(ApiResponse::ok(MessagesPayload { messages })))
}

/// POST /api/chat/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<SendMessageRequest>,
) -> JsonResult<MessagePayload> {
    let text = body.message.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("Message is required (max 1000 characters)"));
    }

    let message = state
        .chat
        .post(user.id, user.full_name(), text, MessageKind::User)
        .await;
    state.chat.schedule_auto_reply(user.id);

    Ok(Json(ApiResponse::ok(MessagePayload { message })))
}

// =============================================================================
// WEBSOCKET
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    pub token: Option<String>,
}

/// Text frame sent by a client
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub message: String,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct Event<'a, T: Serialize> {
    event: &'static str,
    data: &'a T,
}

#[derive(Debug, Serialize)]
struct ErrorData<'a> {
    message: &'a str,
}

/// Conversation and author role for a frame sent by `sender`
fn route_inbound(sender: &User, frame: &InboundMessage) -> Result<(Uuid, MessageKind), &'static str> {
    let text = frame.message.trim();
    if text.is_empty() || text.chars().count() > MAX_MESSAGE_CHARS {
        return Err("Message is required (max 1000 characters)");
    }

    if sender.is_admin() {
        return Ok((frame.user_id.unwrap_or(sender.id), MessageKind::Admin));
    }
    match frame.user_id {
        Some(target) if target != sender.id => Err("Not authorized"),
        _ => Ok((sender.id, MessageKind::User)),
    }
}

/// GET /api/chat/ws?token=
///
/// Browsers cannot set headers on a WebSocket handshake, so the bearer
/// token travels in the query string.
pub async fn chat_socket(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<SocketParams>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?;
    let user = authenticate(&state, &token).await?;

    Ok(ws.on_upgrade(move |socket| run_socket(state, user, socket)))
}

type Sink = SplitSink<WebSocket, Message>;

async fn run_socket(state: Arc<AppState>, user: User, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let mut updates = state.chat.subscribe(user.id).await;
    tracing::info!(user_id = %user.id, "Chat socket connected");

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(message) => {
                    if send_json(&mut sink, &Event { event: "new-message", data: &message }).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %user.id, skipped, "Chat socket lagged");
                }
                Err(RecvError::Closed) => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if handle_frame(&state, &user, &text, &mut sink).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(user_id = %user.id, error = %err, "Chat socket read failed");
                    break;
                }
            },
        }
    }

    tracing::info!(user_id = %user.id, "Chat socket disconnected");
}

async fn handle_frame(
    state: &AppState,
    user: &User,
    text: &str,
    sink: &mut Sink,
) -> Result<(), axum::Error> {
    let frame: InboundMessage = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => return send_error(sink, "Malformed message").await,
    };

    let (target, kind) = match route_inbound(user, &frame) {
        Ok(route) => route,
        Err(reason) => return send_error(sink, reason).await,
    };

    let message = state
        .chat
        .post(target, user.full_name(), frame.message.trim(), kind)
        .await;

    if kind == MessageKind::User {
        state.chat.schedule_auto_reply(user.id);
    }
    // Answers into someone else's conversation are echoed to the author.
    if target != user.id {
        send_json(sink, &Event { event: "new-message", data: &message }).await?;
    }
    Ok(())
}

async fn send_error(sink: &mut Sink, message: &str) -> Result<(), axum::Error> {
    send_json(sink, &Event { event: "error", data: &ErrorData { message } }).await
}

async fn send_json<T: Serialize>(sink: &mut Sink, value: &T) -> Result<(), axum::Error> {
    match serde_json::to_string(value) {
        Ok(text) => sink.send(Message::Text(text)).await,
        Err(err) => {
            tracing::warn!(error = %err, "Chat event did not serialize");
            Ok(())
        }
    }
}
