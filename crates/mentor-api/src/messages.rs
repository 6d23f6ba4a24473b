use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};
use uuid::Uuid;

use mentor_store::RecordStore;
use mentor_store::models::{MessageRow, NewMessage};
use mentor_types::api::{MessageResponse, SendMessageRequest};
use mentor_types::frames::ServerFrame;
use mentor_types::models::MessageStatus;

use crate::state::AppState;
use crate::users::parse_created_at;

/// REST send path. Unlike the gateway's persist-and-echo (which always
/// stores `sent`), this computes `waiting_for_coach` when the message is
/// addressed to a coach, then pushes the created message to every
/// connected client.
pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let message_id = Uuid::new_v4();

    let db = state.db.clone();
    let cid = chat_id.to_string();
    let aid = req.author_id.to_string();
    let mid = message_id.to_string();
    let content = req.content.clone();

    let status = tokio::task::spawn_blocking(move || {
        let roles = db.chat_partner_roles(&cid, &aid)?;
        let status = status_for_partner_roles(&roles);
        db.insert_message(NewMessage {
            id: mid,
            chat_id: Some(cid),
            author_id: Some(aid),
            content: Some(content),
            status,
        })?;
        Ok::<_, anyhow::Error>(status)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("failed to store message in chat {}: {}", chat_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let now = chrono::Utc::now();

    // Push to all WebSocket clients
    let frame = ServerFrame::Message {
        id: message_id,
        chat_id,
        author_id: req.author_id,
        content: req.content.clone(),
        status,
        reactions: vec![],
        created_at: now,
    };
    state
        .registry
        .broadcast_all(&serde_json::to_string(&frame).unwrap())
        .await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            chat_id,
            author_id: req.author_id,
            content: req.content,
            status,
            reactions: vec![],
            created_at: now,
        }),
    ))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let cid = chat_id.to_string();

    let rows = tokio::task::spawn_blocking(move || db.messages_for_chat(&cid))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("failed to load messages for chat {}: {}", chat_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let messages: Vec<MessageResponse> = rows.into_iter().map(message_response).collect();
    Ok(Json(messages))
}

/// A message whose chat partner is a coach waits for the coach.
fn status_for_partner_roles(roles: &[String]) -> MessageStatus {
    if roles.iter().any(|r| r == "coach") {
        MessageStatus::WaitingForCoach
    } else {
        MessageStatus::Sent
    }
}

fn message_response(row: MessageRow) -> MessageResponse {
    let status = match row.status.as_str() {
        "waiting_for_coach" => MessageStatus::WaitingForCoach,
        "sent" => MessageStatus::Sent,
        other => {
            warn!("Corrupt status '{}' on message '{}'", other, row.id);
            MessageStatus::Sent
        }
    };

    MessageResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        chat_id: row.chat_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt chat_id '{}' on message '{}': {}", row.chat_id, row.id, e);
            Uuid::default()
        }),
        author_id: row.author_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt author_id '{}' on message '{}': {}", row.author_id, row.id, e);
            Uuid::default()
        }),
        content: row.content,
        status,
        reactions: row.reactions,
        created_at: parse_created_at(&row.created_at, &row.id),
    }
}
