use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use mentor_types::api::{ChatResponse, CreateChatRequest};

use crate::state::AppState;
use crate::users::parse_created_at;

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub user_id: Uuid,
}

pub async fn create_chat(
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // A chat needs at least two distinct participants.
    let mut ids: Vec<String> = req.participant_ids.iter().map(Uuid::to_string).collect();
    ids.sort();
    ids.dedup();
    if ids.len() < 2 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let chat_id = Uuid::new_v4();

    let db = state.db.clone();
    let cid = chat_id.to_string();
    tokio::task::spawn_blocking(move || db.create_chat(&cid, &ids))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("failed to create chat: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ChatResponse {
            id: chat_id,
            participant_ids: req.participant_ids,
            created_at: chrono::Utc::now(),
        }),
    ))
}

pub async fn list_chats(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let uid = query.user_id.to_string();

    let (rows, participant_rows) = tokio::task::spawn_blocking(move || {
        let rows = db.chats_for_user(&uid)?;
        let chat_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let participant_rows = db.participants_for_chats(&chat_ids)?;
        Ok::<_, anyhow::Error>((rows, participant_rows))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("failed to list chats for {}: {}", query.user_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    // Group participants by chat_id
    let mut participant_map: HashMap<String, Vec<Uuid>> = HashMap::new();
    for (chat_id, user_id) in &participant_rows {
        if let Ok(uid) = user_id.parse::<Uuid>() {
            participant_map.entry(chat_id.clone()).or_default().push(uid);
        }
    }

    let chats: Vec<ChatResponse> = rows
        .into_iter()
        .map(|row| ChatResponse {
            id: row.id.parse().unwrap_or_else(|e| {
                warn!("Corrupt chat id '{}': {}", row.id, e);
                Uuid::default()
            }),
            participant_ids: participant_map.remove(&row.id).unwrap_or_default(),
            created_at: parse_created_at(&row.created_at, &row.id),
        })
        .collect();

    Ok(Json(chats))
}
