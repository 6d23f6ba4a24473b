use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};
use uuid::Uuid;

use mentor_types::api::{CreateUserRequest, UserResponse};
use mentor_types::models::Role;

use crate::state::AppState;

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    let display_name = req.display_name.trim();
    if display_name.is_empty() || display_name.len() > 64 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let user_id = Uuid::new_v4();

    let db = state.db.clone();
    let uid = user_id.to_string();
    let name = display_name.to_owned();
    tokio::task::spawn_blocking(move || db.create_user(&uid, &name, req.role.as_str()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("failed to create user: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user_id,
            display_name: display_name.to_owned(),
            role: req.role,
            created_at: chrono::Utc::now(),
        }),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.user_by_id(&uid))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("failed to load user {}: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let role = match row.role.as_str() {
        "coach" => Role::Coach,
        "client" => Role::Client,
        other => {
            warn!("Corrupt role '{}' on user '{}'", other, row.id);
            Role::Client
        }
    };

    Ok(Json(UserResponse {
        id: user_id,
        display_name: row.display_name,
        role,
        created_at: parse_created_at(&row.created_at, &row.id),
    }))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert; fall back to the epoch on corrupt data.
pub(crate) fn parse_created_at(raw: &str, record_id: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on record '{}': {}", raw, record_id, e);
            chrono::DateTime::default()
        })
}
