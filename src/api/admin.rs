use super::error::ApiError;
use super::AppState;
use crate::store::{run_blocking, TalkgroupEntry, TalkgroupRow};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub auth: bool,
    pub token: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let auth = state
        .auth
        .clone()
        .ok_or_else(|| ApiError::Unavailable("admin access is not configured".to_string()))?;

    // bcrypt verification is CPU-bound
    let check = auth.clone();
    let valid = tokio::task::spawn_blocking(move || check.verify_password(&body.password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if !valid {
        log::warn!("⚠️  Admin login rejected");
        return Err(ApiError::Unauthorized("Invalid password".to_string()));
    }

    let token = auth.issue_token(chrono::Utc::now().timestamp())?;
    log::info!("🔑 Admin login");
    Ok(Json(LoginResponse { auth: true, token }))
}

fn validated(entry: TalkgroupEntry) -> Result<TalkgroupEntry, ApiError> {
    let entry = TalkgroupEntry {
        talkgroup: entry.talkgroup.trim().to_string(),
        country: entry.country.trim().to_string(),
        name: entry.name.trim().to_string(),
    };
    if entry.talkgroup.is_empty() || entry.country.is_empty() || entry.name.is_empty() {
        return Err(ApiError::BadRequest("talkgroup, country and name are required".to_string()));
    }
    Ok(entry)
}

pub async fn list_talkgroups(State(state): State<AppState>) -> Result<Json<Vec<TalkgroupRow>>, ApiError> {
    let directory = state.directory.clone();
    let rows = run_blocking(move || directory.list_talkgroups()).await?;
    Ok(Json(rows))
}

pub async fn create_talkgroup(
    State(state): State<AppState>,
    Json(body): Json<TalkgroupEntry>,
) -> Result<Json<TalkgroupRow>, ApiError> {
    let entry = validated(body)?;
    let directory = state.directory.clone();
    let row = run_blocking(move || directory.create_talkgroup(&entry)).await?;
    log::info!("➕ Talkgroup {} added ({}, {})", row.talkgroup, row.country, row.name);
    Ok(Json(row))
}

pub async fn update_talkgroup(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TalkgroupEntry>,
) -> Result<Json<TalkgroupRow>, ApiError> {
    let entry = validated(body)?;
    let directory = state.directory.clone();
    let row = run_blocking(move || directory.update_talkgroup(id, &entry))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("talkgroup {} not found", id)))?;
    log::info!("✏️  Talkgroup row {} updated", id);
    Ok(Json(row))
}

pub async fn delete_talkgroup(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let directory = state.directory.clone();
    if !run_blocking(move || directory.delete_talkgroup(id)).await? {
        return Err(ApiError::NotFound(format!("talkgroup {} not found", id)));
    }
    log::info!("🗑️  Talkgroup row {} deleted", id);
    Ok(Json(json!({ "message": "Talkgroup deleted successfully" })))
}
