use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_admin;
use crate::models::{ModerationStatus, PostStatus};
use crate::state::AppState;

// GET /api/admin/stats
#[derive(Serialize)]
pub struct StatsResponse {
    pub active_posts: i64,
    pub pending_moderation: i64,
    pub open_appeals: i64,
    pub upcoming_bookings: i64,
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, AppError> {
    require_admin(&state, &headers)?;

    let stats = {
        let db = state.db.lock().unwrap();
        queries::get_admin_stats(&db)?
    };

    Ok(Json(StatsResponse {
        active_posts: stats.active_posts,
        pending_moderation: stats.pending_moderation,
        open_appeals: stats.open_appeals,
        upcoming_bookings: stats.upcoming_bookings,
    }))
}

// GET /api/admin/moderation?status=
#[derive(Deserialize)]
pub struct ModerationQueueQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn moderation_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ModerationQueueQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let status = ModerationStatus::parse(query.status.as_deref().unwrap_or("flagged"));
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let posts = {
        let db = state.db.lock().unwrap();
        queries::list_posts_by_moderation_status(&db, status, limit)?
    };

    let items: Vec<serde_json::Value> = posts
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "user_id": p.user_id,
                "title": p.title,
                "description": p.description,
                "city": p.city,
                "status": p.status.as_str(),
                "moderation_status": p.moderation_status.as_str(),
                "moderation_score": p.moderation_score,
                "moderation_reason": p.moderation_reason,
                "appeal_status": p.appeal_status.map(|a| a.as_str()),
                "appeal_message": p.appeal_message,
                "created_at": p.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
        })
        .collect();

    Ok(Json(serde_json::json!({ "posts": items })))
}

// PATCH /api/admin/moderation/:post_id
#[derive(Deserialize)]
pub struct ModerationDecisionRequest {
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn decide_moderation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<ModerationDecisionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let (moderation_status, post_status, log_action) = match body.action.as_str() {
        "approve" => (ModerationStatus::Approved, PostStatus::Active, "admin_approved"),
        "reject" => (ModerationStatus::Rejected, PostStatus::Pending, "admin_rejected"),
        other => {
            return Err(AppError::Validation(format!(
                "action must be approve or reject, got {other}"
            )));
        }
    };

    let db = state.db.lock().unwrap();
    let post = queries::get_post_by_id(&db, &post_id)?
        .ok_or_else(|| AppError::NotFound("post".to_string()))?;

    queries::set_moderation_decision(
        &db,
        &post.id,
        moderation_status,
        post_status,
        body.reason.as_deref(),
    )?;
    queries::insert_moderation_log(
        &db,
        &post.id,
        log_action,
        Some(post.moderation_status.as_str()),
        Some(moderation_status.as_str()),
        body.reason.as_deref(),
    )?;

    tracing::info!(post_id = %post.id, action = log_action, "admin moderation decision");

    Ok(Json(serde_json::json!({
        "success": true,
        "moderation_status": moderation_status.as_str(),
        "status": post_status.as_str(),
    })))
}

// PATCH /api/admin/appeals/:post_id
#[derive(Deserialize)]
pub struct AppealDecisionRequest {
    pub action: String,
}

/// Resolve a user appeal. Approval reinstates the post; rejection is
/// terminal for that appeal.
pub async fn decide_appeal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<AppealDecisionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let approve = match body.action.as_str() {
        "approve" => true,
        "reject" => false,
        other => {
            return Err(AppError::Validation(format!(
                "action must be approve or reject, got {other}"
            )));
        }
    };

    let db = state.db.lock().unwrap();
    let post = queries::get_post_by_id(&db, &post_id)?
        .ok_or_else(|| AppError::NotFound("post".to_string()))?;

    if !post.appeal_status.is_some_and(|a| a.in_flight()) {
        return Err(AppError::Validation(
            "post has no open appeal".to_string(),
        ));
    }

    queries::resolve_appeal(&db, &post.id, approve)?;
    queries::insert_moderation_log(
        &db,
        &post.id,
        if approve { "appeal_approved" } else { "appeal_rejected" },
        Some("appeal_pending"),
        Some(if approve { "approved" } else { "rejected" }),
        None,
    )?;

    tracing::info!(post_id = %post.id, approve, "appeal resolved");

    Ok(Json(serde_json::json!({ "success": true })))
}

// GET /api/admin/moderation/:post_id/logs
pub async fn moderation_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let logs = {
        let db = state.db.lock().unwrap();
        queries::moderation_logs_for_post(&db, &post_id)?
    };

    let items: Vec<serde_json::Value> = logs
        .iter()
        .map(|l| {
            serde_json::json!({
                "id": l.id,
                "action": l.action,
                "previous_status": l.previous_status,
                "new_status": l.new_status,
                "reason": l.reason,
                "created_at": l.created_at,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({ "logs": items })))
}
