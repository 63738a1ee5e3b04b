use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_user;
use crate::services::moderation;
use crate::state::AppState;

// POST /api/moderate
#[derive(Deserialize)]
pub struct ModerateRequest {
    #[serde(alias = "postId")]
    pub post_id: String,
}

/// Owner-triggered synchronous moderation pass. Blocks on the provider and
/// returns its verdict; only an approved post goes live.
pub async fn moderate_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ModerateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let post = {
        let db = state.db.lock().unwrap();
        let post = queries::get_post_by_id(&db, &body.post_id)?
            .ok_or_else(|| AppError::NotFound("post".to_string()))?;
        if post.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        post
    };

    let input = moderation::moderation_input_for(&post);
    let verdict = state
        .ai
        .moderate(&input)
        .await
        .map_err(|e| AppError::Provider(e.to_string()))?;

    let status = {
        let db = state.db.lock().unwrap();
        moderation::apply_verdict(&db, &post, &verdict)?
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "status": status.as_str(),
        "score": verdict.score,
        "reasons": verdict.reasons,
    })))
}
