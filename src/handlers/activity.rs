use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_user;
use crate::state::AppState;

// GET /api/activity
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let entries = {
        let db = state.db.lock().unwrap();
        queries::activity_for_user(&db, &user_id, 50)?
    };

    let items: Vec<serde_json::Value> = entries
        .iter()
        .map(|e| {
            serde_json::json!({
                "id": e.id,
                "activity_type": e.activity_type,
                "post_id": e.post_id,
                "metadata": e.metadata,
                "created_at": e.created_at,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({ "activity": items })))
}
