use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

// GET /api/cities?q=
#[derive(Deserialize)]
pub struct CitiesQuery {
    pub q: Option<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CitiesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let q = query.q.unwrap_or_default();
    let q = q.trim();
    if q.is_empty() {
        return Ok(Json(serde_json::json!({ "cities": [] })));
    }

    let cities = {
        let db = state.db.lock().unwrap();
        queries::search_cities(&db, q, 10)?
    };

    let items: Vec<serde_json::Value> = cities
        .iter()
        .map(|c| serde_json::json!({ "name": c.name, "region": c.region }))
        .collect();

    Ok(Json(serde_json::json!({ "cities": items })))
}
