use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_admin;
use crate::models::{HomepageSection, SectionType};
use crate::services::sections::validate_config;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SectionItem {
    pub id: String,
    pub section_type: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub visible_on_mobile: bool,
    pub visible_on_desktop: bool,
    pub sort_order: i64,
}

impl From<&HomepageSection> for SectionItem {
    fn from(s: &HomepageSection) -> Self {
        Self {
            id: s.id.clone(),
            section_type: s.section_type.as_str().to_string(),
            title: s.title.clone(),
            subtitle: s.subtitle.clone(),
            config: s.config.clone(),
            is_active: s.is_active,
            visible_on_mobile: s.visible_on_mobile,
            visible_on_desktop: s.visible_on_desktop,
            sort_order: s.sort_order,
        }
    }
}

// GET /api/sections?surface=mobile or desktop, the public homepage feed
#[derive(Deserialize)]
pub struct PublicSectionsQuery {
    pub surface: Option<String>,
}

pub async fn list_public(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicSectionsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let surface = match query.surface.as_deref() {
        None | Some("desktop") => "desktop",
        Some("mobile") => "mobile",
        Some(other) => {
            return Err(AppError::Validation(format!("invalid surface: {other}")));
        }
    };

    let sections = {
        let db = state.db.lock().unwrap();
        queries::list_active_sections(&db, surface)?
    };
    let items: Vec<SectionItem> = sections.iter().map(SectionItem::from).collect();
    Ok(Json(serde_json::json!({ "sections": items })))
}

// GET /api/admin/sections
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let sections = {
        let db = state.db.lock().unwrap();
        queries::list_sections(&db)?
    };
    let items: Vec<SectionItem> = sections.iter().map(SectionItem::from).collect();
    Ok(Json(serde_json::json!({ "sections": items })))
}

// POST /api/admin/sections
#[derive(Deserialize)]
pub struct CreateSectionRequest {
    #[serde(alias = "type")]
    pub section_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub visible_on_mobile: Option<bool>,
    #[serde(default)]
    pub visible_on_desktop: Option<bool>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateSectionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let section_type = SectionType::parse(&body.section_type)
        .ok_or_else(|| AppError::Validation(format!("unknown section type: {}", body.section_type)))?;

    let config = body.config.unwrap_or_else(|| serde_json::json!({}));
    validate_config(section_type, &config).map_err(AppError::Validation)?;

    let db = state.db.lock().unwrap();
    let sort_order = queries::list_sections(&db)?
        .iter()
        .map(|s| s.sort_order)
        .max()
        .map(|n| n + 1)
        .unwrap_or(0);

    let now = Utc::now().naive_utc();
    let section = HomepageSection {
        id: uuid::Uuid::new_v4().to_string(),
        section_type,
        title: body.title.clone(),
        subtitle: body.subtitle.clone(),
        config,
        is_active: body.is_active.unwrap_or(true),
        visible_on_mobile: body.visible_on_mobile.unwrap_or(true),
        visible_on_desktop: body.visible_on_desktop.unwrap_or(true),
        sort_order,
        created_at: now,
        updated_at: now,
    };
    queries::create_section(&db, &section)?;

    tracing::info!(section_id = %section.id, section_type = section_type.as_str(), "section created");

    Ok(Json(serde_json::json!({
        "success": true,
        "section": SectionItem::from(&section),
    })))
}

// PATCH /api/admin/sections/:id
#[derive(Deserialize)]
pub struct UpdateSectionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub visible_on_mobile: Option<bool>,
    #[serde(default)]
    pub visible_on_desktop: Option<bool>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateSectionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    let mut section = queries::get_section(&db, &id)?
        .ok_or_else(|| AppError::NotFound("section".to_string()))?;

    if let Some(config) = body.config {
        validate_config(section.section_type, &config).map_err(AppError::Validation)?;
        section.config = config;
    }
    if let Some(title) = body.title {
        section.title = Some(title);
    }
    if let Some(subtitle) = body.subtitle {
        section.subtitle = Some(subtitle);
    }
    if let Some(is_active) = body.is_active {
        section.is_active = is_active;
    }
    if let Some(visible) = body.visible_on_mobile {
        section.visible_on_mobile = visible;
    }
    if let Some(visible) = body.visible_on_desktop {
        section.visible_on_desktop = visible;
    }

    queries::update_section(&db, &section)?;

    Ok(Json(serde_json::json!({ "success": true })))
}

// DELETE /api/admin/sections/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    if !queries::delete_section(&db, &id)? {
        return Err(AppError::NotFound("section".to_string()));
    }

    tracing::info!(section_id = %id, "section deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}

// PATCH /api/admin/sections/reorder, persist drag-and-drop order
#[derive(Deserialize)]
pub struct ReorderSectionsRequest {
    pub items: Vec<SectionOrderItem>,
}

#[derive(Deserialize)]
pub struct SectionOrderItem {
    pub id: String,
    pub sort_order: i64,
}

pub async fn reorder(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ReorderSectionsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    if body.items.is_empty() {
        return Err(AppError::Validation("no items to reorder".to_string()));
    }

    let db = state.db.lock().unwrap();
    let mut updated = 0;
    for item in &body.items {
        if queries::set_section_order(&db, &item.id, item.sort_order)? {
            updated += 1;
        }
    }

    Ok(Json(serde_json::json!({ "success": true, "updated": updated })))
}
