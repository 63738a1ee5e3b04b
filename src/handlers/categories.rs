use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_admin;
use crate::models::category::slugify;
use crate::models::Category;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CategoryItem {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub display_order: i64,
}

impl From<&Category> for CategoryItem {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id.clone(),
            parent_id: c.parent_id.clone(),
            name: c.name.clone(),
            slug: c.slug.clone(),
            icon: c.icon.clone(),
            description: c.description.clone(),
            display_order: c.display_order,
        }
    }
}

// GET /api/categories
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let categories = {
        let db = state.db.lock().unwrap();
        queries::list_categories(&db)?
    };
    let items: Vec<CategoryItem> = categories.iter().map(CategoryItem::from).collect();
    Ok(Json(serde_json::json!({ "categories": items })))
}

// POST /api/admin/categories
#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("category name is required".to_string()));
    }
    let slug = match body.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_string(),
        None => slugify(name),
    };
    if slug.is_empty() {
        return Err(AppError::Validation("category slug is required".to_string()));
    }

    let db = state.db.lock().unwrap();

    if let Some(parent_id) = &body.parent_id {
        if queries::get_category(&db, parent_id)?.is_none() {
            return Err(AppError::NotFound("parent category".to_string()));
        }
    }

    let siblings = queries::list_categories(&db)?;
    let display_order = siblings
        .iter()
        .filter(|c| c.parent_id == body.parent_id)
        .map(|c| c.display_order)
        .max()
        .map(|n| n + 1)
        .unwrap_or(0);

    let category = Category {
        id: uuid::Uuid::new_v4().to_string(),
        parent_id: body.parent_id.clone(),
        name: name.to_string(),
        slug,
        icon: body.icon.clone(),
        description: body.description.clone(),
        display_order,
    };
    queries::create_category(&db, &category).map_err(|e| {
        // UNIQUE(parent_id, slug) surfaces as a conflict, not a 500.
        if e.to_string().contains("UNIQUE") {
            AppError::Conflict("a category with this slug already exists here".to_string())
        } else {
            AppError::Internal(e.to_string())
        }
    })?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");

    Ok(Json(serde_json::json!({
        "success": true,
        "category": CategoryItem::from(&category),
    })))
}

// PATCH /api/admin/categories/:id
#[derive(Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateCategoryRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    let mut category = queries::get_category(&db, &id)?
        .ok_or_else(|| AppError::NotFound("category".to_string()))?;

    if let Some(name) = body.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("category name is required".to_string()));
        }
        category.name = name;
    }
    if let Some(slug) = body.slug {
        let slug = slug.trim().to_string();
        if slug.is_empty() {
            return Err(AppError::Validation("category slug is required".to_string()));
        }
        category.slug = slug;
    }
    if let Some(icon) = body.icon {
        category.icon = Some(icon);
    }
    if let Some(description) = body.description {
        category.description = Some(description);
    }

    queries::update_category(&db, &category)?;

    Ok(Json(serde_json::json!({ "success": true })))
}

// DELETE /api/admin/categories/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    if !queries::delete_category(&db, &id)? {
        return Err(AppError::NotFound("category".to_string()));
    }

    tracing::info!(category_id = %id, "category deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}

// POST /api/admin/categories/reorder
#[derive(Deserialize)]
pub struct ReorderRequest {
    #[serde(alias = "categoryId")]
    pub category_id: String,
    #[serde(alias = "newOrder")]
    pub new_order: i64,
}

pub async fn reorder(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ReorderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    if !queries::set_category_order(&db, &body.category_id, body.new_order)? {
        return Err(AppError::NotFound("category".to_string()));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

// PATCH /api/admin/categories/reorder, batch persist after drag-and-drop
#[derive(Deserialize)]
pub struct BatchReorderRequest {
    pub items: Vec<ReorderItem>,
}

#[derive(Deserialize)]
pub struct ReorderItem {
    pub id: String,
    pub display_order: i64,
}

pub async fn reorder_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BatchReorderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    if body.items.is_empty() {
        return Err(AppError::Validation("no items to reorder".to_string()));
    }

    let db = state.db.lock().unwrap();
    let mut updated = 0;
    for item in &body.items {
        if queries::set_category_order(&db, &item.id, item.display_order)? {
            updated += 1;
        }
    }

    Ok(Json(serde_json::json!({ "success": true, "updated": updated })))
}

// POST /api/admin/categories/sort-alphabetically
#[derive(Deserialize)]
pub struct SortAlphabeticallyRequest {
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<String>,
}

pub async fn sort_alphabetically(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SortAlphabeticallyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    let count = queries::sort_categories_alphabetically(&db, body.parent_id.as_deref())?;

    Ok(Json(serde_json::json!({ "success": true, "sorted": count })))
}
