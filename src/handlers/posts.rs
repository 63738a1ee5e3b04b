use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, PostFilters};
use crate::errors::AppError;
use crate::handlers::require_user;
use crate::models::{ModerationStatus, Post, PostStatus, PostType, PriceType};
use crate::services::ai::{format_vector, EmbeddingInput};
use crate::services::moderation;
use crate::services::outbox::{self, TaskKind};
use crate::services::wizard::{self, ListingDraft};
use crate::state::AppState;

// ── Browse ──

#[derive(Deserialize)]
pub struct BrowseQuery {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub sort: Option<String>,
}

#[derive(Serialize)]
pub struct PostListItem {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub city: String,
    pub district: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub price_type: String,
    pub images: Vec<String>,
    pub created_at: String,
    pub profile: ProfileSummary,
    pub category: Option<CategorySummary>,
}

#[derive(Serialize)]
pub struct ProfileSummary {
    pub full_name: String,
    pub rating: f64,
    pub total_reviews: i64,
}

#[derive(Serialize)]
pub struct CategorySummary {
    pub name: String,
}

// GET /api/posts
pub async fn browse_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = query.limit.unwrap_or(12).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let db = state.db.lock().unwrap();

    // A category filter covers the whole subtree under the matched slug.
    let category_ids = match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(slug) => match queries::category_id_by_slug(&db, slug)? {
            Some(id) => Some(queries::category_subtree_ids(&db, &id)?),
            None => Some(vec![]),
        },
        None => None,
    };

    let filters = PostFilters {
        search: query.search.clone(),
        city: query.city.clone(),
        category_ids,
        post_type: query.post_type.clone(),
        sort: query.sort.clone().unwrap_or_else(|| "newest".to_string()),
        offset,
        limit,
    };

    let (summaries, total) = queries::list_active_posts(&db, &filters)?;

    let posts: Vec<PostListItem> = summaries
        .iter()
        .map(|s| PostListItem {
            id: s.post.id.clone(),
            user_id: s.post.user_id.clone(),
            title: s.post.title.clone(),
            description: s.post.description.clone(),
            post_type: s.post.post_type.as_str().to_string(),
            city: s.post.city.clone(),
            district: s.post.district.clone(),
            price_min: s.post.price_min,
            price_max: s.post.price_max,
            price_type: s.post.price_type.as_str().to_string(),
            images: s.post.images.clone(),
            created_at: s.post.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            profile: ProfileSummary {
                full_name: s.owner_name.clone(),
                rating: s.owner_rating,
                total_reviews: s.owner_total_reviews,
            },
            category: s.category_name.clone().map(|name| CategorySummary { name }),
        })
        .collect();

    Ok(Json(serde_json::json!({
        "posts": posts,
        "has_more": offset + limit < total,
        "total": total,
    })))
}

// GET /api/users/:id/posts
pub async fn user_posts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let posts = {
        let db = state.db.lock().unwrap();
        queries::list_posts_by_user(&db, &user_id, true)?
    };
    Ok(Json(serde_json::json!({ "posts": post_views(&posts) })))
}

// GET /api/my-posts
pub async fn my_posts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;
    let posts = {
        let db = state.db.lock().unwrap();
        queries::list_posts_by_user(&db, &user_id, false)?
    };
    Ok(Json(serde_json::json!({ "posts": post_views(&posts) })))
}

fn post_views(posts: &[Post]) -> Vec<serde_json::Value> {
    posts
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "title": p.title,
                "description": p.description,
                "type": p.post_type.as_str(),
                "city": p.city,
                "status": p.status.as_str(),
                "moderation_status": p.moderation_status.as_str(),
                "appeal_status": p.appeal_status.map(|a| a.as_str()),
                "images": p.images,
                "price_min": p.price_min,
                "price_max": p.price_max,
                "price_type": p.price_type.as_str(),
                "phone_clicks": p.phone_clicks,
                "expires_at": p.expires_at.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
                "created_at": p.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
        })
        .collect()
}

// ── Creation ──

#[derive(Deserialize)]
pub struct CreatePostRequest {
    #[serde(flatten)]
    pub draft: ListingDraft,
    #[serde(rename = "type", default)]
    pub post_type: Option<String>,
}

/// Final submit of the listing wizard. The same step validators the UI ran
/// are re-run here, then the post goes in as pending/checking, the
/// embedding task is queued, and the moderation provider gets the last
/// word on what the submitter sees.
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreatePostRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    if let Some(step) = wizard::first_invalid_step(&body.draft) {
        return Err(AppError::Validation(format!(
            "listing is incomplete at step {step}"
        )));
    }

    let draft = &body.draft;
    let price = draft.price.as_deref().and_then(wizard::parse_price);
    let price_type = PriceType::parse(&draft.price_type);
    let now = Utc::now().naive_utc();

    let post = Post {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.clone(),
        title: draft.title.trim().to_string(),
        description: draft.description.trim().to_string(),
        category_id: draft.category_id.clone(),
        post_type: PostType::parse(body.post_type.as_deref().unwrap_or("offer")),
        city: draft.city.trim().to_string(),
        district: draft.district.clone(),
        price_min: if price_type == PriceType::Free { None } else { price },
        price_max: None,
        price_type,
        images: draft.images.clone(),
        phone_clicks: 0,
        expires_at: Some(now + Duration::days(state.config.post_lifetime_days)),
        status: PostStatus::Pending,
        moderation_status: ModerationStatus::Checking,
        moderation_score: None,
        moderation_reason: None,
        moderated_at: None,
        appeal_status: None,
        appeal_message: None,
        appealed_at: None,
        embedding: None,
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db.lock().unwrap();

        if let Some(category_id) = &post.category_id {
            if queries::get_category(&db, category_id)?.is_none() {
                return Err(AppError::Validation(format!(
                    "unknown category: {category_id}"
                )));
            }
        }

        queries::create_post(&db, &post)?;

        // Embedding generation never blocks submission.
        if let Err(e) = outbox::enqueue(&db, TaskKind::GenerateEmbedding, &post.id) {
            tracing::warn!(post_id = %post.id, error = %e, "failed to enqueue embedding task");
        }
    }

    tracing::info!(post_id = %post.id, "post created, running moderation");

    // Synchronous moderation decides the post-submit messaging.
    let input = moderation::moderation_input_for(&post);
    match state.ai.moderate(&input).await {
        Ok(verdict) => {
            let db = state.db.lock().unwrap();
            let status = moderation::apply_verdict(&db, &post, &verdict)?;
            Ok(Json(serde_json::json!({
                "success": true,
                "post_id": post.id,
                "moderation": {
                    "status": status.as_str(),
                    "reasons": verdict.reasons,
                }
            })))
        }
        Err(e) => {
            tracing::warn!(post_id = %post.id, error = %e, "moderation call failed, queueing retry");
            let db = state.db.lock().unwrap();
            if let Err(enqueue_err) = outbox::enqueue(&db, TaskKind::ModeratePost, &post.id) {
                tracing::warn!(post_id = %post.id, error = %enqueue_err, "failed to enqueue moderation retry");
            }
            Ok(Json(serde_json::json!({
                "success": true,
                "post_id": post.id,
                "moderation": { "status": "checking", "reasons": [] }
            })))
        }
    }
}

// ── Status / appeal / deletion ──

fn owned_post(
    db: &rusqlite::Connection,
    post_id: &str,
    user_id: &str,
) -> Result<Post, AppError> {
    let post = queries::get_post_by_id(db, post_id)?
        .ok_or_else(|| AppError::NotFound("post".to_string()))?;
    if post.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(post)
}

// PATCH /api/posts/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let db = state.db.lock().unwrap();
    let post = owned_post(&db, &post_id, &user_id)?;

    match body.status.as_str() {
        // Reactivation re-enters moderation; the status pair moves in one
        // statement and the re-check is queued, not fired blind.
        "active" => {
            queries::reactivate_post(&db, &post.id)?;
            queries::insert_moderation_log(
                &db,
                &post.id,
                "reactivation_check",
                Some(post.status.as_str()),
                Some("checking"),
                None,
            )?;
            if let Err(e) = outbox::enqueue(&db, TaskKind::ModeratePost, &post.id) {
                tracing::warn!(post_id = %post.id, error = %e, "failed to enqueue moderation re-check");
            }
            Ok(Json(serde_json::json!({
                "success": true,
                "status": "pending",
                "moderation_status": "checking",
            })))
        }
        "closed" | "completed" => {
            let status = PostStatus::parse(&body.status);
            queries::update_post_status(&db, &post.id, status)?;
            Ok(Json(serde_json::json!({
                "success": true,
                "status": status.as_str(),
            })))
        }
        other => Err(AppError::Validation(format!("invalid status: {other}"))),
    }
}

// POST /api/posts/:id/appeal
#[derive(Deserialize)]
pub struct AppealRequest {
    pub message: String,
}

pub async fn appeal_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<AppealRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("appeal message is required".to_string()));
    }

    let db = state.db.lock().unwrap();
    let post = owned_post(&db, &post_id, &user_id)?;

    if post.moderation_status != ModerationStatus::Rejected {
        return Err(AppError::Validation(
            "only rejected listings can be appealed".to_string(),
        ));
    }
    if post.appeal_status.is_some_and(|a| a.in_flight()) {
        return Err(AppError::Validation(
            "an appeal is already in progress".to_string(),
        ));
    }

    queries::set_appeal(&db, &post.id, message)?;
    queries::insert_moderation_log(
        &db,
        &post.id,
        "appeal_submitted",
        Some("rejected"),
        Some("appeal_pending"),
        Some(message),
    )?;

    tracing::info!(post_id = %post.id, "appeal submitted");

    Ok(Json(serde_json::json!({ "success": true })))
}

// DELETE /api/posts/:id
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let db = state.db.lock().unwrap();
    let post = owned_post(&db, &post_id, &user_id)?;
    queries::delete_post(&db, &post.id)?;

    tracing::info!(post_id = %post.id, "post deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}

// POST /api/posts/:id/extend
pub async fn extend_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let db = state.db.lock().unwrap();
    let post = owned_post(&db, &post_id, &user_id)?;

    let expires_at = Utc::now().naive_utc() + Duration::days(state.config.post_lifetime_days);
    queries::extend_post_expiry(&db, &post.id, &expires_at)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "expires_at": expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    })))
}

// POST /api/posts/:id/phone-click
pub async fn phone_click(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    if !queries::increment_phone_clicks(&db, &post_id)? {
        return Err(AppError::NotFound("post".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

// ── AI-assisted endpoints ──

// POST /api/posts/suggest-category
#[derive(Deserialize)]
pub struct SuggestCategoryRequest {
    pub title: String,
    pub description: String,
}

pub async fn suggest_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SuggestCategoryRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_user(&headers)?;

    if body.title.trim().is_empty() && body.description.trim().is_empty() {
        return Err(AppError::Validation(
            "title or description is required".to_string(),
        ));
    }

    let path = state
        .ai
        .suggest_category(&body.title, &body.description)
        .await
        .map_err(|e| AppError::Provider(e.to_string()))?;

    // Walk the suggested slug path down the stored tree; unknown tails are
    // dropped rather than failing the suggestion.
    let categories = {
        let db = state.db.lock().unwrap();
        queries::list_categories(&db)?
    };

    let mut parent: Option<String> = None;
    let mut resolved: Vec<serde_json::Value> = vec![];
    for slug in &path {
        let found = categories
            .iter()
            .find(|c| c.slug == *slug && c.parent_id == parent);
        match found {
            Some(category) => {
                resolved.push(serde_json::json!({
                    "id": category.id,
                    "slug": category.slug,
                    "name": category.name,
                }));
                parent = Some(category.id.clone());
            }
            None => break,
        }
    }

    Ok(Json(serde_json::json!({
        "path": path,
        "resolved": resolved,
        "category_id": parent,
    })))
}

// POST /api/posts/:id/embedding
pub async fn generate_embedding(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let post = {
        let db = state.db.lock().unwrap();
        owned_post(&db, &post_id, &user_id)?
    };

    let input = EmbeddingInput {
        title: post.title.clone(),
        description: post.description.clone(),
        category: post.category_id.clone(),
        city: post.city.clone(),
    };
    let values = state
        .ai
        .embed(&input)
        .await
        .map_err(|e| AppError::Provider(e.to_string()))?;

    let db = state.db.lock().unwrap();
    queries::set_post_embedding(&db, &post.id, &format_vector(&values))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "dimensions": values.len(),
    })))
}
