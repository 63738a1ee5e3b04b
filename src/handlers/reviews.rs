use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_user;
use crate::models::review::{validate_comment, validate_rating};
use crate::models::{BookingStatus, Review};
use crate::state::AppState;

// POST /api/reviews
#[derive(Deserialize)]
pub struct CreateReviewRequest {
    #[serde(alias = "reviewedId")]
    pub reviewed_id: String,
    #[serde(default, alias = "postId")]
    pub post_id: Option<String>,
    #[serde(default, alias = "bookingId")]
    pub booking_id: Option<String>,
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateReviewRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    validate_rating(body.rating).map_err(AppError::Validation)?;
    let comment = body
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    validate_comment(comment).map_err(AppError::Validation)?;

    if body.reviewed_id == user_id {
        return Err(AppError::Validation("cannot review yourself".to_string()));
    }

    let mut db = state.db.lock().unwrap();

    if let Some(booking_id) = &body.booking_id {
        let booking = queries::get_booking_by_id(&db, booking_id)?
            .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

        if booking.client_id != user_id {
            return Err(AppError::Forbidden);
        }
        if booking.status != BookingStatus::Completed {
            return Err(AppError::Validation(
                "only completed bookings can be reviewed".to_string(),
            ));
        }
        if queries::has_review_for_booking(&db, booking_id)? {
            return Err(AppError::Validation(
                "this booking has already been reviewed".to_string(),
            ));
        }
    }

    if let Some(post_id) = &body.post_id {
        if queries::has_review_for_pair(&db, &user_id, &body.reviewed_id, post_id)? {
            return Err(AppError::Validation(
                "you have already reviewed this listing".to_string(),
            ));
        }
    }

    let review = Review {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: body.booking_id.clone(),
        post_id: body.post_id.clone(),
        reviewer_id: user_id.clone(),
        reviewed_id: body.reviewed_id.clone(),
        rating: body.rating,
        comment: comment.map(|c| c.to_string()),
        created_at: Utc::now().naive_utc(),
    };

    // Review insert and the booking's move to reviewed are atomic.
    let committed = queries::submit_review(&mut db, &review)?;
    if !committed {
        return Err(AppError::Conflict(
            "booking changed while submitting the review".to_string(),
        ));
    }

    let reviewer_name = queries::get_profile(&db, &user_id)?
        .map(|p| p.full_name)
        .unwrap_or_default();
    queries::insert_activity(
        &db,
        &body.reviewed_id,
        "review_received",
        body.post_id.as_deref(),
        &serde_json::json!({
            "reviewer_name": reviewer_name,
            "rating": body.rating,
            "booking_id": body.booking_id,
        }),
    )?;

    tracing::info!(review_id = %review.id, rating = review.rating, "review submitted");

    Ok(Json(serde_json::json!({
        "success": true,
        "review": { "id": review.id, "rating": review.rating }
    })))
}

// GET /api/reviews?user_id=
#[derive(Deserialize)]
pub struct ReviewsQuery {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct ReviewItem {
    pub id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub reviewer_name: String,
    pub post_title: Option<String>,
    pub created_at: String,
}

pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reviews = {
        let db = state.db.lock().unwrap();
        queries::reviews_for_user(&db, &query.user_id)?
    };

    let items: Vec<ReviewItem> = reviews
        .iter()
        .map(|r| ReviewItem {
            id: r.review.id.clone(),
            rating: r.review.rating,
            comment: r.review.comment.clone(),
            reviewer_name: r.reviewer_name.clone(),
            post_title: r.post_title.clone(),
            created_at: r.review.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();

    Ok(Json(serde_json::json!({ "reviews": items })))
}
