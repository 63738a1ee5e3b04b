use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, BookingContext};
use crate::errors::AppError;
use crate::handlers::{parse_datetime, require_user};
use crate::models::{Booking, BookingStatus};
use crate::services::bookings::{action_for_target, actor_for, transition, Actor, BookingAction};
use crate::services::calendar;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingItem {
    pub id: String,
    pub post_id: String,
    pub post_title: String,
    pub counterpart_id: String,
    pub counterpart_name: String,
    pub scheduled_at: String,
    pub duration_minutes: i32,
    pub status: String,
    pub client_notes: Option<String>,
    pub has_review: bool,
}

impl BookingItem {
    fn from_context(ctx: &BookingContext) -> Self {
        Self {
            id: ctx.booking.id.clone(),
            post_id: ctx.booking.post_id.clone(),
            post_title: ctx.post_title.clone(),
            counterpart_id: ctx.counterpart_id.clone(),
            counterpart_name: ctx.counterpart_name.clone(),
            scheduled_at: ctx.booking.scheduled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            duration_minutes: ctx.booking.duration_minutes,
            status: ctx.booking.status.as_str().to_string(),
            client_notes: ctx.booking.client_notes.clone(),
            has_review: ctx.has_review,
        }
    }
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub view: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Serialize)]
pub struct GridCell {
    pub date: String,
    pub in_month: bool,
    pub dots: Vec<&'static str>,
    pub overflow: usize,
}

#[derive(Serialize)]
pub struct ListBookingsResponse {
    pub view: String,
    pub bookings: Vec<BookingItem>,
    pub awaiting: Vec<BookingItem>,
    pub days: BTreeMap<String, Vec<String>>,
    pub grid: Vec<GridCell>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<ListBookingsResponse>, AppError> {
    let user_id = require_user(&headers)?;

    let view = match query.view.as_deref() {
        None | Some("provider") => "provider",
        Some("client") => "client",
        Some(other) => {
            return Err(AppError::Validation(format!("invalid view: {other}")));
        }
    };
    let as_provider = view == "provider";

    let contexts = {
        let db = state.db.lock().unwrap();
        queries::bookings_for_user(&db, &user_id, as_provider)?
    };

    // Pending bookings only surface as "awaiting action" on the received side.
    let awaiting: Vec<BookingItem> = if as_provider {
        let bookings: Vec<Booking> = contexts.iter().map(|c| c.booking.clone()).collect();
        let pending = calendar::awaiting_action(&bookings);
        pending
            .iter()
            .filter_map(|b| contexts.iter().find(|c| c.booking.id == b.id))
            .map(BookingItem::from_context)
            .collect()
    } else {
        vec![]
    };

    let mut days: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut statuses_by_day: BTreeMap<String, Vec<BookingStatus>> = BTreeMap::new();
    for ctx in &contexts {
        let key = calendar::day_key(&ctx.booking.scheduled_at);
        days.entry(key.clone()).or_default().push(ctx.booking.id.clone());
        statuses_by_day.entry(key).or_default().push(ctx.booking.status);
    }

    let today = Utc::now().naive_utc().date();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!("invalid month: {month}")));
    }

    let grid = calendar::month_grid(year, month)
        .into_iter()
        .map(|cell| {
            let key = cell.date.format("%Y-%m-%d").to_string();
            let indicators = statuses_by_day
                .get(&key)
                .map(|s| calendar::day_indicators(s))
                .unwrap_or(calendar::DayIndicators {
                    dots: vec![],
                    overflow: 0,
                });
            GridCell {
                date: key,
                in_month: cell.in_month,
                dots: indicators.dots,
                overflow: indicators.overflow,
            }
        })
        .collect();

    Ok(Json(ListBookingsResponse {
        view: view.to_string(),
        bookings: contexts.iter().map(BookingItem::from_context).collect(),
        awaiting,
        days,
        grid,
    }))
}

// GET /api/bookings/day, public availability for a provider day
#[derive(Deserialize)]
pub struct DayQuery {
    pub provider_id: String,
    pub date: String,
}

#[derive(Serialize)]
pub struct SlotResponse {
    pub scheduled_at: String,
    pub duration_minutes: i32,
    pub status: String,
}

pub async fn provider_day(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DayQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date: {}", query.date)))?;
    let start = date.and_hms_opt(0, 0, 0).unwrap();
    let end = date.and_hms_opt(23, 59, 59).unwrap();

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::bookings_for_provider_in_range(&db, &query.provider_id, &start, &end)?
    };

    let slots: Vec<SlotResponse> = bookings
        .iter()
        .map(|b| SlotResponse {
            scheduled_at: b.scheduled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            duration_minutes: b.duration_minutes,
            status: b.status.as_str().to_string(),
        })
        .collect();

    Ok(Json(serde_json::json!({ "bookings": slots })))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    #[serde(alias = "postId")]
    pub post_id: String,
    #[serde(alias = "scheduledAt")]
    pub scheduled_at: String,
    #[serde(default, alias = "durationMinutes")]
    pub duration_minutes: Option<i32>,
    #[serde(default, alias = "clientNotes")]
    pub client_notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let scheduled_at = parse_datetime(&body.scheduled_at)?;
    let duration = body.duration_minutes.unwrap_or(60);
    if duration <= 0 {
        return Err(AppError::Validation("duration must be positive".to_string()));
    }

    let db = state.db.lock().unwrap();

    let post = queries::get_post_by_id(&db, &body.post_id)?
        .ok_or_else(|| AppError::NotFound("post".to_string()))?;

    if post.user_id == user_id {
        return Err(AppError::Validation(
            "cannot book your own service".to_string(),
        ));
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        post_id: post.id.clone(),
        provider_id: post.user_id.clone(),
        client_id: user_id.clone(),
        scheduled_at,
        duration_minutes: duration,
        status: BookingStatus::Pending,
        client_notes: body.client_notes.clone(),
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(&db, &booking)?;

    let client_name = queries::get_profile(&db, &user_id)?
        .map(|p| p.full_name)
        .unwrap_or_default();
    queries::insert_activity(
        &db,
        &post.user_id,
        "booking_request",
        Some(&post.id),
        &serde_json::json!({
            "booking_id": booking.id,
            "client_name": client_name,
            "post_title": post.title,
            "scheduled_at": booking.scheduled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }),
    )?;

    tracing::info!(booking_id = %booking.id, post_id = %post.id, "booking created");

    Ok(Json(serde_json::json!({
        "success": true,
        "booking": {
            "id": booking.id,
            "status": booking.status.as_str(),
            "scheduled_at": booking.scheduled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    })))
}

// PATCH /api/bookings
#[derive(Deserialize)]
pub struct UpdateBookingRequest {
    #[serde(alias = "bookingId")]
    pub booking_id: String,
    pub status: String,
}

pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let db = state.db.lock().unwrap();
    let booking = queries::get_booking_by_id(&db, &body.booking_id)?
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

    let actor = actor_for(&booking, &user_id)?;
    let action = action_for_target(booking.status, actor, &body.status)?;
    let new_status = transition(booking.status, actor, action)?;

    let updated =
        queries::update_booking_status_guarded(&db, &booking.id, booking.status, new_status)?;
    if !updated {
        return Err(AppError::Conflict(
            "booking was changed by the other party, reload and retry".to_string(),
        ));
    }

    notify_counterpart(&db, &booking, actor, new_status)?;

    tracing::info!(
        booking_id = %booking.id,
        from = booking.status.as_str(),
        to = new_status.as_str(),
        action = action.as_str(),
        "booking transition"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "booking": { "id": booking.id, "status": new_status.as_str() }
    })))
}

fn notify_counterpart(
    db: &rusqlite::Connection,
    booking: &Booking,
    actor: Actor,
    new_status: BookingStatus,
) -> Result<(), AppError> {
    let recipient = match actor {
        Actor::Provider => &booking.client_id,
        Actor::Client => &booking.provider_id,
    };
    queries::insert_activity(
        db,
        recipient,
        "booking_status_changed",
        Some(&booking.post_id),
        &serde_json::json!({
            "booking_id": booking.id,
            "status": new_status.as_str(),
        }),
    )?;
    Ok(())
}

// POST /api/bookings/bulk
#[derive(Deserialize)]
pub struct BulkUpdateRequest {
    #[serde(alias = "bookingIds")]
    pub booking_ids: Vec<String>,
    pub status: String,
}

#[derive(Serialize)]
pub struct BulkItemResult {
    pub booking_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct BulkUpdateResponse {
    pub results: Vec<BulkItemResult>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Provider-only bulk confirm/reject over pending bookings. Each item runs
/// through the same transition table independently; the response carries a
/// per-booking outcome instead of a single aggregate verdict.
pub async fn bulk_update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BulkUpdateRequest>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    let user_id = require_user(&headers)?;

    if body.booking_ids.is_empty() {
        return Err(AppError::Validation("no bookings selected".to_string()));
    }
    let action = match body.status.as_str() {
        "confirmed" => BookingAction::Confirm,
        "cancelled" => BookingAction::Reject,
        other => {
            return Err(AppError::Validation(format!(
                "bulk action must target confirmed or cancelled, got {other}"
            )));
        }
    };

    let db = state.db.lock().unwrap();
    let mut results = Vec::with_capacity(body.booking_ids.len());

    for booking_id in &body.booking_ids {
        let outcome = bulk_item(&db, booking_id, &user_id, action);
        results.push(match outcome {
            Ok(()) => BulkItemResult {
                booking_id: booking_id.clone(),
                ok: true,
                error: None,
            },
            Err(e) => BulkItemResult {
                booking_id: booking_id.clone(),
                ok: false,
                error: Some(e.to_string()),
            },
        });
    }

    let succeeded = results.iter().filter(|r| r.ok).count();
    let failed = results.len() - succeeded;

    tracing::info!(succeeded, failed, action = action.as_str(), "bulk booking update");

    Ok(Json(BulkUpdateResponse {
        results,
        succeeded,
        failed,
    }))
}

fn bulk_item(
    db: &rusqlite::Connection,
    booking_id: &str,
    user_id: &str,
    action: BookingAction,
) -> Result<(), AppError> {
    let booking = queries::get_booking_by_id(db, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

    if booking.provider_id != user_id {
        return Err(AppError::Forbidden);
    }

    let new_status = transition(booking.status, Actor::Provider, action)?;
    let updated =
        queries::update_booking_status_guarded(db, &booking.id, booking.status, new_status)?;
    if !updated {
        return Err(AppError::Conflict("booking changed concurrently".to_string()));
    }

    notify_counterpart(db, &booking, Actor::Provider, new_status)?;
    Ok(())
}
