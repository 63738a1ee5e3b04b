pub mod activity;
pub mod admin;
pub mod bookings;
pub mod categories;
pub mod cities;
pub mod health;
pub mod moderate;
pub mod posts;
pub mod reviews;
pub mod sections;

use axum::http::HeaderMap;
use chrono::NaiveDateTime;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

/// Identity arrives from the upstream auth layer as a trusted header;
/// session handling itself lives outside this service.
pub fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(AppError::Unauthorized)
}

/// Admin surfaces accept the service bearer token or a profile with the
/// admin role.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if !token.is_empty() && token == state.config.admin_token {
        return Ok(());
    }

    if let Ok(user_id) = require_user(headers) {
        let db = state.db.lock().unwrap();
        if let Some(profile) = queries::get_profile(&db, &user_id)? {
            if profile.is_admin() {
                return Ok(());
            }
        }
    }

    Err(AppError::Unauthorized)
}

/// Accepts the storage format and the common ISO variant.
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .map_err(|_| AppError::Validation(format!("invalid datetime: {raw}")))
}
