use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const MAX_COMMENT_LEN: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub booking_id: Option<String>,
    pub post_id: Option<String>,
    pub reviewer_id: String,
    pub reviewed_id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Client-side and server-side share the same rating contract.
pub fn validate_rating(rating: i32) -> Result<(), String> {
    if !(1..=5).contains(&rating) {
        return Err("rating must be between 1 and 5".to_string());
    }
    Ok(())
}

pub fn validate_comment(comment: Option<&str>) -> Result<(), String> {
    if let Some(c) = comment {
        if c.chars().count() > MAX_COMMENT_LEN {
            return Err(format!("comment must be at most {MAX_COMMENT_LEN} characters"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
    }

    #[test]
    fn test_comment_length() {
        assert!(validate_comment(None).is_ok());
        assert!(validate_comment(Some("Great work")).is_ok());
        let long = "x".repeat(501);
        assert!(validate_comment(Some(&long)).is_err());
        let exactly = "x".repeat(500);
        assert!(validate_comment(Some(&exactly)).is_ok());
    }
}
