use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub category_id: Option<String>,
    pub post_type: PostType,
    pub city: String,
    pub district: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub price_type: PriceType,
    pub images: Vec<String>,
    pub phone_clicks: i64,
    pub expires_at: Option<NaiveDateTime>,
    pub status: PostStatus,
    pub moderation_status: ModerationStatus,
    pub moderation_score: Option<f64>,
    pub moderation_reason: Option<String>,
    pub moderated_at: Option<NaiveDateTime>,
    pub appeal_status: Option<AppealStatus>,
    pub appeal_message: Option<String>,
    pub appealed_at: Option<NaiveDateTime>,
    pub embedding: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Operational visibility state, independent of moderation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Pending,
    Closed,
    Completed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Pending => "pending",
            PostStatus::Closed => "closed",
            PostStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => PostStatus::Active,
            "closed" => PostStatus::Closed,
            "completed" => PostStatus::Completed,
            _ => PostStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Checking,
    Approved,
    Rejected,
    Flagged,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Checking => "checking",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
            ModerationStatus::Flagged => "flagged",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "checking" => ModerationStatus::Checking,
            "approved" => ModerationStatus::Approved,
            "rejected" => ModerationStatus::Rejected,
            "flagged" => ModerationStatus::Flagged,
            _ => ModerationStatus::Pending,
        }
    }
}

/// Only meaningful while `moderation_status` is `rejected`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    Pending,
    Reviewing,
    Approved,
    Rejected,
}

impl AppealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppealStatus::Pending => "pending",
            AppealStatus::Reviewing => "reviewing",
            AppealStatus::Approved => "approved",
            AppealStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppealStatus::Pending),
            "reviewing" => Some(AppealStatus::Reviewing),
            "approved" => Some(AppealStatus::Approved),
            "rejected" => Some(AppealStatus::Rejected),
            _ => None,
        }
    }

    pub fn in_flight(&self) -> bool {
        matches!(self, AppealStatus::Pending | AppealStatus::Reviewing)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Offer,
    Request,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Offer => "offer",
            PostType::Request => "request",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "request" => PostType::Request,
            _ => PostType::Offer,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Fixed,
    Hourly,
    Negotiable,
    Free,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Fixed => "fixed",
            PriceType::Hourly => "hourly",
            PriceType::Negotiable => "negotiable",
            PriceType::Free => "free",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "fixed" => PriceType::Fixed,
            "hourly" => PriceType::Hourly,
            "free" => PriceType::Free,
            _ => PriceType::Negotiable,
        }
    }
}
