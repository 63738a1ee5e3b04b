pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::ModerationStatus;

#[derive(Debug, Clone, Serialize)]
pub struct ModerationInput {
    pub title: String,
    pub description: String,
    pub post_type: String,
    pub city: String,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationOutcome {
    Approved,
    Flagged,
    Rejected,
}

impl ModerationOutcome {
    pub fn as_moderation_status(&self) -> ModerationStatus {
        match self {
            ModerationOutcome::Approved => ModerationStatus::Approved,
            ModerationOutcome::Flagged => ModerationStatus::Flagged,
            ModerationOutcome::Rejected => ModerationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModerationVerdict {
    pub outcome: ModerationOutcome,
    pub score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingInput {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub city: String,
}

/// One upstream AI service covers content moderation, semantic embeddings
/// and category suggestion. All three are opaque collaborators; only the
/// HTTP implementation knows the wire shapes.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn moderate(&self, input: &ModerationInput) -> anyhow::Result<ModerationVerdict>;

    async fn embed(&self, input: &EmbeddingInput) -> anyhow::Result<Vec<f32>>;

    /// Returns a slug path from the category tree root, e.g.
    /// `["home", "cleaning"]`.
    async fn suggest_category(&self, title: &str, description: &str)
        -> anyhow::Result<Vec<String>>;
}

/// Postgres-style vector literal, the format the embedding column stores.
pub fn format_vector(values: &[f32]) -> String {
    let inner: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", inner.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_vector() {
        assert_eq!(format_vector(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
        assert_eq!(format_vector(&[]), "[]");
    }

    #[test]
    fn test_outcome_maps_to_moderation_status() {
        assert_eq!(
            ModerationOutcome::Approved.as_moderation_status(),
            ModerationStatus::Approved
        );
        assert_eq!(
            ModerationOutcome::Rejected.as_moderation_status(),
            ModerationStatus::Rejected
        );
        assert_eq!(
            ModerationOutcome::Flagged.as_moderation_status(),
            ModerationStatus::Flagged
        );
    }
}
