use rusqlite::Connection;

use crate::db::queries;
use crate::models::{ModerationStatus, Post, PostStatus};
use crate::services::ai::{ModerationInput, ModerationOutcome, ModerationVerdict};

pub fn moderation_input_for(post: &Post) -> ModerationInput {
    ModerationInput {
        title: post.title.clone(),
        description: post.description.clone(),
        post_type: post.post_type.as_str().to_string(),
        city: post.city.clone(),
        price_min: post.price_min,
        price_max: post.price_max,
    }
}

/// Persist a moderation verdict: only approved posts go live, everything
/// else stays pending. Appends the audit row in the same transaction scope
/// as the status write.
pub fn apply_verdict(
    conn: &Connection,
    post: &Post,
    verdict: &ModerationVerdict,
) -> anyhow::Result<ModerationStatus> {
    let new_status = verdict.outcome.as_moderation_status();
    let post_status = match verdict.outcome {
        ModerationOutcome::Approved => PostStatus::Active,
        _ => PostStatus::Pending,
    };
    let reason = verdict.reasons.join(", ");

    queries::set_moderation_result(conn, &post.id, new_status, verdict.score, &reason, post_status)?;

    let action = match verdict.outcome {
        ModerationOutcome::Approved => "auto_approved",
        ModerationOutcome::Rejected => "auto_rejected",
        ModerationOutcome::Flagged => "flagged",
    };
    queries::insert_moderation_log(
        conn,
        &post.id,
        action,
        Some(post.moderation_status.as_str()),
        Some(new_status.as_str()),
        if reason.is_empty() {
            None
        } else {
            Some(reason.as_str())
        },
    )?;

    Ok(new_status)
}
