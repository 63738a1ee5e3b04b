use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::services::ai::{format_vector, EmbeddingInput};
use crate::services::moderation;
use crate::state::AppState;

const MAX_ATTEMPTS: i32 = 5;
const CLAIM_BATCH: i64 = 10;

/// Side effects that must not block their originating request (embedding
/// generation, moderation re-checks) land here instead of being dropped on
/// failure. The worker retries with backoff and keeps the failure visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    GenerateEmbedding,
    ModeratePost,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::GenerateEmbedding => "generate_embedding",
            TaskKind::ModeratePost => "moderate_post",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generate_embedding" => Some(TaskKind::GenerateEmbedding),
            "moderate_post" => Some(TaskKind::ModeratePost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboxTask {
    pub id: String,
    pub kind: TaskKind,
    pub post_id: String,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub run_after: NaiveDateTime,
}

pub fn enqueue(conn: &Connection, kind: TaskKind, post_id: &str) -> anyhow::Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    queries::enqueue_outbox_task(conn, &id, kind.as_str(), post_id, &now)?;
    tracing::info!(task_id = %id, kind = kind.as_str(), post_id, "enqueued outbox task");
    Ok(id)
}

/// Doubling backoff, floored at one minute.
pub fn retry_delay(attempts: i32) -> Duration {
    let shift = attempts.clamp(1, 6) - 1;
    Duration::seconds(60 * (1_i64 << shift))
}

/// Claim due tasks and run them to completion. Drives one poll cycle; the
/// server loops this on an interval and tests call it directly.
pub async fn run_once(state: &AppState) -> anyhow::Result<usize> {
    let now = Utc::now().naive_utc();
    let due = {
        let db = state.db.lock().unwrap();
        queries::due_outbox_tasks(&db, &now, CLAIM_BATCH)?
    };

    let mut processed = 0;
    for task in due {
        {
            let db = state.db.lock().unwrap();
            queries::mark_outbox_running(&db, &task.id)?;
        }

        let post = {
            let db = state.db.lock().unwrap();
            queries::get_post_by_id(&db, &task.post_id)?
        };

        let Some(post) = post else {
            let db = state.db.lock().unwrap();
            queries::finish_outbox_task(
                &db,
                &task.id,
                "failed",
                task.attempts + 1,
                Some("post no longer exists"),
                None,
            )?;
            processed += 1;
            continue;
        };

        let outcome = match task.kind {
            TaskKind::GenerateEmbedding => {
                let input = EmbeddingInput {
                    title: post.title.clone(),
                    description: post.description.clone(),
                    category: post.category_id.clone(),
                    city: post.city.clone(),
                };
                match state.ai.embed(&input).await {
                    Ok(values) => {
                        let db = state.db.lock().unwrap();
                        queries::set_post_embedding(&db, &post.id, &format_vector(&values))
                    }
                    Err(e) => Err(e),
                }
            }
            TaskKind::ModeratePost => {
                let input = moderation::moderation_input_for(&post);
                match state.ai.moderate(&input).await {
                    Ok(verdict) => {
                        let db = state.db.lock().unwrap();
                        moderation::apply_verdict(&db, &post, &verdict).map(|_| ())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        let db = state.db.lock().unwrap();
        match outcome {
            Ok(()) => {
                queries::finish_outbox_task(&db, &task.id, "done", task.attempts + 1, None, None)?;
            }
            Err(e) => {
                let attempts = task.attempts + 1;
                let err = e.to_string();
                if attempts >= MAX_ATTEMPTS {
                    tracing::warn!(task_id = %task.id, error = %err, "outbox task failed permanently");
                    queries::finish_outbox_task(&db, &task.id, "failed", attempts, Some(&err), None)?;
                } else {
                    let next = Utc::now().naive_utc() + retry_delay(attempts);
                    tracing::warn!(task_id = %task.id, attempts, error = %err, "outbox task failed, will retry");
                    queries::finish_outbox_task(
                        &db,
                        &task.id,
                        "queued",
                        attempts,
                        Some(&err),
                        Some(&next),
                    )?;
                }
            }
        }
        processed += 1;
    }

    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(retry_delay(1), Duration::seconds(60));
        assert_eq!(retry_delay(2), Duration::seconds(120));
        assert_eq!(retry_delay(3), Duration::seconds(240));
        assert_eq!(retry_delay(4), Duration::seconds(480));
    }

    #[test]
    fn test_retry_delay_capped() {
        assert_eq!(retry_delay(50), retry_delay(6));
    }

    #[test]
    fn test_task_kind_round_trip() {
        for kind in [TaskKind::GenerateEmbedding, TaskKind::ModeratePost] {
            assert_eq!(TaskKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TaskKind::parse("nonsense"), None);
    }
}
