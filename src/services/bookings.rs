use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};

/// Which side of the booking the acting user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Provider,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Confirm,
    Reject,
    Cancel,
    Complete,
    Review,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::Confirm => "confirm",
            BookingAction::Reject => "reject",
            BookingAction::Cancel => "cancel",
            BookingAction::Complete => "complete",
            BookingAction::Review => "review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The acting user is neither the provider nor the client.
    NotAParty,
    /// The action exists but this actor may not perform it here.
    WrongActor {
        action: BookingAction,
    },
    InvalidTransition {
        from: BookingStatus,
        action: BookingAction,
    },
    /// The requested target status cannot be reached by any action.
    UnknownTarget(String),
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::NotAParty => {
                write!(f, "you are not a party to this booking")
            }
            TransitionError::WrongActor { action } => {
                write!(f, "you are not allowed to {} this booking", action.as_str())
            }
            TransitionError::InvalidTransition { from, action } => {
                write!(
                    f,
                    "cannot {} a booking that is {}",
                    action.as_str(),
                    from.as_str()
                )
            }
            TransitionError::UnknownTarget(s) => write!(f, "invalid status: {s}"),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::NotAParty | TransitionError::WrongActor { .. } => AppError::Forbidden,
            TransitionError::InvalidTransition { .. } | TransitionError::UnknownTarget(_) => {
                AppError::Validation(e.to_string())
            }
        }
    }
}

/// The full transition table. Every booking mutation goes through here
/// before any write; the same table drives which actions a UI may offer.
pub fn transition(
    current: BookingStatus,
    actor: Actor,
    action: BookingAction,
) -> Result<BookingStatus, TransitionError> {
    use BookingAction::*;
    use BookingStatus::*;

    match (current, actor, action) {
        (Pending, Actor::Provider, Reject) => Ok(Cancelled),
        (Pending, Actor::Provider, Confirm) => Ok(Confirmed),
        (Confirmed, Actor::Provider, Cancel) => Ok(Cancelled),
        (Confirmed, Actor::Provider, Complete) => Ok(Completed),
        (Pending, Actor::Client, Cancel) => Ok(Cancelled),
        (Confirmed, Actor::Client, Cancel) => Ok(Cancelled),
        (Completed, Actor::Client, Review) => Ok(Reviewed),

        // Right state, wrong side of the booking.
        (Pending, Actor::Client, Confirm | Reject) => Err(TransitionError::WrongActor { action }),
        (Confirmed, Actor::Client, Complete) => Err(TransitionError::WrongActor { action }),
        (Completed, Actor::Provider, Review) => Err(TransitionError::WrongActor { action }),

        (from, _, action) => Err(TransitionError::InvalidTransition { from, action }),
    }
}

/// Resolve the acting user against the booking's parties.
pub fn actor_for(booking: &Booking, user_id: &str) -> Result<Actor, TransitionError> {
    if booking.provider_id == user_id {
        Ok(Actor::Provider)
    } else if booking.client_id == user_id {
        Ok(Actor::Client)
    } else {
        Err(TransitionError::NotAParty)
    }
}

/// The wire API carries a target status, not an action. Map it back so the
/// transition table stays the single source of truth. `cancelled` means
/// reject when a provider acts on a pending booking, cancel otherwise;
/// `reviewed` is reachable only through the review flow.
pub fn action_for_target(
    current: BookingStatus,
    actor: Actor,
    target: &str,
) -> Result<BookingAction, TransitionError> {
    match target {
        "confirmed" => Ok(BookingAction::Confirm),
        "completed" => Ok(BookingAction::Complete),
        "cancelled" => {
            if actor == Actor::Provider && current == BookingStatus::Pending {
                Ok(BookingAction::Reject)
            } else {
                Ok(BookingAction::Cancel)
            }
        }
        other => Err(TransitionError::UnknownTarget(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingAction::*;
    use BookingStatus::*;

    #[test]
    fn test_provider_pending_transitions() {
        assert_eq!(transition(Pending, Actor::Provider, Confirm), Ok(Confirmed));
        assert_eq!(transition(Pending, Actor::Provider, Reject), Ok(Cancelled));
        assert!(transition(Pending, Actor::Provider, Complete).is_err());
        assert!(transition(Pending, Actor::Provider, Review).is_err());
    }

    #[test]
    fn test_provider_confirmed_transitions() {
        assert_eq!(
            transition(Confirmed, Actor::Provider, Complete),
            Ok(Completed)
        );
        assert_eq!(
            transition(Confirmed, Actor::Provider, Cancel),
            Ok(Cancelled)
        );
        assert!(transition(Confirmed, Actor::Provider, Confirm).is_err());
    }

    #[test]
    fn test_client_cancel() {
        assert_eq!(transition(Pending, Actor::Client, Cancel), Ok(Cancelled));
        assert_eq!(transition(Confirmed, Actor::Client, Cancel), Ok(Cancelled));
        assert!(transition(Completed, Actor::Client, Cancel).is_err());
    }

    #[test]
    fn test_client_cannot_confirm_or_reject() {
        assert_eq!(
            transition(Pending, Actor::Client, Confirm),
            Err(TransitionError::WrongActor { action: Confirm })
        );
        assert_eq!(
            transition(Pending, Actor::Client, Reject),
            Err(TransitionError::WrongActor { action: Reject })
        );
    }

    #[test]
    fn test_review_only_client_on_completed() {
        assert_eq!(transition(Completed, Actor::Client, Review), Ok(Reviewed));
        assert_eq!(
            transition(Completed, Actor::Provider, Review),
            Err(TransitionError::WrongActor { action: Review })
        );
        assert!(transition(Confirmed, Actor::Client, Review).is_err());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for actor in [Actor::Provider, Actor::Client] {
            for action in [Confirm, Reject, Cancel, Complete, Review] {
                assert!(transition(Cancelled, actor, action).is_err());
                assert!(transition(Reviewed, actor, action).is_err());
            }
        }
    }

    #[test]
    fn test_action_for_target_cancel_vs_reject() {
        assert_eq!(
            action_for_target(Pending, Actor::Provider, "cancelled"),
            Ok(Reject)
        );
        assert_eq!(
            action_for_target(Confirmed, Actor::Provider, "cancelled"),
            Ok(Cancel)
        );
        assert_eq!(
            action_for_target(Pending, Actor::Client, "cancelled"),
            Ok(Cancel)
        );
    }

    #[test]
    fn test_action_for_target_rejects_reviewed_and_garbage() {
        assert!(action_for_target(Completed, Actor::Client, "reviewed").is_err());
        assert!(action_for_target(Pending, Actor::Provider, "banana").is_err());
    }

    #[test]
    fn test_actor_for() {
        let now = chrono::NaiveDateTime::parse_from_str("2025-01-01 10:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let booking = Booking {
            id: "b1".to_string(),
            post_id: "p1".to_string(),
            provider_id: "prov".to_string(),
            client_id: "cli".to_string(),
            scheduled_at: now,
            duration_minutes: 60,
            status: Pending,
            client_notes: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(actor_for(&booking, "prov"), Ok(Actor::Provider));
        assert_eq!(actor_for(&booking, "cli"), Ok(Actor::Client));
        assert_eq!(actor_for(&booking, "other"), Err(TransitionError::NotAParty));
    }
}
