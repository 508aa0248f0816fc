use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentorbridge_common::{AppError, AppResult, Principal, UserRole};

use crate::models::{Feedback, FeedbackRequest, MentorProfile, Session, SessionStatus};
use crate::revenue::RevenueFigures;
use crate::store::{
    BookingStore, FeedbackOutcome, SessionTransition, SessionWithFeedback, TransitionOutcome,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorDashboard {
    pub profile: MentorProfile,
    pub upcoming: Vec<Session>,
    pub completed: Vec<Session>,
    pub completed_count: usize,
    pub total_earnings: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenteeSessionView {
    pub session: Session,
    pub feedback: Option<Feedback>,
    pub can_leave_feedback: bool,
}

impl From<SessionWithFeedback> for MenteeSessionView {
    fn from(record: SessionWithFeedback) -> Self {
        Self {
            can_leave_feedback: record.session.status == SessionStatus::Completed
                && record.feedback.is_none(),
            session: record.session,
            feedback: record.feedback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorReviews {
    pub mentor_id: Uuid,
    pub average_rating: Option<Decimal>,
    pub review_count: i64,
    pub reviews: Vec<Feedback>,
}

/// Drives a session from reservation through payment, completion and feedback.
#[derive(Clone)]
pub struct SessionLifecycle {
    store: Arc<dyn BookingStore>,
    reviews_limit: i64,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn BookingStore>, reviews_limit: i64) -> Self {
        Self {
            store,
            reviews_limit,
        }
    }

    /// Sole trigger for `pending -> confirmed`; marks the session paid.
    pub async fn confirm_payment(&self, principal: &Principal, session_id: Uuid) -> AppResult<Session> {
        if !(principal.is_admin() || principal.role == UserRole::Payment) {
            return Err(AppError::Forbidden(
                "Only the payment service can confirm payments".to_string(),
            ));
        }
        let session = self
            .apply(session_id, SessionTransition::ConfirmPayment)
            .await?;
        tracing::info!(
            "Payment of {} confirmed for session {}",
            session.amount,
            session.session_id
        );
        Ok(session)
    }

    pub async fn complete(&self, principal: &Principal, session_id: Uuid) -> AppResult<Session> {
        principal.require_role(UserRole::Mentor)?;
        let session = self.load(session_id).await?;
        let mentor = self.store.mentor_profile_for_user(principal.user_id).await?;
        if mentor.map(|m| m.mentor_id) != Some(session.mentor_id) {
            tracing::warn!(
                "User {} tried to complete session {} of another mentor",
                principal.user_id,
                session_id
            );
            return Err(AppError::Forbidden(format!(
                "Session {} belongs to another mentor",
                session_id
            )));
        }

        let session = self.apply(session_id, SessionTransition::Complete).await?;
        tracing::info!("Session {} completed", session.session_id);
        Ok(session)
    }

    /// Abandons a pending session and frees its slot.
    pub async fn cancel(&self, principal: &Principal, session_id: Uuid) -> AppResult<Session> {
        let session = self.load(session_id).await?;
        match principal.role {
            UserRole::Payment | UserRole::Admin => {}
            UserRole::Mentee => {
                let mentee = self.store.mentee_profile_for_user(principal.user_id).await?;
                if mentee.map(|m| m.mentee_id) != Some(session.mentee_id) {
                    return Err(AppError::Forbidden(format!(
                        "Session {} belongs to another mentee",
                        session_id
                    )));
                }
            }
            UserRole::Mentor => {
                return Err(AppError::Forbidden("Mentors cannot cancel bookings".to_string()));
            }
        }

        let session = self.apply(session_id, SessionTransition::Cancel).await?;
        tracing::info!("Session {} cancelled, slot released", session.session_id);
        Ok(session)
    }

    pub async fn submit_feedback(
        &self,
        principal: &Principal,
        session_id: Uuid,
        request: FeedbackRequest,
    ) -> AppResult<Feedback> {
        principal.require_role(UserRole::Mentee)?;
        let rating = u8::try_from(request.rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| {
                AppError::Validation(format!("Rating must be between 1 and 5, got {}", request.rating))
            })?;

        let session = self.load(session_id).await?;
        let mentee = self.store.mentee_profile_for_user(principal.user_id).await?;
        if mentee.map(|m| m.mentee_id) != Some(session.mentee_id) {
            return Err(AppError::Forbidden(format!(
                "Session {} belongs to another mentee",
                session_id
            )));
        }

        let feedback = Feedback {
            feedback_id: Uuid::new_v4(),
            session_id,
            rating,
            comment: request.comment.trim().to_string(),
            created_at: Utc::now(),
        };
        match self.store.insert_feedback(feedback).await? {
            FeedbackOutcome::Recorded(feedback) => {
                tracing::info!("Rating {} recorded for session {}", feedback.rating, session_id);
                Ok(feedback)
            }
            FeedbackOutcome::MissingSession => {
                Err(AppError::NotFound(format!("Session {} not found", session_id)))
            }
            FeedbackOutcome::NotCompleted(status) => Err(AppError::InvalidState(format!(
                "Feedback needs a completed session; session {} is {}",
                session_id,
                status.as_str()
            ))),
            FeedbackOutcome::AlreadySubmitted => {
                tracing::warn!("Second feedback for session {} refused", session_id);
                Err(AppError::InvalidState(format!(
                    "Feedback for session {} was already submitted",
                    session_id
                )))
            }
        }
    }

    /// Available whatever the profile's approval status.
    pub async fn mentor_dashboard(&self, principal: &Principal) -> AppResult<MentorDashboard> {
        principal.require_role(UserRole::Mentor)?;
        let profile = self
            .store
            .mentor_profile_for_user(principal.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Complete your mentor profile first".to_string()))?;

        let sessions = self.store.sessions_for_mentor(profile.mentor_id).await?;
        let paid = self.store.paid_volume(Some(profile.mentor_id)).await?;

        let (upcoming, rest): (Vec<_>, Vec<_>) =
            sessions.into_iter().partition(|s| s.status.is_live());
        let mut completed: Vec<Session> = rest
            .into_iter()
            .filter(|s| s.status == SessionStatus::Completed)
            .collect();
        completed.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        tracing::debug!(
            "Dashboard for mentor {}: {} upcoming, {} completed",
            profile.mentor_id,
            upcoming.len(),
            completed.len()
        );

        Ok(MentorDashboard {
            completed_count: completed.len(),
            total_earnings: RevenueFigures::from_amount(paid.volume).mentor_payout,
            profile,
            upcoming,
            completed,
        })
    }

    pub async fn mentee_sessions(&self, principal: &Principal) -> AppResult<Vec<MenteeSessionView>> {
        principal.require_role(UserRole::Mentee)?;
        let Some(mentee) = self.store.mentee_profile_for_user(principal.user_id).await? else {
            return Ok(Vec::new());
        };
        let sessions = self.store.sessions_for_mentee(mentee.mentee_id).await?;
        Ok(sessions.into_iter().map(MenteeSessionView::from).collect())
    }

    pub async fn mentor_reviews(&self, mentor_id: Uuid) -> AppResult<MentorReviews> {
        if self.store.get_mentor_profile(mentor_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Mentor {} not found", mentor_id)));
        }
        let summary = self.store.rating_summary(mentor_id).await?;
        let reviews = self
            .store
            .recent_feedback_for_mentor(mentor_id, self.reviews_limit)
            .await?;
        Ok(MentorReviews {
            mentor_id,
            average_rating: summary.average,
            review_count: summary.count,
            reviews,
        })
    }

    async fn load(&self, session_id: Uuid) -> AppResult<Session> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn apply(&self, session_id: Uuid, transition: SessionTransition) -> AppResult<Session> {
        match self.store.transition_session(session_id, transition).await? {
            TransitionOutcome::Applied(session) => Ok(session),
            TransitionOutcome::Missing => {
                Err(AppError::NotFound(format!("Session {} not found", session_id)))
            }
            TransitionOutcome::Current(status) => {
                tracing::warn!(
                    "Session {} is {}, cannot move to {}",
                    session_id,
                    status.as_str(),
                    transition.to().as_str()
                );
                Err(AppError::InvalidTransition(format!(
                    "Session {} is {} and cannot become {}",
                    session_id,
                    status.as_str(),
                    transition.to().as_str()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::models::PaymentStatus;

    fn session(status: SessionStatus) -> Session {
        let at = Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap();
        Session {
            session_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            mentee_id: Uuid::new_v4(),
            slot_id: None,
            scheduled_at: at,
            duration_minutes: 60,
            amount: Decimal::new(6000, 2),
            status,
            payment_status: PaymentStatus::Paid,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn only_completed_sessions_without_feedback_invite_feedback() {
        let open = MenteeSessionView::from(SessionWithFeedback {
            session: session(SessionStatus::Completed),
            feedback: None,
        });
        assert!(open.can_leave_feedback);

        let confirmed = MenteeSessionView::from(SessionWithFeedback {
            session: session(SessionStatus::Confirmed),
            feedback: None,
        });
        assert!(!confirmed.can_leave_feedback);

        let done = session(SessionStatus::Completed);
        let reviewed = MenteeSessionView::from(SessionWithFeedback {
            feedback: Some(Feedback {
                feedback_id: Uuid::new_v4(),
                session_id: done.session_id,
                rating: 5,
                comment: String::new(),
                created_at: Utc::now(),
            }),
            session: done,
        });
        assert!(!reviewed.can_leave_feedback);
    }
}
