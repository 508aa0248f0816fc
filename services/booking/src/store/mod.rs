//! Persistence seam for the booking core.
//!
//! Every multi-step write is a single method here so that each implementation
//! can make it atomic: a transaction in Postgres, one lock hold in memory.
//! Expected refusals come back as outcome enums rather than errors; the
//! services decide which `AppError` they become.

pub mod memory;
pub mod postgres;

pub use memory::MemoryBookingStore;
pub use postgres::PgBookingStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentorbridge_common::AppResult;

use crate::models::{
    Account, AccountStatus, AvailabilitySlot, DayOfWeek, Feedback, MenteeProfile, MentorProfile,
    ProfileEdit, ProfileStatus, Session, SessionStatus, SlotView,
};

#[async_trait]
pub trait BookingStore: Send + Sync {
    // Accounts
    async fn insert_account(&self, account: Account) -> AppResult<Account>;
    async fn get_account(&self, user_id: Uuid) -> AppResult<Option<Account>>;
    async fn set_account_status(
        &self,
        user_id: Uuid,
        status: AccountStatus,
    ) -> AppResult<Option<Account>>;

    // Profiles
    async fn insert_mentor_profile(&self, profile: MentorProfile) -> AppResult<MentorProfile>;
    async fn get_mentor_profile(&self, mentor_id: Uuid) -> AppResult<Option<MentorProfile>>;
    async fn mentor_profile_for_user(&self, user_id: Uuid) -> AppResult<Option<MentorProfile>>;
    /// Applies only the fields present in `edit` and sends the profile back to
    /// review, in one write. `None` when the user has no mentor profile.
    async fn apply_profile_edit(
        &self,
        user_id: Uuid,
        edit: ProfileEdit,
    ) -> AppResult<Option<EditedProfile>>;
    /// Moves a profile to `to` only if it is currently in `from`.
    async fn transition_profile_status(
        &self,
        mentor_id: Uuid,
        from: ProfileStatus,
        to: ProfileStatus,
    ) -> AppResult<TransitionOutcome<MentorProfile, ProfileStatus>>;
    async fn list_mentor_profiles(&self, status: ProfileStatus) -> AppResult<Vec<MentorProfile>>;
    async fn insert_mentee_profile(&self, profile: MenteeProfile) -> AppResult<MenteeProfile>;
    async fn mentee_profile_for_user(&self, user_id: Uuid) -> AppResult<Option<MenteeProfile>>;

    // Availability
    /// Inserts the slot unless it duplicates or crowds an existing one.
    async fn insert_slot(&self, slot: AvailabilitySlot) -> AppResult<SlotInsertOutcome>;
    async fn get_slot(&self, slot_id: Uuid) -> AppResult<Option<AvailabilitySlot>>;
    /// All slots of a mentor, Monday first, time ascending, with booking flags.
    async fn list_slots(&self, mentor_id: Uuid) -> AppResult<Vec<SlotView>>;
    async fn toggle_slot(
        &self,
        slot_id: Uuid,
        mentor_id: Uuid,
    ) -> AppResult<SlotChange<AvailabilitySlot>>;
    async fn delete_slot(&self, slot_id: Uuid, mentor_id: Uuid) -> AppResult<SlotChange<()>>;

    // Sessions
    /// Re-checks the mentor is bookable, prices the session from the rate held
    /// at that moment, creates it and claims the slot; or changes nothing.
    async fn reserve(&self, reservation: NewReservation) -> AppResult<ReservationOutcome>;
    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>>;
    async fn transition_session(
        &self,
        session_id: Uuid,
        transition: SessionTransition,
    ) -> AppResult<TransitionOutcome<Session, SessionStatus>>;
    async fn sessions_for_mentor(&self, mentor_id: Uuid) -> AppResult<Vec<Session>>;
    async fn sessions_for_mentee(&self, mentee_id: Uuid) -> AppResult<Vec<SessionWithFeedback>>;
    async fn count_sessions_for_mentor(&self, mentor_id: Uuid) -> AppResult<i64>;

    // Feedback
    async fn insert_feedback(&self, feedback: Feedback) -> AppResult<FeedbackOutcome>;
    async fn feedback_for_session(&self, session_id: Uuid) -> AppResult<Option<Feedback>>;
    async fn recent_feedback_for_mentor(
        &self,
        mentor_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Feedback>>;
    async fn rating_summary(&self, mentor_id: Uuid) -> AppResult<RatingSummary>;

    // Reporting
    /// Paid sessions and their summed amount, for one mentor or the whole platform.
    async fn paid_volume(&self, mentor_id: Option<Uuid>) -> AppResult<PaidVolume>;
    async fn top_mentors_by_volume(&self, limit: i64) -> AppResult<Vec<MentorVolume>>;
    async fn count_sessions(&self, status: SessionStatus) -> AppResult<i64>;
    async fn count_mentors(&self, status: ProfileStatus) -> AppResult<i64>;
}

/// A profile after an edit, with the status it had before.
#[derive(Debug, Clone)]
pub struct EditedProfile {
    pub previous: ProfileStatus,
    pub profile: MentorProfile,
}

#[derive(Debug, Clone)]
pub enum SlotInsertOutcome {
    Inserted(AvailabilitySlot),
    Duplicate,
    TooClose { existing: NaiveTime },
}

/// Result of a mentor-initiated change to one of their slots.
#[derive(Debug, Clone)]
pub enum SlotChange<T> {
    Applied(T),
    Missing,
    NotOwner,
    /// A pending or confirmed session holds the slot.
    Occupied,
}

/// Everything a store needs to claim one occurrence of a weekly slot. The
/// amount is not part of it: stores price the session under the same lock
/// that checks the mentor is still approved.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub session_id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub time_of_day: NaiveTime,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone)]
pub enum ReservationOutcome {
    Reserved(Session),
    Unavailable(UnavailableReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Mentor is not approved, or their account is suspended.
    MentorUnavailable,
    NoSuchSlot,
    SlotDisabled,
    SlotOccupied,
    OccurrenceTaken,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            UnavailableReason::MentorUnavailable => "mentor is not accepting new bookings",
            UnavailableReason::NoSuchSlot => "mentor offers no such slot",
            UnavailableReason::SlotDisabled => "slot is disabled",
            UnavailableReason::SlotOccupied => "slot is already reserved",
            UnavailableReason::OccurrenceTaken => "occurrence is already booked",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone)]
pub enum TransitionOutcome<T, S> {
    Applied(T),
    Missing,
    /// The record was not in the expected state; carries what it was.
    Current(S),
}

/// The session moves the core is allowed to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    ConfirmPayment,
    Complete,
    Cancel,
}

impl SessionTransition {
    pub fn from(self) -> SessionStatus {
        match self {
            SessionTransition::ConfirmPayment | SessionTransition::Cancel => SessionStatus::Pending,
            SessionTransition::Complete => SessionStatus::Confirmed,
        }
    }

    pub fn to(self) -> SessionStatus {
        match self {
            SessionTransition::ConfirmPayment => SessionStatus::Confirmed,
            SessionTransition::Complete => SessionStatus::Completed,
            SessionTransition::Cancel => SessionStatus::Cancelled,
        }
    }

    pub fn marks_paid(self) -> bool {
        self == SessionTransition::ConfirmPayment
    }

    /// Terminal moves hand the slot back to the mentor's availability.
    pub fn releases_slot(self) -> bool {
        !self.to().is_live()
    }
}

#[derive(Debug, Clone)]
pub enum FeedbackOutcome {
    Recorded(Feedback),
    MissingSession,
    NotCompleted(SessionStatus),
    AlreadySubmitted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWithFeedback {
    pub session: Session,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PaidVolume {
    pub sessions: i64,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorVolume {
    pub mentor_id: Uuid,
    pub full_name: String,
    pub paid_sessions: i64,
    pub paid_volume: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: Option<Decimal>,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminal_moves_release_the_slot() {
        assert!(!SessionTransition::ConfirmPayment.releases_slot());
        assert!(SessionTransition::Complete.releases_slot());
        assert!(SessionTransition::Cancel.releases_slot());
    }

    #[test]
    fn transitions_start_from_expected_states() {
        assert_eq!(SessionTransition::ConfirmPayment.from(), SessionStatus::Pending);
        assert_eq!(SessionTransition::Cancel.from(), SessionStatus::Pending);
        assert_eq!(SessionTransition::Complete.from(), SessionStatus::Confirmed);
        assert!(SessionTransition::ConfirmPayment.marks_paid());
        assert!(!SessionTransition::Complete.marks_paid());
    }
}
