use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::Mutex;
use uuid::Uuid;

use mentorbridge_common::{AppError, AppResult};

use crate::availability::crowding_slot;
use crate::models::{
    Account, AccountStatus, AvailabilitySlot, Feedback, MenteeProfile, MentorProfile,
    PaymentStatus, ProfileEdit, ProfileStatus, Session, SessionStatus, SlotView,
};
use crate::revenue::compute_charge;

use super::{
    BookingStore, EditedProfile, FeedbackOutcome, MentorVolume, NewReservation, PaidVolume, RatingSummary,
    ReservationOutcome, SessionTransition, SessionWithFeedback, SlotChange, SlotInsertOutcome,
    TransitionOutcome, UnavailableReason,
};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    mentors: HashMap<Uuid, MentorProfile>,
    mentees: HashMap<Uuid, MenteeProfile>,
    slots: HashMap<Uuid, AvailabilitySlot>,
    sessions: HashMap<Uuid, Session>,
    /// Keyed by session id; at most one per session.
    feedback: HashMap<Uuid, Feedback>,
}

impl MemoryState {
    fn require_account(&self, user_id: Uuid) -> AppResult<()> {
        if self.accounts.contains_key(&user_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Account {} not found", user_id)))
        }
    }

    fn slot_view(&self, slot: &AvailabilitySlot) -> SlotView {
        let awaiting_feedback = self.sessions.values().any(|session| {
            session.slot_id == Some(slot.slot_id)
                && session.status == SessionStatus::Completed
                && !self.feedback.contains_key(&session.session_id)
        });
        SlotView {
            slot: slot.clone(),
            has_booking: slot.is_occupied(),
            awaiting_feedback,
        }
    }
}

/// Single-process store. One lock guards all state, so every method is atomic.
#[derive(Default)]
pub struct MemoryBookingStore {
    state: Mutex<MemoryState>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn insert_account(&self, account: Account) -> AppResult<Account> {
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&account.user_id)
            || state.accounts.values().any(|a| a.email == account.email)
        {
            return Err(AppError::Conflict(format!("Account {} already exists", account.email)));
        }
        state.accounts.insert(account.user_id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, user_id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(&user_id).cloned())
    }

    async fn set_account_status(
        &self,
        user_id: Uuid,
        status: AccountStatus,
    ) -> AppResult<Option<Account>> {
        let mut state = self.state.lock().await;
        Ok(state.accounts.get_mut(&user_id).map(|account| {
            account.status = status;
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn insert_mentor_profile(&self, profile: MentorProfile) -> AppResult<MentorProfile> {
        let mut state = self.state.lock().await;
        state.require_account(profile.user_id)?;
        if state.mentors.values().any(|m| m.user_id == profile.user_id) {
            return Err(AppError::Conflict(format!(
                "User {} already has a mentor profile",
                profile.user_id
            )));
        }
        state.mentors.insert(profile.mentor_id, profile.clone());
        Ok(profile)
    }

    async fn get_mentor_profile(&self, mentor_id: Uuid) -> AppResult<Option<MentorProfile>> {
        Ok(self.state.lock().await.mentors.get(&mentor_id).cloned())
    }

    async fn mentor_profile_for_user(&self, user_id: Uuid) -> AppResult<Option<MentorProfile>> {
        let state = self.state.lock().await;
        Ok(state.mentors.values().find(|m| m.user_id == user_id).cloned())
    }

    async fn apply_profile_edit(
        &self,
        user_id: Uuid,
        edit: ProfileEdit,
    ) -> AppResult<Option<EditedProfile>> {
        let mut state = self.state.lock().await;
        let Some(profile) = state.mentors.values_mut().find(|m| m.user_id == user_id) else {
            return Ok(None);
        };
        let previous = profile.status;
        edit.apply_to(profile);
        profile.status = previous.after_edit();
        profile.updated_at = Utc::now();
        Ok(Some(EditedProfile {
            previous,
            profile: profile.clone(),
        }))
    }

    async fn transition_profile_status(
        &self,
        mentor_id: Uuid,
        from: ProfileStatus,
        to: ProfileStatus,
    ) -> AppResult<TransitionOutcome<MentorProfile, ProfileStatus>> {
        let mut state = self.state.lock().await;
        let Some(profile) = state.mentors.get_mut(&mentor_id) else {
            return Ok(TransitionOutcome::Missing);
        };
        if profile.status != from {
            return Ok(TransitionOutcome::Current(profile.status));
        }
        profile.status = to;
        profile.updated_at = Utc::now();
        Ok(TransitionOutcome::Applied(profile.clone()))
    }

    async fn list_mentor_profiles(&self, status: ProfileStatus) -> AppResult<Vec<MentorProfile>> {
        let state = self.state.lock().await;
        let mut profiles: Vec<_> = state
            .mentors
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        profiles.sort_by_key(|m| m.created_at);
        Ok(profiles)
    }

    async fn insert_mentee_profile(&self, profile: MenteeProfile) -> AppResult<MenteeProfile> {
        let mut state = self.state.lock().await;
        state.require_account(profile.user_id)?;
        if state.mentees.values().any(|m| m.user_id == profile.user_id) {
            return Err(AppError::Conflict(format!(
                "User {} already has a mentee profile",
                profile.user_id
            )));
        }
        state.mentees.insert(profile.mentee_id, profile.clone());
        Ok(profile)
    }

    async fn mentee_profile_for_user(&self, user_id: Uuid) -> AppResult<Option<MenteeProfile>> {
        let state = self.state.lock().await;
        Ok(state.mentees.values().find(|m| m.user_id == user_id).cloned())
    }

    async fn insert_slot(&self, slot: AvailabilitySlot) -> AppResult<SlotInsertOutcome> {
        let mut state = self.state.lock().await;
        if !state.mentors.contains_key(&slot.mentor_id) {
            return Err(AppError::NotFound(format!("Mentor {} not found", slot.mentor_id)));
        }
        let mentor_slots: Vec<&AvailabilitySlot> = state
            .slots
            .values()
            .filter(|s| s.mentor_id == slot.mentor_id)
            .collect();

        if mentor_slots
            .iter()
            .any(|s| s.day_of_week == slot.day_of_week && s.time_of_day == slot.time_of_day)
        {
            return Ok(SlotInsertOutcome::Duplicate);
        }
        if let Some(existing) =
            crowding_slot(mentor_slots.iter().copied(), slot.day_of_week, slot.time_of_day)
        {
            return Ok(SlotInsertOutcome::TooClose {
                existing: existing.time_of_day,
            });
        }

        state.slots.insert(slot.slot_id, slot.clone());
        Ok(SlotInsertOutcome::Inserted(slot))
    }

    async fn get_slot(&self, slot_id: Uuid) -> AppResult<Option<AvailabilitySlot>> {
        Ok(self.state.lock().await.slots.get(&slot_id).cloned())
    }

    async fn list_slots(&self, mentor_id: Uuid) -> AppResult<Vec<SlotView>> {
        let state = self.state.lock().await;
        let mut views: Vec<SlotView> = state
            .slots
            .values()
            .filter(|s| s.mentor_id == mentor_id)
            .map(|s| state.slot_view(s))
            .collect();
        views.sort_by_key(|v| (v.slot.day_of_week, v.slot.time_of_day));
        Ok(views)
    }

    async fn toggle_slot(
        &self,
        slot_id: Uuid,
        mentor_id: Uuid,
    ) -> AppResult<SlotChange<AvailabilitySlot>> {
        let mut state = self.state.lock().await;
        let Some(slot) = state.slots.get_mut(&slot_id) else {
            return Ok(SlotChange::Missing);
        };
        if slot.mentor_id != mentor_id {
            return Ok(SlotChange::NotOwner);
        }
        if slot.is_occupied() {
            return Ok(SlotChange::Occupied);
        }
        slot.is_enabled = !slot.is_enabled;
        slot.updated_at = Utc::now();
        Ok(SlotChange::Applied(slot.clone()))
    }

    async fn delete_slot(&self, slot_id: Uuid, mentor_id: Uuid) -> AppResult<SlotChange<()>> {
        let mut state = self.state.lock().await;
        let Some(slot) = state.slots.get(&slot_id) else {
            return Ok(SlotChange::Missing);
        };
        if slot.mentor_id != mentor_id {
            return Ok(SlotChange::NotOwner);
        }
        if slot.is_occupied() {
            return Ok(SlotChange::Occupied);
        }
        state.slots.remove(&slot_id);
        for session in state.sessions.values_mut() {
            if session.slot_id == Some(slot_id) {
                session.slot_id = None;
            }
        }
        Ok(SlotChange::Applied(()))
    }

    async fn reserve(&self, reservation: NewReservation) -> AppResult<ReservationOutcome> {
        let mut state = self.state.lock().await;

        let Some(mentor) = state.mentors.get(&reservation.mentor_id) else {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::MentorUnavailable));
        };
        let bookable = state
            .accounts
            .get(&mentor.user_id)
            .is_some_and(|account| mentor.accepts_new_bookings(account));
        if !bookable {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::MentorUnavailable));
        }
        let amount = compute_charge(mentor.hourly_rate)?;

        let Some(slot) = state.slots.values().find(|s| {
            s.mentor_id == reservation.mentor_id
                && s.day_of_week == reservation.day_of_week
                && s.time_of_day == reservation.time_of_day
        }) else {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::NoSuchSlot));
        };
        if !slot.is_enabled {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::SlotDisabled));
        }
        if slot.is_occupied() {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::SlotOccupied));
        }
        let slot_id = slot.slot_id;

        let occurrence_taken = state.sessions.values().any(|s| {
            s.mentor_id == reservation.mentor_id
                && s.scheduled_at == reservation.scheduled_at
                && s.status.is_live()
        });
        if occurrence_taken {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::OccurrenceTaken));
        }

        let now = Utc::now();
        let session = Session {
            session_id: reservation.session_id,
            mentor_id: reservation.mentor_id,
            mentee_id: reservation.mentee_id,
            slot_id: Some(slot_id),
            scheduled_at: reservation.scheduled_at,
            duration_minutes: reservation.duration_minutes,
            amount,
            status: SessionStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.sessions.insert(session.session_id, session.clone());
        if let Some(slot) = state.slots.get_mut(&slot_id) {
            slot.active_session_id = Some(session.session_id);
            slot.updated_at = now;
        }
        Ok(ReservationOutcome::Reserved(session))
    }

    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(&session_id).cloned())
    }

    async fn transition_session(
        &self,
        session_id: Uuid,
        transition: SessionTransition,
    ) -> AppResult<TransitionOutcome<Session, SessionStatus>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let Some(session) = state.sessions.get_mut(&session_id) else {
            return Ok(TransitionOutcome::Missing);
        };
        if session.status != transition.from() {
            return Ok(TransitionOutcome::Current(session.status));
        }
        session.status = transition.to();
        if transition.marks_paid() {
            session.payment_status = PaymentStatus::Paid;
        }
        session.updated_at = now;
        let session = session.clone();

        if transition.releases_slot() {
            for slot in state.slots.values_mut() {
                if slot.active_session_id == Some(session_id) {
                    slot.active_session_id = None;
                    slot.updated_at = now;
                }
            }
        }
        Ok(TransitionOutcome::Applied(session))
    }

    async fn sessions_for_mentor(&self, mentor_id: Uuid) -> AppResult<Vec<Session>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<_> = state
            .sessions
            .values()
            .filter(|s| s.mentor_id == mentor_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.scheduled_at);
        Ok(sessions)
    }

    async fn sessions_for_mentee(&self, mentee_id: Uuid) -> AppResult<Vec<SessionWithFeedback>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<_> = state
            .sessions
            .values()
            .filter(|s| s.mentee_id == mentee_id)
            .map(|s| SessionWithFeedback {
                session: s.clone(),
                feedback: state.feedback.get(&s.session_id).cloned(),
            })
            .collect();
        sessions.sort_by(|a, b| b.session.scheduled_at.cmp(&a.session.scheduled_at));
        Ok(sessions)
    }

    async fn count_sessions_for_mentor(&self, mentor_id: Uuid) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.sessions.values().filter(|s| s.mentor_id == mentor_id).count() as i64)
    }

    async fn insert_feedback(&self, feedback: Feedback) -> AppResult<FeedbackOutcome> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get(&feedback.session_id) else {
            return Ok(FeedbackOutcome::MissingSession);
        };
        if session.status != SessionStatus::Completed {
            return Ok(FeedbackOutcome::NotCompleted(session.status));
        }
        if state.feedback.contains_key(&feedback.session_id) {
            return Ok(FeedbackOutcome::AlreadySubmitted);
        }
        state.feedback.insert(feedback.session_id, feedback.clone());
        Ok(FeedbackOutcome::Recorded(feedback))
    }

    async fn feedback_for_session(&self, session_id: Uuid) -> AppResult<Option<Feedback>> {
        Ok(self.state.lock().await.feedback.get(&session_id).cloned())
    }

    async fn recent_feedback_for_mentor(
        &self,
        mentor_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Feedback>> {
        let state = self.state.lock().await;
        let mut feedback: Vec<_> = state
            .feedback
            .values()
            .filter(|f| {
                state
                    .sessions
                    .get(&f.session_id)
                    .is_some_and(|s| s.mentor_id == mentor_id)
            })
            .cloned()
            .collect();
        feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        feedback.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(feedback)
    }

    async fn rating_summary(&self, mentor_id: Uuid) -> AppResult<RatingSummary> {
        let state = self.state.lock().await;
        let ratings: Vec<Decimal> = state
            .feedback
            .values()
            .filter(|f| {
                state
                    .sessions
                    .get(&f.session_id)
                    .is_some_and(|s| s.mentor_id == mentor_id)
            })
            .map(|f| Decimal::from(f.rating))
            .collect();

        let count = ratings.len() as i64;
        let average = (count > 0).then(|| {
            (ratings.iter().sum::<Decimal>() / Decimal::from(count))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        });
        Ok(RatingSummary { average, count })
    }

    async fn paid_volume(&self, mentor_id: Option<Uuid>) -> AppResult<PaidVolume> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .filter(|s| s.payment_status == PaymentStatus::Paid)
            .filter(|s| mentor_id.map_or(true, |id| s.mentor_id == id))
            .fold(PaidVolume::default(), |acc, s| PaidVolume {
                sessions: acc.sessions + 1,
                volume: acc.volume + s.amount,
            }))
    }

    async fn top_mentors_by_volume(&self, limit: i64) -> AppResult<Vec<MentorVolume>> {
        let state = self.state.lock().await;
        let mut ranked: Vec<MentorVolume> = state
            .mentors
            .values()
            .filter(|m| m.status == ProfileStatus::Approved)
            .map(|m| {
                let (paid_sessions, paid_volume) = state
                    .sessions
                    .values()
                    .filter(|s| s.mentor_id == m.mentor_id && s.payment_status == PaymentStatus::Paid)
                    .fold((0i64, Decimal::ZERO), |(n, sum), s| (n + 1, sum + s.amount));
                MentorVolume {
                    mentor_id: m.mentor_id,
                    full_name: m.full_name.clone(),
                    paid_sessions,
                    paid_volume,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.paid_volume
                .cmp(&a.paid_volume)
                .then_with(|| a.full_name.cmp(&b.full_name))
                .then_with(|| a.mentor_id.cmp(&b.mentor_id))
        });
        ranked.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(ranked)
    }

    async fn count_sessions(&self, status: SessionStatus) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.sessions.values().filter(|s| s.status == status).count() as i64)
    }

    async fn count_mentors(&self, status: ProfileStatus) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.mentors.values().filter(|m| m.status == status).count() as i64)
    }
}
