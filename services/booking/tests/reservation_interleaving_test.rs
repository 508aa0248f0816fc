mod common;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use mentorbridge_booking::{
    models::{
        Account, AccountStatus, AddSlotRequest, AvailabilitySlot, DayOfWeek, Feedback, MenteeProfile,
        MentorProfile, ProfileEdit, ProfileStatus, ReserveRequest, Session, SessionStatus, SlotView,
    },
    store::{
        BookingStore, EditedProfile, FeedbackOutcome, MemoryBookingStore, MentorVolume, NewReservation,
        PaidVolume, RatingSummary, ReservationOutcome, SessionTransition, SessionWithFeedback,
        SlotChange, SlotInsertOutcome, TransitionOutcome,
    },
    AppState,
};
use mentorbridge_common::{AppError, AppResult};

use common::{admin, at, cents, dollars, seed_mentee, seed_mentor, test_config};

/// A change another request commits while a reservation is in flight.
enum Interference {
    EditProfile(Uuid),
    Suspend(Uuid),
}

/// Memory store that lands one interfering write right before `reserve` runs,
/// after the engine has already looked the mentor up.
#[derive(Default)]
struct InterleavingStore {
    inner: MemoryBookingStore,
    before_reserve: Mutex<Option<Interference>>,
}

impl InterleavingStore {
    async fn interfere_with_next_reservation(&self, interference: Interference) {
        *self.before_reserve.lock().await = Some(interference);
    }
}

#[async_trait]
impl BookingStore for InterleavingStore {
    async fn insert_account(&self, account: Account) -> AppResult<Account> {
        self.inner.insert_account(account).await
    }

    async fn get_account(&self, user_id: Uuid) -> AppResult<Option<Account>> {
        self.inner.get_account(user_id).await
    }

    async fn set_account_status(
        &self,
        user_id: Uuid,
        status: AccountStatus,
    ) -> AppResult<Option<Account>> {
        self.inner.set_account_status(user_id, status).await
    }

    async fn insert_mentor_profile(&self, profile: MentorProfile) -> AppResult<MentorProfile> {
        self.inner.insert_mentor_profile(profile).await
    }

    async fn get_mentor_profile(&self, mentor_id: Uuid) -> AppResult<Option<MentorProfile>> {
        self.inner.get_mentor_profile(mentor_id).await
    }

    async fn mentor_profile_for_user(&self, user_id: Uuid) -> AppResult<Option<MentorProfile>> {
        self.inner.mentor_profile_for_user(user_id).await
    }

    async fn apply_profile_edit(
        &self,
        user_id: Uuid,
        edit: ProfileEdit,
    ) -> AppResult<Option<EditedProfile>> {
        self.inner.apply_profile_edit(user_id, edit).await
    }

    async fn transition_profile_status(
        &self,
        mentor_id: Uuid,
        from: ProfileStatus,
        to: ProfileStatus,
    ) -> AppResult<TransitionOutcome<MentorProfile, ProfileStatus>> {
        self.inner.transition_profile_status(mentor_id, from, to).await
    }

    async fn list_mentor_profiles(&self, status: ProfileStatus) -> AppResult<Vec<MentorProfile>> {
        self.inner.list_mentor_profiles(status).await
    }

    async fn insert_mentee_profile(&self, profile: MenteeProfile) -> AppResult<MenteeProfile> {
        self.inner.insert_mentee_profile(profile).await
    }

    async fn mentee_profile_for_user(&self, user_id: Uuid) -> AppResult<Option<MenteeProfile>> {
        self.inner.mentee_profile_for_user(user_id).await
    }

    async fn insert_slot(&self, slot: AvailabilitySlot) -> AppResult<SlotInsertOutcome> {
        self.inner.insert_slot(slot).await
    }

    async fn get_slot(&self, slot_id: Uuid) -> AppResult<Option<AvailabilitySlot>> {
        self.inner.get_slot(slot_id).await
    }

    async fn list_slots(&self, mentor_id: Uuid) -> AppResult<Vec<SlotView>> {
        self.inner.list_slots(mentor_id).await
    }

    async fn toggle_slot(
        &self,
        slot_id: Uuid,
        mentor_id: Uuid,
    ) -> AppResult<SlotChange<AvailabilitySlot>> {
        self.inner.toggle_slot(slot_id, mentor_id).await
    }

    async fn delete_slot(&self, slot_id: Uuid, mentor_id: Uuid) -> AppResult<SlotChange<()>> {
        self.inner.delete_slot(slot_id, mentor_id).await
    }

    async fn reserve(&self, reservation: NewReservation) -> AppResult<ReservationOutcome> {
        let interference = self.before_reserve.lock().await.take();
        match interference {
            Some(Interference::EditProfile(user_id)) => {
                let edit = ProfileEdit {
                    hourly_rate: Some(dollars(90)),
                    ..Default::default()
                };
                self.inner.apply_profile_edit(user_id, edit).await?;
            }
            Some(Interference::Suspend(user_id)) => {
                self.inner
                    .set_account_status(user_id, AccountStatus::Suspended)
                    .await?;
            }
            None => {}
        }
        self.inner.reserve(reservation).await
    }

    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>> {
        self.inner.get_session(session_id).await
    }

    async fn transition_session(
        &self,
        session_id: Uuid,
        transition: SessionTransition,
    ) -> AppResult<TransitionOutcome<Session, SessionStatus>> {
        self.inner.transition_session(session_id, transition).await
    }

    async fn sessions_for_mentor(&self, mentor_id: Uuid) -> AppResult<Vec<Session>> {
        self.inner.sessions_for_mentor(mentor_id).await
    }

    async fn sessions_for_mentee(&self, mentee_id: Uuid) -> AppResult<Vec<SessionWithFeedback>> {
        self.inner.sessions_for_mentee(mentee_id).await
    }

    async fn count_sessions_for_mentor(&self, mentor_id: Uuid) -> AppResult<i64> {
        self.inner.count_sessions_for_mentor(mentor_id).await
    }

    async fn insert_feedback(&self, feedback: Feedback) -> AppResult<FeedbackOutcome> {
        self.inner.insert_feedback(feedback).await
    }

    async fn feedback_for_session(&self, session_id: Uuid) -> AppResult<Option<Feedback>> {
        self.inner.feedback_for_session(session_id).await
    }

    async fn recent_feedback_for_mentor(
        &self,
        mentor_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Feedback>> {
        self.inner.recent_feedback_for_mentor(mentor_id, limit).await
    }

    async fn rating_summary(&self, mentor_id: Uuid) -> AppResult<RatingSummary> {
        self.inner.rating_summary(mentor_id).await
    }

    async fn paid_volume(&self, mentor_id: Option<Uuid>) -> AppResult<PaidVolume> {
        self.inner.paid_volume(mentor_id).await
    }

    async fn top_mentors_by_volume(&self, limit: i64) -> AppResult<Vec<MentorVolume>> {
        self.inner.top_mentors_by_volume(limit).await
    }

    async fn count_sessions(&self, status: SessionStatus) -> AppResult<i64> {
        self.inner.count_sessions(status).await
    }

    async fn count_mentors(&self, status: ProfileStatus) -> AppResult<i64> {
        self.inner.count_mentors(status).await
    }
}

fn thursday_at_four(mentor_id: Uuid) -> ReserveRequest {
    ReserveRequest {
        mentor_id,
        day_of_week: DayOfWeek::Thursday,
        time_of_day: at(16),
    }
}

async fn interleaving_state() -> (Arc<InterleavingStore>, AppState) {
    let store = Arc::new(InterleavingStore::default());
    let state = AppState::new(test_config(), store.clone());
    (store, state)
}

#[tokio::test]
async fn edit_landing_mid_reservation_blocks_booking_at_the_stale_rate() {
    let (store, state) = interleaving_state().await;
    let (mentor, profile) = seed_mentor(&state.store, "Barbara", dollars(50), true).await;
    let (mentee, _) = seed_mentee(&state.store, "Niklaus").await;
    state
        .availability
        .add_slot(
            &mentor,
            AddSlotRequest {
                day_of_week: DayOfWeek::Thursday,
                time_of_day: at(16),
            },
        )
        .await
        .unwrap();

    store
        .interfere_with_next_reservation(Interference::EditProfile(mentor.user_id))
        .await;
    let refused = state
        .reservations
        .reserve(&mentee, thursday_at_four(profile.mentor_id))
        .await;
    assert!(matches!(refused, Err(AppError::SlotUnavailable(_))), "{:?}", refused);
    assert!(state
        .store
        .sessions_for_mentor(profile.mentor_id)
        .await
        .unwrap()
        .is_empty());
    let views = state.store.list_slots(profile.mentor_id).await.unwrap();
    assert!(!views[0].has_booking);

    // Once re-approved, the booking is priced from the edited rate.
    state.approvals.approve(&admin(), profile.mentor_id).await.unwrap();
    let session = state
        .reservations
        .reserve(&mentee, thursday_at_four(profile.mentor_id))
        .await
        .unwrap();
    assert_eq!(session.amount, cents(10800));
}

#[tokio::test]
async fn suspension_landing_mid_reservation_blocks_booking() {
    let (store, state) = interleaving_state().await;
    let (mentor, profile) = seed_mentor(&state.store, "Frances", dollars(40), true).await;
    let (mentee, _) = seed_mentee(&state.store, "Tony").await;
    state
        .availability
        .add_slot(
            &mentor,
            AddSlotRequest {
                day_of_week: DayOfWeek::Thursday,
                time_of_day: at(16),
            },
        )
        .await
        .unwrap();

    store
        .interfere_with_next_reservation(Interference::Suspend(mentor.user_id))
        .await;
    let refused = state
        .reservations
        .reserve(&mentee, thursday_at_four(profile.mentor_id))
        .await;
    assert!(matches!(refused, Err(AppError::SlotUnavailable(_))), "{:?}", refused);
    assert_eq!(
        state.store.count_sessions_for_mentor(profile.mentor_id).await.unwrap(),
        0
    );
}
