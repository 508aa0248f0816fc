use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentorbridge_common::{AppError, AppResult, Principal, UserRole};

use crate::models::{Account, AccountStatus, MentorProfile, ProfileEdit, ProfileStatus};
use crate::revenue::validate_hourly_rate;
use crate::store::{BookingStore, EditedProfile, TransitionOutcome};

/// Pending profiles awaiting an admin decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewQueue {
    /// Mentors who have never had a session.
    pub new_applications: Vec<MentorProfile>,
    /// Mentors who already had sessions and edited their profile since.
    pub update_requests: Vec<MentorProfile>,
}

/// Decides when a mentor profile is live for new bookings.
///
/// Status changes here never touch sessions or slots; only whether new
/// reservations are accepted depends on the outcome.
#[derive(Clone)]
pub struct ProfileApprovalGate {
    store: Arc<dyn BookingStore>,
}

impl ProfileApprovalGate {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Applies a mentor's edit and sends the profile back to review.
    pub async fn edit_profile(&self, principal: &Principal, edit: ProfileEdit) -> AppResult<MentorProfile> {
        principal.require_role(UserRole::Mentor)?;
        if edit.is_empty() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }
        if let Some(rate) = edit.hourly_rate {
            validate_hourly_rate(rate)?;
        }
        if edit.full_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(AppError::Validation("Full name cannot be empty".to_string()));
        }

        let EditedProfile { previous, profile } = self
            .store
            .apply_profile_edit(principal.user_id, edit)
            .await?
            .ok_or_else(|| AppError::NotFound("Complete your mentor profile first".to_string()))?;
        if previous != profile.status {
            tracing::info!(
                "Mentor {} edited profile, status {} -> {}",
                profile.mentor_id,
                previous.as_str(),
                profile.status.as_str()
            );
        }
        Ok(profile)
    }

    pub async fn approve(&self, principal: &Principal, mentor_id: Uuid) -> AppResult<MentorProfile> {
        self.decide(principal, mentor_id, ProfileStatus::Approved).await
    }

    pub async fn reject(&self, principal: &Principal, mentor_id: Uuid) -> AppResult<MentorProfile> {
        self.decide(principal, mentor_id, ProfileStatus::Rejected).await
    }

    pub async fn suspend_user(&self, principal: &Principal, user_id: Uuid) -> AppResult<Account> {
        self.set_status(principal, user_id, AccountStatus::Suspended).await
    }

    pub async fn activate_user(&self, principal: &Principal, user_id: Uuid) -> AppResult<Account> {
        self.set_status(principal, user_id, AccountStatus::Active).await
    }

    pub async fn review_queue(&self, principal: &Principal) -> AppResult<ReviewQueue> {
        principal.require_role(UserRole::Admin)?;
        let mut queue = ReviewQueue::default();
        for profile in self.store.list_mentor_profiles(ProfileStatus::Pending).await? {
            if self.store.count_sessions_for_mentor(profile.mentor_id).await? > 0 {
                queue.update_requests.push(profile);
            } else {
                queue.new_applications.push(profile);
            }
        }
        tracing::debug!(
            "Review queue: {} new, {} updates",
            queue.new_applications.len(),
            queue.update_requests.len()
        );
        Ok(queue)
    }

    async fn decide(
        &self,
        principal: &Principal,
        mentor_id: Uuid,
        decision: ProfileStatus,
    ) -> AppResult<MentorProfile> {
        principal.require_role(UserRole::Admin)?;
        match self
            .store
            .transition_profile_status(mentor_id, ProfileStatus::Pending, decision)
            .await?
        {
            TransitionOutcome::Applied(profile) => {
                tracing::info!("Mentor {} {} by admin {}", mentor_id, decision.as_str(), principal.user_id);
                Ok(profile)
            }
            TransitionOutcome::Missing => Err(AppError::NotFound(format!("Mentor {} not found", mentor_id))),
            TransitionOutcome::Current(status) => Err(AppError::InvalidTransition(format!(
                "Mentor {} is {}; only pending profiles can be {}",
                mentor_id,
                status.as_str(),
                decision.as_str()
            ))),
        }
    }

    async fn set_status(
        &self,
        principal: &Principal,
        user_id: Uuid,
        status: AccountStatus,
    ) -> AppResult<Account> {
        principal.require_role(UserRole::Admin)?;
        if user_id == principal.user_id {
            return Err(AppError::Validation("Admins cannot change their own status".to_string()));
        }
        let account = self
            .store
            .set_account_status(user_id, status)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        tracing::info!("User {} is now {}", user_id, status.as_str());
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    use crate::store::MemoryBookingStore;

    async fn seeded() -> (ProfileApprovalGate, Arc<MemoryBookingStore>, Principal, Principal, MentorProfile) {
        let store = Arc::new(MemoryBookingStore::new());
        let mentor_user = Uuid::new_v4();
        store
            .insert_account(Account::new(mentor_user, "mentor@example.com", UserRole::Mentor))
            .await
            .unwrap();
        let profile = store
            .insert_mentor_profile(MentorProfile::new(mentor_user, "Grace", Decimal::new(80, 0)))
            .await
            .unwrap();
        let admin = Principal::new(Uuid::new_v4(), UserRole::Admin);
        let gate = ProfileApprovalGate::new(store.clone());
        (gate, store, admin, Principal::new(mentor_user, UserRole::Mentor), profile)
    }

    #[tokio::test]
    async fn approve_only_from_pending() {
        let (gate, _store, admin, _mentor, profile) = seeded().await;

        let approved = gate.approve(&admin, profile.mentor_id).await.unwrap();
        assert_eq!(approved.status, ProfileStatus::Approved);

        let again = gate.reject(&admin, profile.mentor_id).await;
        assert!(matches!(again, Err(AppError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn edit_sends_approved_and_rejected_profiles_back_to_review() {
        let (gate, _store, admin, mentor, profile) = seeded().await;
        gate.approve(&admin, profile.mentor_id).await.unwrap();

        let edited = gate
            .edit_profile(
                &mentor,
                ProfileEdit {
                    bio: Some("Rust and distributed systems".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.status, ProfileStatus::Pending);
        assert_eq!(edited.bio.as_deref(), Some("Rust and distributed systems"));

        gate.reject(&admin, profile.mentor_id).await.unwrap();
        let resubmitted = gate
            .edit_profile(
                &mentor,
                ProfileEdit {
                    hourly_rate: Some(Decimal::new(90, 0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resubmitted.status, ProfileStatus::Pending);
        assert_eq!(resubmitted.hourly_rate, Decimal::new(90, 0));
    }

    #[tokio::test]
    async fn invalid_edits_are_refused() {
        let (gate, _store, _admin, mentor, _profile) = seeded().await;
        assert!(matches!(
            gate.edit_profile(&mentor, ProfileEdit::default()).await,
            Err(AppError::Validation(_))
        ));
        let negative = ProfileEdit {
            hourly_rate: Some(Decimal::new(-1, 0)),
            ..Default::default()
        };
        assert!(matches!(
            gate.edit_profile(&mentor, negative).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn rates_outside_currency_bounds_are_refused() {
        let (gate, store, _admin, mentor, profile) = seeded().await;
        for rate in [Decimal::MAX, Decimal::new(1, 3), Decimal::new(100_000_001, 2)] {
            let edit = ProfileEdit {
                hourly_rate: Some(rate),
                ..Default::default()
            };
            assert!(
                matches!(gate.edit_profile(&mentor, edit).await, Err(AppError::Validation(_))),
                "rate {} should be refused",
                rate
            );
        }
        let stored = store.get_mentor_profile(profile.mentor_id).await.unwrap().unwrap();
        assert_eq!(stored.hourly_rate, Decimal::new(80, 0));
    }

    #[tokio::test]
    async fn concurrent_edits_keep_each_others_fields() {
        let (gate, store, _admin, mentor, profile) = seeded().await;
        let bio = ProfileEdit {
            bio: Some("Compilers".into()),
            ..Default::default()
        };
        let rate = ProfileEdit {
            hourly_rate: Some(Decimal::new(95, 0)),
            ..Default::default()
        };
        let (a, b) = tokio::join!(gate.edit_profile(&mentor, bio), gate.edit_profile(&mentor, rate));
        a.unwrap();
        b.unwrap();

        let stored = store.get_mentor_profile(profile.mentor_id).await.unwrap().unwrap();
        assert_eq!(stored.bio.as_deref(), Some("Compilers"));
        assert_eq!(stored.hourly_rate, Decimal::new(95, 0));
        assert_eq!(stored.full_name, "Grace");
    }

    #[tokio::test]
    async fn only_admins_decide_and_suspend() {
        let (gate, store, admin, mentor, profile) = seeded().await;
        assert!(matches!(
            gate.approve(&mentor, profile.mentor_id).await,
            Err(AppError::Forbidden(_))
        ));

        let suspended = gate.suspend_user(&admin, mentor.user_id).await.unwrap();
        assert_eq!(suspended.status, AccountStatus::Suspended);
        let stored = store.get_account(mentor.user_id).await.unwrap().unwrap();
        assert!(!stored.is_active());

        gate.activate_user(&admin, mentor.user_id).await.unwrap();
        assert!(store.get_account(mentor.user_id).await.unwrap().unwrap().is_active());
    }
}
