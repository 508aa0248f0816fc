use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveTime, Timelike};
use uuid::Uuid;

use mentorbridge_common::{AppError, AppResult, Principal, UserRole};

use crate::models::{
    AddSlotRequest, AvailabilitySlot, BookableDay, DayOfWeek, DaySchedule, MentorProfile,
};
use crate::store::{BookingStore, SlotChange, SlotInsertOutcome};

/// Enabled slots on the same day must start at least this many hours apart.
pub const MIN_SLOT_SPACING_HOURS: u32 = 1;

/// Slot times are whole hours.
pub fn validate_slot_time(time: NaiveTime) -> AppResult<()> {
    if time.minute() != 0 || time.second() != 0 || time.nanosecond() != 0 {
        return Err(AppError::Validation(format!(
            "Slot times must fall on the hour, got {}",
            time.format("%H:%M:%S")
        )));
    }
    Ok(())
}

/// Finds an enabled slot on `day` whose hour is closer than the minimum spacing to `time`.
pub fn crowding_slot<'a, I>(existing: I, day: DayOfWeek, time: NaiveTime) -> Option<&'a AvailabilitySlot>
where
    I: IntoIterator<Item = &'a AvailabilitySlot>,
{
    existing.into_iter().find(|slot| {
        slot.is_enabled
            && slot.day_of_week == day
            && slot.hour().abs_diff(time.hour()) < MIN_SLOT_SPACING_HOURS
    })
}

/// Owns each mentor's weekly recurring slots.
#[derive(Clone)]
pub struct AvailabilityRegistry {
    store: Arc<dyn BookingStore>,
}

impl AvailabilityRegistry {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn add_slot(
        &self,
        principal: &Principal,
        request: AddSlotRequest,
    ) -> AppResult<AvailabilitySlot> {
        let mentor = self.acting_mentor(principal).await?;
        validate_slot_time(request.time_of_day)?;

        let slot = AvailabilitySlot::new(mentor.mentor_id, request.day_of_week, request.time_of_day);
        match self.store.insert_slot(slot).await? {
            SlotInsertOutcome::Inserted(slot) => {
                tracing::info!(
                    "Mentor {} added slot {} on {} at {}",
                    mentor.mentor_id,
                    slot.slot_id,
                    slot.day_of_week,
                    slot.time_of_day
                );
                Ok(slot)
            }
            SlotInsertOutcome::Duplicate => Err(AppError::Conflict(format!(
                "A slot on {} at {} already exists",
                request.day_of_week, request.time_of_day
            ))),
            SlotInsertOutcome::TooClose { existing } => Err(AppError::Conflict(format!(
                "Time slots must be at least {} hour apart; {} on {} is too close",
                MIN_SLOT_SPACING_HOURS, existing, request.day_of_week
            ))),
        }
    }

    pub async fn toggle_slot(&self, principal: &Principal, slot_id: Uuid) -> AppResult<AvailabilitySlot> {
        let mentor = self.acting_mentor(principal).await?;
        let slot = expect_applied(
            self.store.toggle_slot(slot_id, mentor.mentor_id).await?,
            slot_id,
            "toggled",
        )?;
        tracing::info!(
            "Slot {} is now {}",
            slot.slot_id,
            if slot.is_enabled { "enabled" } else { "disabled" }
        );
        Ok(slot)
    }

    pub async fn delete_slot(&self, principal: &Principal, slot_id: Uuid) -> AppResult<()> {
        let mentor = self.acting_mentor(principal).await?;
        expect_applied(
            self.store.delete_slot(slot_id, mentor.mentor_id).await?,
            slot_id,
            "deleted",
        )?;
        tracing::info!("Mentor {} deleted slot {}", mentor.mentor_id, slot_id);
        Ok(())
    }

    /// The acting mentor's own slots, grouped Monday to Sunday.
    pub async fn list_slots(&self, principal: &Principal) -> AppResult<Vec<DaySchedule>> {
        let mentor = self.acting_mentor(principal).await?;
        let views = self.store.list_slots(mentor.mentor_id).await?;
        tracing::debug!("Listing {} slots for mentor {}", views.len(), mentor.mentor_id);

        let mut days: BTreeMap<DayOfWeek, Vec<_>> = BTreeMap::new();
        for view in views {
            days.entry(view.slot.day_of_week).or_default().push(view);
        }
        Ok(days
            .into_iter()
            .map(|(day_of_week, mut slots)| {
                slots.sort_by_key(|view| view.slot.time_of_day);
                DaySchedule { day_of_week, slots }
            })
            .collect())
    }

    /// Open times a mentee may pick from. Empty unless the mentor takes bookings.
    pub async fn list_bookable_slots(&self, mentor_id: Uuid) -> AppResult<Vec<BookableDay>> {
        let mentor = self
            .store
            .get_mentor_profile(mentor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Mentor {} not found", mentor_id)))?;
        let account = self
            .store
            .get_account(mentor.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account for mentor {} not found", mentor_id)))?;
        if !mentor.accepts_new_bookings(&account) {
            tracing::debug!("Mentor {} is not bookable right now", mentor_id);
            return Ok(Vec::new());
        }

        let mut days: BTreeMap<DayOfWeek, Vec<NaiveTime>> = BTreeMap::new();
        for view in self.store.list_slots(mentor_id).await? {
            if view.slot.is_bookable() {
                days.entry(view.slot.day_of_week)
                    .or_default()
                    .push(view.slot.time_of_day);
            }
        }
        Ok(days
            .into_iter()
            .map(|(day_of_week, mut times)| {
                times.sort();
                BookableDay { day_of_week, times }
            })
            .collect())
    }

    async fn acting_mentor(&self, principal: &Principal) -> AppResult<MentorProfile> {
        principal.require_role(UserRole::Mentor)?;
        self.store
            .mentor_profile_for_user(principal.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Complete your mentor profile first".to_string()))
    }
}

fn expect_applied<T>(change: SlotChange<T>, slot_id: Uuid, action: &str) -> AppResult<T> {
    match change {
        SlotChange::Applied(value) => Ok(value),
        SlotChange::Missing => Err(AppError::NotFound(format!("Slot {} not found", slot_id))),
        SlotChange::NotOwner => Err(AppError::Forbidden(format!(
            "Slot {} belongs to another mentor",
            slot_id
        ))),
        SlotChange::Occupied => {
            tracing::warn!("Slot {} cannot be {} while a session holds it", slot_id, action);
            Err(AppError::InUse(format!(
                "Slot {} has a pending or confirmed session and cannot be {}",
                slot_id, action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn slot_times_must_be_whole_hours() {
        assert!(validate_slot_time(at(9)).is_ok());
        assert!(validate_slot_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap()).is_err());
        assert!(validate_slot_time(NaiveTime::from_hms_opt(9, 0, 15).unwrap()).is_err());
    }

    #[test]
    fn disabled_and_other_day_slots_do_not_crowd() {
        let mentor = Uuid::new_v4();
        let mut disabled = AvailabilitySlot::new(mentor, DayOfWeek::Monday, at(10));
        disabled.is_enabled = false;
        let tuesday = AvailabilitySlot::new(mentor, DayOfWeek::Tuesday, at(10));
        let existing = vec![disabled, tuesday];

        assert!(crowding_slot(&existing, DayOfWeek::Monday, at(10)).is_none());
        assert!(crowding_slot(&existing, DayOfWeek::Tuesday, at(10)).is_some());
        assert!(crowding_slot(&existing, DayOfWeek::Tuesday, at(11)).is_none());
    }

    #[test]
    fn random_insertions_keep_enabled_slots_an_hour_apart() {
        let mut rng = StdRng::seed_from_u64(0x5107);
        let mentor = Uuid::new_v4();

        for _ in 0..50 {
            let mut accepted: Vec<AvailabilitySlot> = Vec::new();
            for _ in 0..40 {
                let day = DayOfWeek::ALL[rng.gen_range(0..7)];
                let time = at(rng.gen_range(0..24));
                if crowding_slot(&accepted, day, time).is_none() {
                    accepted.push(AvailabilitySlot::new(mentor, day, time));
                }
            }

            for a in &accepted {
                for b in &accepted {
                    if a.slot_id != b.slot_id && a.day_of_week == b.day_of_week {
                        assert!(a.hour().abs_diff(b.hour()) >= MIN_SLOT_SPACING_HOURS);
                    }
                }
            }
        }
    }
}
