use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use mentorbridge_common::{AppError, AppResult, Principal, UserRole};

use crate::availability::validate_slot_time;
use crate::models::{DayOfWeek, ReserveRequest, Session};
use crate::store::{BookingStore, NewReservation, ReservationOutcome};

/// Days from `today` until the next `target`. Never zero: picking today's
/// weekday books the same day next week.
pub fn days_ahead(today: DayOfWeek, target: DayOfWeek) -> u32 {
    let today = today.num_days_from_sunday();
    let target = target.num_days_from_sunday();
    match (target + 7 - today) % 7 {
        0 => 7,
        days => days,
    }
}

pub fn next_occurrence(today: NaiveDate, day: DayOfWeek, time: NaiveTime) -> DateTime<Utc> {
    let days = days_ahead(DayOfWeek::from_weekday(today.weekday()), day);
    let date = today + Duration::days(i64::from(days));
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Turns a mentee's weekday/time pick into one exclusively held session.
#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn BookingStore>,
    session_minutes: i32,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn BookingStore>, session_minutes: i32) -> Self {
        Self {
            store,
            session_minutes,
        }
    }

    pub async fn reserve(&self, principal: &Principal, request: ReserveRequest) -> AppResult<Session> {
        self.reserve_on(principal, request, Utc::now().date_naive()).await
    }

    /// Reserves relative to an explicit calendar day.
    pub async fn reserve_on(
        &self,
        principal: &Principal,
        request: ReserveRequest,
        today: NaiveDate,
    ) -> AppResult<Session> {
        principal.require_role(UserRole::Mentee)?;
        validate_slot_time(request.time_of_day)?;

        let account = self
            .store
            .get_account(principal.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", principal.user_id)))?;
        if !account.is_active() {
            tracing::warn!("Suspended mentee {} tried to book", principal.user_id);
            return Err(AppError::Forbidden("Suspended accounts cannot book sessions".to_string()));
        }
        let mentee = self
            .store
            .mentee_profile_for_user(principal.user_id)
            .await?
            .ok_or_else(|| AppError::Validation("Please complete your profile first".to_string()))?;

        // Approval, suspension and rate are checked by the store inside the reservation.
        let mentor = self
            .store
            .get_mentor_profile(request.mentor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Mentor {} not found", request.mentor_id)))?;

        let scheduled_at = next_occurrence(today, request.day_of_week, request.time_of_day);
        let reservation = NewReservation {
            session_id: Uuid::new_v4(),
            mentor_id: mentor.mentor_id,
            mentee_id: mentee.mentee_id,
            day_of_week: request.day_of_week,
            time_of_day: request.time_of_day,
            scheduled_at,
            duration_minutes: self.session_minutes,
        };

        match self.store.reserve(reservation).await? {
            ReservationOutcome::Reserved(session) => {
                tracing::info!(
                    "Mentee {} reserved session {} with mentor {} at {} for {}",
                    mentee.mentee_id,
                    session.session_id,
                    session.mentor_id,
                    session.scheduled_at,
                    session.amount
                );
                Ok(session)
            }
            ReservationOutcome::Unavailable(reason) => {
                tracing::warn!(
                    "Reservation of {} {} with mentor {} refused: {}",
                    request.day_of_week,
                    request.time_of_day,
                    mentor.mentor_id,
                    reason
                );
                Err(AppError::SlotUnavailable(reason.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn same_weekday_books_a_week_out() {
        assert_eq!(days_ahead(DayOfWeek::Wednesday, DayOfWeek::Wednesday), 7);
        for day in DayOfWeek::ALL {
            assert_eq!(days_ahead(day, day), 7);
        }
    }

    #[test]
    fn later_and_earlier_weekdays_wrap_within_a_week() {
        assert_eq!(days_ahead(DayOfWeek::Wednesday, DayOfWeek::Friday), 2);
        assert_eq!(days_ahead(DayOfWeek::Wednesday, DayOfWeek::Monday), 5);
        assert_eq!(days_ahead(DayOfWeek::Saturday, DayOfWeek::Sunday), 1);
        assert_eq!(days_ahead(DayOfWeek::Sunday, DayOfWeek::Saturday), 6);
        for today in DayOfWeek::ALL {
            for target in DayOfWeek::ALL {
                assert!((1..=7).contains(&days_ahead(today, target)));
            }
        }
    }

    #[test]
    fn next_occurrence_combines_date_and_time() {
        // 2024-05-15 is a Wednesday.
        let wednesday = date(2024, 5, 15);
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

        let same_day = next_occurrence(wednesday, DayOfWeek::Wednesday, ten);
        assert_eq!(same_day, Utc.with_ymd_and_hms(2024, 5, 22, 10, 0, 0).unwrap());

        let monday = next_occurrence(wednesday, DayOfWeek::Monday, ten);
        assert_eq!(monday, Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap());
    }
}
