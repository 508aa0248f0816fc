use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use mentorbridge_common::{AppError, AppResult};
use mentorbridge_database::{
    AccountRow, AvailabilitySlotRow, FeedbackRow, MenteeProfileRow, MentorProfileRow,
    MentorVolumeRow, SessionRow,
};

use crate::availability::crowding_slot;
use crate::models::{
    Account, AccountStatus, AvailabilitySlot, Feedback, MenteeProfile, MentorProfile,
    ProfileEdit, ProfileStatus, Session, SessionStatus, SlotView,
};
use crate::revenue::compute_charge;

use super::{
    BookingStore, EditedProfile, FeedbackOutcome, MentorVolume, NewReservation, PaidVolume, RatingSummary,
    ReservationOutcome, SessionTransition, SessionWithFeedback, SlotChange, SlotInsertOutcome,
    TransitionOutcome, UnavailableReason,
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(code))
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(FromRow)]
struct EditedProfileRow {
    #[sqlx(flatten)]
    profile: MentorProfileRow,
    previous_status: String,
}

#[derive(FromRow)]
struct SlotViewRow {
    #[sqlx(flatten)]
    slot: AvailabilitySlotRow,
    has_booking: bool,
    awaiting_feedback: bool,
}

impl From<MentorVolumeRow> for MentorVolume {
    fn from(row: MentorVolumeRow) -> Self {
        Self {
            mentor_id: row.mentor_id,
            full_name: row.full_name,
            paid_sessions: row.paid_sessions,
            paid_volume: row.paid_volume,
        }
    }
}

/// Postgres-backed store. Multi-step writes run in one transaction; slot
/// changes are conditional updates re-checked by the database at write time.
#[derive(Clone)]
pub struct PgBookingStore {
    db_pool: PgPool,
}

impl PgBookingStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Works out why a conditional slot update touched no rows.
    async fn slot_refusal<T>(&self, slot_id: Uuid, mentor_id: Uuid) -> AppResult<SlotChange<T>> {
        let owner: Option<(Uuid, Option<Uuid>)> = sqlx::query_as(
            "SELECT mentor_id, active_session_id FROM availability_slots WHERE slot_id = $1",
        )
        .bind(slot_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(match owner {
            None => SlotChange::Missing,
            Some((owner, _)) if owner != mentor_id => SlotChange::NotOwner,
            Some(_) => SlotChange::Occupied,
        })
    }

    async fn session_status(&self, session_id: Uuid) -> AppResult<Option<SessionStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM sessions WHERE session_id = $1")
                .bind(session_id)
                .fetch_optional(&self.db_pool)
                .await?;
        status.map(|s| s.parse::<SessionStatus>()).transpose()
    }

    async fn reserve_in(
        tx: &mut Transaction<'_, Postgres>,
        reservation: &NewReservation,
    ) -> AppResult<ReservationOutcome> {
        // Shared locks hold off profile edits and suspensions until commit.
        let mentor: Option<(String, Decimal, String)> = sqlx::query_as(
            r#"
            SELECT p.status, p.hourly_rate, u.status
            FROM mentor_profiles p
            JOIN users u ON u.user_id = p.user_id
            WHERE p.mentor_id = $1
            FOR SHARE OF p, u
            "#,
        )
        .bind(reservation.mentor_id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some((profile_status, hourly_rate, account_status)) = mentor else {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::MentorUnavailable));
        };
        if profile_status.parse::<ProfileStatus>()? != ProfileStatus::Approved
            || account_status.parse::<AccountStatus>()? != AccountStatus::Active
        {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::MentorUnavailable));
        }
        let amount = compute_charge(hourly_rate)?;

        // Row lock serialises reservations racing for the same weekly slot.
        let slot: Option<AvailabilitySlotRow> = sqlx::query_as(
            r#"
            SELECT * FROM availability_slots
            WHERE mentor_id = $1 AND day_of_week = $2 AND time_of_day = $3
            FOR UPDATE
            "#,
        )
        .bind(reservation.mentor_id)
        .bind(reservation.day_of_week.num_days_from_monday() as i16)
        .bind(reservation.time_of_day)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(slot) = slot else {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::NoSuchSlot));
        };
        if !slot.is_enabled {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::SlotDisabled));
        }
        if slot.active_session_id.is_some() {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::SlotOccupied));
        }

        let inserted = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions
                (session_id, mentor_id, mentee_id, slot_id, scheduled_at, duration_minutes,
                 amount, status, payment_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', 'pending')
            RETURNING *
            "#,
        )
        .bind(reservation.session_id)
        .bind(reservation.mentor_id)
        .bind(reservation.mentee_id)
        .bind(slot.slot_id)
        .bind(reservation.scheduled_at)
        .bind(reservation.duration_minutes)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await;

        let session = match inserted {
            Ok(row) => Session::try_from(row)?,
            Err(err) if has_code(&err, UNIQUE_VIOLATION) => {
                return Ok(ReservationOutcome::Unavailable(UnavailableReason::OccurrenceTaken));
            }
            Err(err) => return Err(err.into()),
        };

        let claimed = sqlx::query(
            r#"
            UPDATE availability_slots
            SET active_session_id = $2, updated_at = NOW()
            WHERE slot_id = $1 AND is_enabled AND active_session_id IS NULL
            "#,
        )
        .bind(slot.slot_id)
        .bind(session.session_id)
        .execute(&mut **tx)
        .await?;

        if claimed.rows_affected() == 0 {
            return Ok(ReservationOutcome::Unavailable(UnavailableReason::SlotOccupied));
        }
        Ok(ReservationOutcome::Reserved(session))
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert_account(&self, account: Account) -> AppResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO users (user_id, email, role, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(account.user_id)
        .bind(&account.email)
        .bind(account.role.as_str())
        .bind(account.status.as_str())
        .fetch_one(&self.db_pool)
        .await
        .map_err(|err| {
            if has_code(&err, UNIQUE_VIOLATION) {
                AppError::Conflict(format!("Account {} already exists", account.email))
            } else {
                AppError::Database(err)
            }
        })?;
        Account::try_from(row)
    }

    async fn get_account(&self, user_id: Uuid) -> AppResult<Option<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn set_account_status(
        &self,
        user_id: Uuid,
        status: AccountStatus,
    ) -> AppResult<Option<Account>> {
        sqlx::query_as::<_, AccountRow>(
            "UPDATE users SET status = $2, updated_at = NOW() WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(status.as_str())
        .fetch_optional(&self.db_pool)
        .await?
        .map(Account::try_from)
        .transpose()
    }

    async fn insert_mentor_profile(&self, profile: MentorProfile) -> AppResult<MentorProfile> {
        let row = sqlx::query_as::<_, MentorProfileRow>(
            r#"
            INSERT INTO mentor_profiles
                (mentor_id, user_id, full_name, bio, skills, experience, hourly_rate,
                 profile_image, category_ids, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(profile.mentor_id)
        .bind(profile.user_id)
        .bind(&profile.full_name)
        .bind(&profile.bio)
        .bind(&profile.skills)
        .bind(&profile.experience)
        .bind(profile.hourly_rate)
        .bind(&profile.profile_image)
        .bind(&profile.category_ids)
        .bind(profile.status.as_str())
        .fetch_one(&self.db_pool)
        .await
        .map_err(|err| {
            if has_code(&err, UNIQUE_VIOLATION) {
                AppError::Conflict(format!("User {} already has a mentor profile", profile.user_id))
            } else if has_code(&err, FOREIGN_KEY_VIOLATION) {
                AppError::NotFound(format!("Account {} not found", profile.user_id))
            } else {
                AppError::Database(err)
            }
        })?;
        MentorProfile::try_from(row)
    }

    async fn get_mentor_profile(&self, mentor_id: Uuid) -> AppResult<Option<MentorProfile>> {
        sqlx::query_as::<_, MentorProfileRow>("SELECT * FROM mentor_profiles WHERE mentor_id = $1")
            .bind(mentor_id)
            .fetch_optional(&self.db_pool)
            .await?
            .map(MentorProfile::try_from)
            .transpose()
    }

    async fn mentor_profile_for_user(&self, user_id: Uuid) -> AppResult<Option<MentorProfile>> {
        sqlx::query_as::<_, MentorProfileRow>("SELECT * FROM mentor_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .map(MentorProfile::try_from)
            .transpose()
    }

    async fn apply_profile_edit(
        &self,
        user_id: Uuid,
        edit: ProfileEdit,
    ) -> AppResult<Option<EditedProfile>> {
        // Absent fields keep their stored value; the whole edit is one statement.
        let row = sqlx::query_as::<_, EditedProfileRow>(
            r#"
            WITH previous AS (
                SELECT mentor_id, status FROM mentor_profiles WHERE user_id = $1 FOR UPDATE
            )
            UPDATE mentor_profiles p
            SET full_name = COALESCE($2, p.full_name),
                bio = COALESCE($3, p.bio),
                skills = COALESCE($4, p.skills),
                experience = COALESCE($5, p.experience),
                hourly_rate = COALESCE($6, p.hourly_rate),
                profile_image = COALESCE($7, p.profile_image),
                category_ids = COALESCE($8, p.category_ids),
                status = $9,
                updated_at = NOW()
            FROM previous
            WHERE p.mentor_id = previous.mentor_id
            RETURNING p.*, previous.status AS previous_status
            "#,
        )
        .bind(user_id)
        .bind(edit.full_name)
        .bind(edit.bio)
        .bind(edit.skills)
        .bind(edit.experience)
        .bind(edit.hourly_rate)
        .bind(edit.profile_image)
        .bind(edit.category_ids)
        .bind(ProfileStatus::Pending.as_str())
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(|row| {
            Ok(EditedProfile {
                previous: row.previous_status.parse()?,
                profile: MentorProfile::try_from(row.profile)?,
            })
        })
        .transpose()
    }

    async fn transition_profile_status(
        &self,
        mentor_id: Uuid,
        from: ProfileStatus,
        to: ProfileStatus,
    ) -> AppResult<TransitionOutcome<MentorProfile, ProfileStatus>> {
        let updated = sqlx::query_as::<_, MentorProfileRow>(
            r#"
            UPDATE mentor_profiles SET status = $2, updated_at = NOW()
            WHERE mentor_id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(mentor_id)
        .bind(to.as_str())
        .bind(from.as_str())
        .fetch_optional(&self.db_pool)
        .await?;

        if let Some(row) = updated {
            return Ok(TransitionOutcome::Applied(MentorProfile::try_from(row)?));
        }
        Ok(match self.get_mentor_profile(mentor_id).await? {
            Some(profile) => TransitionOutcome::Current(profile.status),
            None => TransitionOutcome::Missing,
        })
    }

    async fn list_mentor_profiles(&self, status: ProfileStatus) -> AppResult<Vec<MentorProfile>> {
        let rows = sqlx::query_as::<_, MentorProfileRow>(
            "SELECT * FROM mentor_profiles WHERE status = $1 ORDER BY created_at",
        )
        .bind(status.as_str())
        .fetch_all(&self.db_pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_mentee_profile(&self, profile: MenteeProfile) -> AppResult<MenteeProfile> {
        let row = sqlx::query_as::<_, MenteeProfileRow>(
            r#"
            INSERT INTO mentee_profiles (mentee_id, user_id, full_name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(profile.mentee_id)
        .bind(profile.user_id)
        .bind(&profile.full_name)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|err| {
            if has_code(&err, UNIQUE_VIOLATION) {
                AppError::Conflict(format!("User {} already has a mentee profile", profile.user_id))
            } else if has_code(&err, FOREIGN_KEY_VIOLATION) {
                AppError::NotFound(format!("Account {} not found", profile.user_id))
            } else {
                AppError::Database(err)
            }
        })?;
        Ok(row.into())
    }

    async fn mentee_profile_for_user(&self, user_id: Uuid) -> AppResult<Option<MenteeProfile>> {
        let row = sqlx::query_as::<_, MenteeProfileRow>(
            "SELECT * FROM mentee_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row.map(MenteeProfile::from))
    }

    async fn insert_slot(&self, slot: AvailabilitySlot) -> AppResult<SlotInsertOutcome> {
        let mut tx = self.db_pool.begin().await?;

        // Serialise slot edits per mentor so the spacing check sees committed state.
        let mentor: Option<Uuid> = sqlx::query_scalar(
            "SELECT mentor_id FROM mentor_profiles WHERE mentor_id = $1 FOR NO KEY UPDATE",
        )
        .bind(slot.mentor_id)
        .fetch_optional(&mut *tx)
        .await?;
        if mentor.is_none() {
            return Err(AppError::NotFound(format!("Mentor {} not found", slot.mentor_id)));
        }

        let rows = sqlx::query_as::<_, AvailabilitySlotRow>(
            "SELECT * FROM availability_slots WHERE mentor_id = $1 AND day_of_week = $2",
        )
        .bind(slot.mentor_id)
        .bind(slot.day_of_week.num_days_from_monday() as i16)
        .fetch_all(&mut *tx)
        .await?;
        let same_day: Vec<AvailabilitySlot> = convert_all(rows)?;

        if same_day.iter().any(|s| s.time_of_day == slot.time_of_day) {
            tx.rollback().await?;
            return Ok(SlotInsertOutcome::Duplicate);
        }
        if let Some(existing) = crowding_slot(&same_day, slot.day_of_week, slot.time_of_day) {
            let existing = existing.time_of_day;
            tx.rollback().await?;
            return Ok(SlotInsertOutcome::TooClose { existing });
        }

        let row = sqlx::query_as::<_, AvailabilitySlotRow>(
            r#"
            INSERT INTO availability_slots (slot_id, mentor_id, day_of_week, time_of_day, is_enabled)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(slot.slot_id)
        .bind(slot.mentor_id)
        .bind(slot.day_of_week.num_days_from_monday() as i16)
        .bind(slot.time_of_day)
        .bind(slot.is_enabled)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(SlotInsertOutcome::Inserted(AvailabilitySlot::try_from(row)?))
    }

    async fn get_slot(&self, slot_id: Uuid) -> AppResult<Option<AvailabilitySlot>> {
        sqlx::query_as::<_, AvailabilitySlotRow>("SELECT * FROM availability_slots WHERE slot_id = $1")
            .bind(slot_id)
            .fetch_optional(&self.db_pool)
            .await?
            .map(AvailabilitySlot::try_from)
            .transpose()
    }

    async fn list_slots(&self, mentor_id: Uuid) -> AppResult<Vec<SlotView>> {
        let rows = sqlx::query_as::<_, SlotViewRow>(
            r#"
            SELECT a.*,
                   a.active_session_id IS NOT NULL AS has_booking,
                   EXISTS (
                       SELECT 1 FROM sessions s
                       LEFT JOIN feedback f ON f.session_id = s.session_id
                       WHERE s.slot_id = a.slot_id
                         AND s.status = 'completed'
                         AND f.feedback_id IS NULL
                   ) AS awaiting_feedback
            FROM availability_slots a
            WHERE a.mentor_id = $1
            ORDER BY a.day_of_week, a.time_of_day
            "#,
        )
        .bind(mentor_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SlotView {
                    slot: AvailabilitySlot::try_from(row.slot)?,
                    has_booking: row.has_booking,
                    awaiting_feedback: row.awaiting_feedback,
                })
            })
            .collect()
    }

    async fn toggle_slot(
        &self,
        slot_id: Uuid,
        mentor_id: Uuid,
    ) -> AppResult<SlotChange<AvailabilitySlot>> {
        let updated = sqlx::query_as::<_, AvailabilitySlotRow>(
            r#"
            UPDATE availability_slots
            SET is_enabled = NOT is_enabled, updated_at = NOW()
            WHERE slot_id = $1 AND mentor_id = $2 AND active_session_id IS NULL
            RETURNING *
            "#,
        )
        .bind(slot_id)
        .bind(mentor_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match updated {
            Some(row) => Ok(SlotChange::Applied(AvailabilitySlot::try_from(row)?)),
            None => self.slot_refusal(slot_id, mentor_id).await,
        }
    }

    async fn delete_slot(&self, slot_id: Uuid, mentor_id: Uuid) -> AppResult<SlotChange<()>> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM availability_slots
            WHERE slot_id = $1 AND mentor_id = $2 AND active_session_id IS NULL
            "#,
        )
        .bind(slot_id)
        .bind(mentor_id)
        .execute(&self.db_pool)
        .await?;

        if deleted.rows_affected() > 0 {
            Ok(SlotChange::Applied(()))
        } else {
            self.slot_refusal(slot_id, mentor_id).await
        }
    }

    async fn reserve(&self, reservation: NewReservation) -> AppResult<ReservationOutcome> {
        let mut tx = self.db_pool.begin().await?;
        let outcome = Self::reserve_in(&mut tx, &reservation).await?;

        match outcome {
            ReservationOutcome::Reserved(_) => tx.commit().await?,
            ReservationOutcome::Unavailable(_) => tx.rollback().await?,
        }
        Ok(outcome)
    }

    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.db_pool)
            .await?
            .map(Session::try_from)
            .transpose()
    }

    async fn transition_session(
        &self,
        session_id: Uuid,
        transition: SessionTransition,
    ) -> AppResult<TransitionOutcome<Session, SessionStatus>> {
        let mut tx = self.db_pool.begin().await?;

        let updated = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions
            SET status = $2,
                payment_status = CASE WHEN $3 THEN 'paid' ELSE payment_status END,
                updated_at = NOW()
            WHERE session_id = $1 AND status = $4
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(transition.to().as_str())
        .bind(transition.marks_paid())
        .bind(transition.from().as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            tx.rollback().await?;
            return Ok(match self.session_status(session_id).await? {
                Some(status) => TransitionOutcome::Current(status),
                None => TransitionOutcome::Missing,
            });
        };

        if transition.releases_slot() {
            sqlx::query(
                r#"
                UPDATE availability_slots
                SET active_session_id = NULL, updated_at = NOW()
                WHERE active_session_id = $1
                "#,
            )
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied(Session::try_from(row)?))
    }

    async fn sessions_for_mentor(&self, mentor_id: Uuid) -> AppResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE mentor_id = $1 ORDER BY scheduled_at",
        )
        .bind(mentor_id)
        .fetch_all(&self.db_pool)
        .await?;
        convert_all(rows)
    }

    async fn sessions_for_mentee(&self, mentee_id: Uuid) -> AppResult<Vec<SessionWithFeedback>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE mentee_id = $1 ORDER BY scheduled_at DESC",
        )
        .bind(mentee_id)
        .fetch_all(&self.db_pool)
        .await?;
        let sessions: Vec<Session> = convert_all(rows)?;

        let ids: Vec<Uuid> = sessions.iter().map(|s| s.session_id).collect();
        let feedback_rows = sqlx::query_as::<_, FeedbackRow>(
            "SELECT * FROM feedback WHERE session_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.db_pool)
        .await?;
        let mut feedback: HashMap<Uuid, Feedback> = convert_all::<_, Feedback>(feedback_rows)?
            .into_iter()
            .map(|f| (f.session_id, f))
            .collect();

        Ok(sessions
            .into_iter()
            .map(|session| SessionWithFeedback {
                feedback: feedback.remove(&session.session_id),
                session,
            })
            .collect())
    }

    async fn count_sessions_for_mentor(&self, mentor_id: Uuid) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE mentor_id = $1")
            .bind(mentor_id)
            .fetch_one(&self.db_pool)
            .await?)
    }

    async fn insert_feedback(&self, feedback: Feedback) -> AppResult<FeedbackOutcome> {
        let mut tx = self.db_pool.begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM sessions WHERE session_id = $1 FOR UPDATE")
                .bind(feedback.session_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(status) = status else {
            tx.rollback().await?;
            return Ok(FeedbackOutcome::MissingSession);
        };
        let status: SessionStatus = status.parse()?;
        if status != SessionStatus::Completed {
            tx.rollback().await?;
            return Ok(FeedbackOutcome::NotCompleted(status));
        }

        let inserted = sqlx::query_as::<_, FeedbackRow>(
            r#"
            INSERT INTO feedback (feedback_id, session_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(feedback.feedback_id)
        .bind(feedback.session_id)
        .bind(i16::from(feedback.rating))
        .bind(&feedback.comment)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(row) => {
                tx.commit().await?;
                Ok(FeedbackOutcome::Recorded(Feedback::try_from(row)?))
            }
            Err(err) if has_code(&err, UNIQUE_VIOLATION) => {
                tx.rollback().await?;
                Ok(FeedbackOutcome::AlreadySubmitted)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn feedback_for_session(&self, session_id: Uuid) -> AppResult<Option<Feedback>> {
        sqlx::query_as::<_, FeedbackRow>("SELECT * FROM feedback WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.db_pool)
            .await?
            .map(Feedback::try_from)
            .transpose()
    }

    async fn recent_feedback_for_mentor(
        &self,
        mentor_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT f.* FROM feedback f
            JOIN sessions s ON s.session_id = f.session_id
            WHERE s.mentor_id = $1
            ORDER BY f.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(mentor_id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;
        convert_all(rows)
    }

    async fn rating_summary(&self, mentor_id: Uuid) -> AppResult<RatingSummary> {
        let (average, count): (Option<Decimal>, i64) = sqlx::query_as(
            r#"
            SELECT ROUND(AVG(f.rating)::numeric, 2), COUNT(f.feedback_id)
            FROM feedback f
            JOIN sessions s ON s.session_id = f.session_id
            WHERE s.mentor_id = $1
            "#,
        )
        .bind(mentor_id)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(RatingSummary { average, count })
    }

    async fn paid_volume(&self, mentor_id: Option<Uuid>) -> AppResult<PaidVolume> {
        let (sessions, volume): (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(amount), 0)
            FROM sessions
            WHERE payment_status = 'paid' AND ($1::uuid IS NULL OR mentor_id = $1)
            "#,
        )
        .bind(mentor_id)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(PaidVolume { sessions, volume })
    }

    async fn top_mentors_by_volume(&self, limit: i64) -> AppResult<Vec<MentorVolume>> {
        let rows = sqlx::query_as::<_, MentorVolumeRow>(
            r#"
            SELECT mp.mentor_id, mp.full_name,
                   COUNT(s.session_id) AS paid_sessions,
                   COALESCE(SUM(s.amount), 0) AS paid_volume
            FROM mentor_profiles mp
            LEFT JOIN sessions s ON s.mentor_id = mp.mentor_id AND s.payment_status = 'paid'
            WHERE mp.status = 'approved'
            GROUP BY mp.mentor_id, mp.full_name
            ORDER BY paid_volume DESC, mp.full_name, mp.mentor_id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows.into_iter().map(MentorVolume::from).collect())
    }

    async fn count_sessions(&self, status: SessionStatus) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.db_pool)
            .await?)
    }

    async fn count_mentors(&self, status: ProfileStatus) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM mentor_profiles WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.db_pool)
            .await?)
    }
}
