//! Row shapes for the booking tables. Status columns stay as text here; the
//! booking service converts them into its own enums.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountRow {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MentorProfileRow {
    pub mentor_id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub bio: Option<String>,
    pub skills: Vec<String>, // PostgreSQL text array
    pub experience: Option<String>,
    pub hourly_rate: Decimal,
    pub profile_image: Option<String>,
    pub category_ids: Vec<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MenteeProfileRow {
    pub mentee_id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvailabilitySlotRow {
    pub slot_id: Uuid,
    pub mentor_id: Uuid,
    pub day_of_week: i16,
    pub time_of_day: NaiveTime,
    pub is_enabled: bool,
    pub active_session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub amount: Decimal,
    pub status: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedbackRow {
    pub feedback_id: Uuid,
    pub session_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Paid volume per mentor, as aggregated by the revenue queries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MentorVolumeRow {
    pub mentor_id: Uuid,
    pub full_name: String,
    pub paid_sessions: i64,
    pub paid_volume: Decimal,
}
