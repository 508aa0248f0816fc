use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use rust_decimal::Decimal;

use mentorbridge_common::{AppError, UserRole};
use mentorbridge_database::{
    AccountRow, AvailabilitySlotRow, FeedbackRow, MenteeProfileRow, MentorProfileRow, SessionRow,
};

// Calendar
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Monday = 0 .. Sunday = 6; the stored form and the listing order.
    pub fn num_days_from_monday(self) -> u32 {
        self.weekday().num_days_from_monday()
    }

    /// Sunday = 0 .. Saturday = 6; the index used for next-occurrence arithmetic.
    pub fn num_days_from_sunday(self) -> u32 {
        self.weekday().num_days_from_sunday()
    }

    pub fn from_monday_index(index: i16) -> Result<Self, AppError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| AppError::Internal(format!("Invalid stored day_of_week: {}", index)))
    }

    pub fn weekday(self) -> Weekday {
        match self {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        Self::ALL[weekday.num_days_from_monday() as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| {
                let name = day.name().to_ascii_lowercase();
                name == lowered || name[..3] == lowered
            })
            .ok_or_else(|| AppError::Validation(format!("Unknown day of week: {}", s)))
    }
}

// Accounts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
        }
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            other => Err(AppError::Internal(format!("Invalid account status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(user_id: Uuid, email: impl Into<String>, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email: email.into(),
            role,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

// Profiles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStatus::Pending => "pending",
            ProfileStatus::Approved => "approved",
            ProfileStatus::Rejected => "rejected",
        }
    }
}

impl ProfileStatus {
    /// Any edit sends the profile back for review before new bookings resume.
    pub fn after_edit(self) -> ProfileStatus {
        ProfileStatus::Pending
    }
}

impl std::str::FromStr for ProfileStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProfileStatus::Pending),
            "approved" => Ok(ProfileStatus::Approved),
            "rejected" => Ok(ProfileStatus::Rejected),
            other => Err(AppError::Internal(format!("Invalid profile status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorProfile {
    pub mentor_id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub experience: Option<String>,
    pub hourly_rate: Decimal,
    pub profile_image: Option<String>,
    pub category_ids: Vec<Uuid>,
    pub status: ProfileStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MentorProfile {
    pub fn new(user_id: Uuid, full_name: impl Into<String>, hourly_rate: Decimal) -> Self {
        let now = Utc::now();
        Self {
            mentor_id: Uuid::new_v4(),
            user_id,
            full_name: full_name.into(),
            bio: None,
            skills: Vec::new(),
            experience: None,
            hourly_rate,
            profile_image: None,
            category_ids: Vec::new(),
            status: ProfileStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Only approved mentors with an active account take new bookings.
    pub fn accepts_new_bookings(&self, account: &Account) -> bool {
        self.status == ProfileStatus::Approved && account.is_active()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenteeProfile {
    pub mentee_id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl MenteeProfile {
    pub fn new(user_id: Uuid, full_name: impl Into<String>) -> Self {
        Self {
            mentee_id: Uuid::new_v4(),
            user_id,
            full_name: full_name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Mentor-editable profile fields; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileEdit {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub experience: Option<String>,
    pub hourly_rate: Option<Decimal>,
    pub profile_image: Option<String>,
    pub category_ids: Option<Vec<Uuid>>,
}

impl ProfileEdit {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.bio.is_none()
            && self.skills.is_none()
            && self.experience.is_none()
            && self.hourly_rate.is_none()
            && self.profile_image.is_none()
            && self.category_ids.is_none()
    }

    pub fn apply_to(self, profile: &mut MentorProfile) {
        if let Some(full_name) = self.full_name {
            profile.full_name = full_name;
        }
        if let Some(bio) = self.bio {
            profile.bio = Some(bio);
        }
        if let Some(skills) = self.skills {
            profile.skills = skills;
        }
        if let Some(experience) = self.experience {
            profile.experience = Some(experience);
        }
        if let Some(hourly_rate) = self.hourly_rate {
            profile.hourly_rate = hourly_rate;
        }
        if let Some(profile_image) = self.profile_image {
            profile.profile_image = Some(profile_image);
        }
        if let Some(category_ids) = self.category_ids {
            profile.category_ids = category_ids;
        }
    }
}

// Availability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub slot_id: Uuid,
    pub mentor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub time_of_day: NaiveTime,
    pub is_enabled: bool,
    /// The pending or confirmed session currently holding this slot.
    pub active_session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn new(mentor_id: Uuid, day_of_week: DayOfWeek, time_of_day: NaiveTime) -> Self {
        let now = Utc::now();
        Self {
            slot_id: Uuid::new_v4(),
            mentor_id,
            day_of_week,
            time_of_day,
            is_enabled: true,
            active_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.active_session_id.is_some()
    }

    pub fn is_bookable(&self) -> bool {
        self.is_enabled && !self.is_occupied()
    }

    pub fn hour(&self) -> u32 {
        self.time_of_day.hour()
    }
}

/// A slot as the owning mentor sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotView {
    #[serde(flatten)]
    pub slot: AvailabilitySlot,
    pub has_booking: bool,
    pub awaiting_feedback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day_of_week: DayOfWeek,
    pub slots: Vec<SlotView>,
}

/// Open times for one weekday, as a mentee sees them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookableDay {
    pub day_of_week: DayOfWeek,
    pub times: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSlotRequest {
    pub day_of_week: DayOfWeek,
    pub time_of_day: NaiveTime,
}

// Sessions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Pending and confirmed sessions hold their slot and their start time.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Confirmed)
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "confirmed" => Ok(SessionStatus::Confirmed),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(AppError::Internal(format!("Invalid session status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(AppError::Internal(format!("Invalid payment status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    /// Fee-inclusive charge, frozen when the session is created.
    pub amount: Decimal,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub mentor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub time_of_day: NaiveTime,
}

// Feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub feedback_id: Uuid,
    pub session_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

// Row conversions
impl TryFrom<AccountRow> for Account {
    type Error = AppError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id,
            email: row.email,
            role: row.role.parse()?,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<MentorProfileRow> for MentorProfile {
    type Error = AppError;

    fn try_from(row: MentorProfileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            mentor_id: row.mentor_id,
            user_id: row.user_id,
            full_name: row.full_name,
            bio: row.bio,
            skills: row.skills,
            experience: row.experience,
            hourly_rate: row.hourly_rate,
            profile_image: row.profile_image,
            category_ids: row.category_ids,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<MenteeProfileRow> for MenteeProfile {
    fn from(row: MenteeProfileRow) -> Self {
        Self {
            mentee_id: row.mentee_id,
            user_id: row.user_id,
            full_name: row.full_name,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<AvailabilitySlotRow> for AvailabilitySlot {
    type Error = AppError;

    fn try_from(row: AvailabilitySlotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            slot_id: row.slot_id,
            mentor_id: row.mentor_id,
            day_of_week: DayOfWeek::from_monday_index(row.day_of_week)?,
            time_of_day: row.time_of_day,
            is_enabled: row.is_enabled,
            active_session_id: row.active_session_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            session_id: row.session_id,
            mentor_id: row.mentor_id,
            mentee_id: row.mentee_id,
            slot_id: row.slot_id,
            scheduled_at: row.scheduled_at,
            duration_minutes: row.duration_minutes,
            amount: row.amount,
            status: row.status.parse()?,
            payment_status: row.payment_status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<FeedbackRow> for Feedback {
    type Error = AppError;

    fn try_from(row: FeedbackRow) -> Result<Self, Self::Error> {
        let rating = u8::try_from(row.rating)
            .map_err(|_| AppError::Internal(format!("Invalid stored rating: {}", row.rating)))?;
        Ok(Self {
            feedback_id: row.feedback_id,
            session_id: row.session_id,
            rating,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}
