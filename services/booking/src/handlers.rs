use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use uuid::Uuid;

use mentorbridge_common::{ApiResponse, AppError, Principal};

use crate::{
    approval::ReviewQueue,
    lifecycle::{MenteeSessionView, MentorDashboard, MentorReviews},
    models::{
        Account, AddSlotRequest, AvailabilitySlot, BookableDay, DaySchedule, Feedback,
        FeedbackRequest, MentorProfile, ProfileEdit, ReserveRequest, Session,
    },
    revenue::{EarningsReport, PlatformRevenueReport, PlatformStats, TopMentor},
    AppState,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// Health check
pub async fn health_check() -> ApiResult<String> {
    ok("Booking service is healthy".to_string())
}

// Mentee-facing availability
pub async fn list_bookable_slots(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<Vec<BookableDay>> {
    ok(state.availability.list_bookable_slots(mentor_id).await?)
}

pub async fn mentor_reviews(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<MentorReviews> {
    ok(state.lifecycle.mentor_reviews(mentor_id).await?)
}

// Availability management
pub async fn list_slots(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<DaySchedule>> {
    ok(state.availability.list_slots(&principal).await?)
}

pub async fn add_slot(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<AddSlotRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AvailabilitySlot>>), AppError> {
    let slot = state.availability.add_slot(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(slot))))
}

pub async fn toggle_slot(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(slot_id): Path<Uuid>,
) -> ApiResult<AvailabilitySlot> {
    ok(state.availability.toggle_slot(&principal, slot_id).await?)
}

pub async fn delete_slot(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(slot_id): Path<Uuid>,
) -> ApiResult<String> {
    state.availability.delete_slot(&principal, slot_id).await?;
    ok(format!("Slot {} deleted", slot_id))
}

// Booking
pub async fn reserve(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Session>>), AppError> {
    let session = state.reservations.reserve(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(session))))
}

// Session lifecycle
pub async fn my_sessions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<MenteeSessionView>> {
    ok(state.lifecycle.mentee_sessions(&principal).await?)
}

pub async fn mentor_dashboard(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<MentorDashboard> {
    ok(state.lifecycle.mentor_dashboard(&principal).await?)
}

pub async fn complete_session(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Session> {
    ok(state.lifecycle.complete(&principal, session_id).await?)
}

pub async fn cancel_session(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Session> {
    ok(state.lifecycle.cancel(&principal, session_id).await?)
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Feedback>>), AppError> {
    let feedback = state
        .lifecycle
        .submit_feedback(&principal, session_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(feedback))))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Session> {
    ok(state.lifecycle.confirm_payment(&principal, session_id).await?)
}

// Profile review
pub async fn edit_mentor_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(edit): Json<ProfileEdit>,
) -> ApiResult<MentorProfile> {
    ok(state.approvals.edit_profile(&principal, edit).await?)
}

pub async fn approve_mentor(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<MentorProfile> {
    ok(state.approvals.approve(&principal, mentor_id).await?)
}

pub async fn reject_mentor(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<MentorProfile> {
    ok(state.approvals.reject(&principal, mentor_id).await?)
}

pub async fn suspend_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Account> {
    ok(state.approvals.suspend_user(&principal, user_id).await?)
}

pub async fn activate_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Account> {
    ok(state.approvals.activate_user(&principal, user_id).await?)
}

pub async fn review_queue(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ReviewQueue> {
    ok(state.approvals.review_queue(&principal).await?)
}

// Reporting
pub async fn platform_stats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<PlatformStats> {
    ok(state.ledger.platform_stats(&principal).await?)
}

pub async fn top_mentors(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<TopMentor>> {
    ok(state.ledger.top_mentors(&principal).await?)
}

pub async fn mentor_revenue(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<EarningsReport> {
    ok(state.ledger.mentor_earnings(&principal).await?)
}

pub async fn platform_revenue(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<PlatformRevenueReport> {
    ok(state.ledger.platform_revenue(&principal).await?)
}

pub async fn not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure("NOT_FOUND", "Endpoint not found".to_string())),
    )
}
