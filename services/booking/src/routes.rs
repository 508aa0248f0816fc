use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use mentorbridge_auth::{auth_middleware, JwtService};

use crate::{handlers, AppState};

pub fn create_routes(jwt_service: JwtService) -> Router<AppState> {
    let api = Router::new()
        // Mentee-facing mentor views
        .route("/mentors/:mentor_id/slots", get(handlers::list_bookable_slots))
        .route("/mentors/:mentor_id/reviews", get(handlers::mentor_reviews))

        // Availability management
        .route("/availability", get(handlers::list_slots).post(handlers::add_slot))
        .route("/availability/:slot_id", delete(handlers::delete_slot))
        .route("/availability/:slot_id/toggle", post(handlers::toggle_slot))

        // Booking and session lifecycle
        .route("/bookings", post(handlers::reserve))
        .route("/sessions/mine", get(handlers::my_sessions))
        .route("/sessions/:session_id/complete", post(handlers::complete_session))
        .route("/sessions/:session_id/cancel", post(handlers::cancel_session))
        .route("/sessions/:session_id/feedback", post(handlers::submit_feedback))
        .route("/dashboard/mentor", get(handlers::mentor_dashboard))

        // Payment collaborator
        .route("/payments/:session_id/confirm", post(handlers::confirm_payment))

        // Profile review
        .route("/profile/mentor", put(handlers::edit_mentor_profile))
        .route("/admin/mentors/:mentor_id/approve", post(handlers::approve_mentor))
        .route("/admin/mentors/:mentor_id/reject", post(handlers::reject_mentor))
        .route("/admin/users/:user_id/suspend", post(handlers::suspend_user))
        .route("/admin/users/:user_id/activate", post(handlers::activate_user))
        .route("/admin/review-queue", get(handlers::review_queue))

        // Reporting
        .route("/admin/stats", get(handlers::platform_stats))
        .route("/admin/top-mentors", get(handlers::top_mentors))
        .route("/revenue/mentor", get(handlers::mentor_revenue))
        .route("/revenue/platform", get(handlers::platform_revenue))

        .route_layer(middleware::from_fn_with_state(jwt_service, auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api)
}
