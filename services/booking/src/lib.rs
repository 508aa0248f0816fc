pub mod approval;
pub mod availability;
pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod reservation;
pub mod revenue;
pub mod routes;
pub mod store;

use std::sync::Arc;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use mentorbridge_auth::JwtService;

use crate::approval::ProfileApprovalGate;
use crate::availability::AvailabilityRegistry;
use crate::config::BookingConfig;
use crate::lifecycle::SessionLifecycle;
use crate::reservation::ReservationEngine;
use crate::revenue::RevenueLedger;
use crate::store::BookingStore;

#[derive(Clone)]
pub struct AppState {
    pub config: BookingConfig,
    pub store: Arc<dyn BookingStore>,
    pub jwt_service: JwtService,
    pub availability: AvailabilityRegistry,
    pub reservations: ReservationEngine,
    pub lifecycle: SessionLifecycle,
    pub approvals: ProfileApprovalGate,
    pub ledger: RevenueLedger,
}

impl AppState {
    pub fn new(config: BookingConfig, store: Arc<dyn BookingStore>) -> Self {
        let booking = &config.booking;
        Self {
            jwt_service: JwtService::new(&config.jwt),
            availability: AvailabilityRegistry::new(store.clone()),
            reservations: ReservationEngine::new(store.clone(), booking.session_duration_minutes),
            lifecycle: SessionLifecycle::new(store.clone(), booking.reviews_limit),
            approvals: ProfileApprovalGate::new(store.clone()),
            ledger: RevenueLedger::new(store.clone(), booking.leaderboard_limit),
            store,
            config,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

/// The full HTTP application: routes, auth, tracing and CORS.
pub fn build_app(state: AppState) -> Router {
    routes::create_routes(state.jwt_service.clone())
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.server.cors_origins)),
        )
        .with_state(state)
}
