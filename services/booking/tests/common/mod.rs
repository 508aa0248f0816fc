#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use uuid::Uuid;

use mentorbridge_booking::{
    config::{BookingConfig, BookingServiceConfig, StorageBackend},
    models::{Account, MenteeProfile, MentorProfile, ProfileStatus},
    store::{BookingStore, MemoryBookingStore, TransitionOutcome},
    AppState,
};
use mentorbridge_common::{DatabaseConfig, JwtConfig, Principal, ServerConfig, UserRole};

pub fn test_config() -> BookingConfig {
    BookingConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["http://localhost:3000".to_string()],
        },
        database: DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            username: "unused".to_string(),
            password: "unused".to_string(),
            database: "unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: "booking-test-secret".to_string(),
            expiration_hours: 1,
            issuer: "mentorbridge".to_string(),
        },
        booking: BookingServiceConfig {
            storage: StorageBackend::Memory,
            ..BookingServiceConfig::default()
        },
    }
}

pub fn memory_state() -> AppState {
    AppState::new(test_config(), Arc::new(MemoryBookingStore::new()))
}

pub fn at(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
}

pub fn dollars(amount: i64) -> Decimal {
    Decimal::new(amount, 0)
}

pub fn cents(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

pub fn admin() -> Principal {
    Principal::new(Uuid::new_v4(), UserRole::Admin)
}

pub fn payment_service() -> Principal {
    Principal::new(Uuid::new_v4(), UserRole::Payment)
}

/// Creates a mentor account and profile, approved when `approved` is set.
pub async fn seed_mentor(
    store: &Arc<dyn BookingStore>,
    name: &str,
    hourly_rate: Decimal,
    approved: bool,
) -> (Principal, MentorProfile) {
    let user_id = Uuid::new_v4();
    store
        .insert_account(Account::new(user_id, format!("{}@mentors.test", user_id), UserRole::Mentor))
        .await
        .unwrap();
    let mut profile = store
        .insert_mentor_profile(MentorProfile::new(user_id, name, hourly_rate))
        .await
        .unwrap();
    if approved {
        let TransitionOutcome::Applied(approved) = store
            .transition_profile_status(profile.mentor_id, ProfileStatus::Pending, ProfileStatus::Approved)
            .await
            .unwrap()
        else {
            panic!("fresh profile should be pending");
        };
        profile = approved;
    }
    (Principal::new(user_id, UserRole::Mentor), profile)
}

pub async fn seed_mentee(store: &Arc<dyn BookingStore>, name: &str) -> (Principal, MenteeProfile) {
    let user_id = Uuid::new_v4();
    store
        .insert_account(Account::new(user_id, format!("{}@mentees.test", user_id), UserRole::Mentee))
        .await
        .unwrap();
    let profile = store
        .insert_mentee_profile(MenteeProfile::new(user_id, name))
        .await
        .unwrap();
    (Principal::new(user_id, UserRole::Mentee), profile)
}
