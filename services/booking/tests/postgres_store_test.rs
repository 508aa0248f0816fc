mod common;

use std::sync::Arc;

use futures::future::join_all;
use sqlx::PgPool;

use mentorbridge_booking::{
    models::{
        AddSlotRequest, DayOfWeek, FeedbackRequest, ProfileEdit, ProfileStatus, ReserveRequest,
        SessionStatus,
    },
    store::{BookingStore, PgBookingStore},
    AppState,
};
use mentorbridge_common::AppError;
use mentorbridge_database::run_migrations;

use common::{admin, at, cents, dollars, payment_service, seed_mentee, seed_mentor, test_config};

async fn pg_state() -> Option<AppState> {
    // Skip test if no database is available
    let Ok(url) = std::env::var("DATABASE_URL") else {
        println!("Skipping Postgres store test - DATABASE_URL not set");
        return None;
    };
    let pool = PgPool::connect(&url).await.expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");

    let store: Arc<dyn BookingStore> = Arc::new(PgBookingStore::new(pool));
    Some(AppState::new(test_config(), store))
}

#[tokio::test]
async fn postgres_reservation_lifecycle() {
    let Some(state) = pg_state().await else {
        return;
    };
    let (mentor, profile) = seed_mentor(&state.store, "Pg Mentor", dollars(50), true).await;
    let (mentee, _) = seed_mentee(&state.store, "Pg Mentee").await;

    let slot = state
        .availability
        .add_slot(
            &mentor,
            AddSlotRequest {
                day_of_week: DayOfWeek::Monday,
                time_of_day: at(10),
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        state
            .availability
            .add_slot(
                &mentor,
                AddSlotRequest {
                    day_of_week: DayOfWeek::Monday,
                    time_of_day: at(10),
                },
            )
            .await,
        Err(AppError::Conflict(_))
    ));

    let session = state
        .reservations
        .reserve(
            &mentee,
            ReserveRequest {
                mentor_id: profile.mentor_id,
                day_of_week: DayOfWeek::Monday,
                time_of_day: at(10),
            },
        )
        .await
        .unwrap();
    assert_eq!(session.amount, cents(6000));
    assert!(matches!(
        state.availability.delete_slot(&mentor, slot.slot_id).await,
        Err(AppError::InUse(_))
    ));

    state
        .lifecycle
        .confirm_payment(&payment_service(), session.session_id)
        .await
        .unwrap();
    let completed = state.lifecycle.complete(&mentor, session.session_id).await.unwrap();
    assert_eq!(completed.status, SessionStatus::Completed);

    let views = state.store.list_slots(profile.mentor_id).await.unwrap();
    assert!(!views[0].has_booking);
    assert!(views[0].awaiting_feedback);

    let review = || FeedbackRequest {
        rating: 5,
        comment: "Great".to_string(),
    };
    state
        .lifecycle
        .submit_feedback(&mentee, session.session_id, review())
        .await
        .unwrap();
    assert!(matches!(
        state
            .lifecycle
            .submit_feedback(&mentee, session.session_id, review())
            .await,
        Err(AppError::InvalidState(_))
    ));

    let earnings = state.ledger.earnings_for(profile.mentor_id).await.unwrap();
    assert_eq!(earnings.figures.mentor_payout, cents(5000));
    assert_eq!(earnings.figures.platform_fee, cents(1000));
}

#[tokio::test]
async fn postgres_concurrent_reservations_have_one_winner() {
    let Some(state) = pg_state().await else {
        return;
    };
    let (mentor, profile) = seed_mentor(&state.store, "Pg Racer", dollars(75), true).await;
    state
        .availability
        .add_slot(
            &mentor,
            AddSlotRequest {
                day_of_week: DayOfWeek::Thursday,
                time_of_day: at(17),
            },
        )
        .await
        .unwrap();

    let mut mentees = Vec::new();
    for i in 0..8 {
        mentees.push(seed_mentee(&state.store, &format!("pg-racer-{}", i)).await.0);
    }

    let attempts = mentees.into_iter().map(|mentee| {
        let state = state.clone();
        let mentor_id = profile.mentor_id;
        tokio::spawn(async move {
            state
                .reservations
                .reserve(
                    &mentee,
                    ReserveRequest {
                        mentor_id,
                        day_of_week: DayOfWeek::Thursday,
                        time_of_day: at(17),
                    },
                )
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("reservation task panicked"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, AppError::SlotUnavailable(_))));
}

#[tokio::test]
async fn postgres_edit_is_field_wise_and_gates_the_next_reservation() {
    let Some(state) = pg_state().await else {
        return;
    };
    let (mentor, profile) = seed_mentor(&state.store, "Pg Editor", dollars(50), true).await;
    let (mentee, _) = seed_mentee(&state.store, "Pg Booker").await;
    state
        .availability
        .add_slot(
            &mentor,
            AddSlotRequest {
                day_of_week: DayOfWeek::Tuesday,
                time_of_day: at(11),
            },
        )
        .await
        .unwrap();

    let edited = state
        .approvals
        .edit_profile(
            &mentor,
            ProfileEdit {
                hourly_rate: Some(dollars(90)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.status, ProfileStatus::Pending);
    assert_eq!(edited.full_name, "Pg Editor");
    assert_eq!(edited.hourly_rate, dollars(90));

    let request = || ReserveRequest {
        mentor_id: profile.mentor_id,
        day_of_week: DayOfWeek::Tuesday,
        time_of_day: at(11),
    };
    assert!(matches!(
        state.reservations.reserve(&mentee, request()).await,
        Err(AppError::SlotUnavailable(_))
    ));

    state.approvals.approve(&admin(), profile.mentor_id).await.unwrap();
    let session = state.reservations.reserve(&mentee, request()).await.unwrap();
    assert_eq!(session.amount, cents(10800));
}
