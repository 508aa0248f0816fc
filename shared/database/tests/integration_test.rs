use mentorbridge_database::{run_migrations, MigrationRunner};
use sqlx::PgPool;

#[tokio::test]
async fn test_migrations_create_booking_tables() {
    // Skip test if no database is available
    let Ok(url) = std::env::var("DATABASE_URL") else {
        println!("Skipping database test - DATABASE_URL not set");
        return;
    };

    let pool = PgPool::connect(&url).await.expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");

    let status = MigrationRunner::new(pool.clone())
        .check_migration_status()
        .await
        .expect("Failed to read migration status");
    assert!(status.is_up_to_date(), "{}", status);

    for table in [
        "users",
        "mentor_profiles",
        "mentee_profiles",
        "availability_slots",
        "sessions",
        "feedback",
    ] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("Failed to query information_schema");
        assert!(exists, "table {} was not created", table);
    }

    let live_index: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pg_indexes WHERE indexname = 'sessions_live_occurrence_idx')",
    )
    .fetch_one(&pool)
    .await
    .expect("Failed to query pg_indexes");
    assert!(live_index, "partial unique index on live sessions is missing");
}
