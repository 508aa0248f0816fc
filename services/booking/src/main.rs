use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentorbridge_booking::{
    build_app,
    config::{BookingConfig, StorageBackend},
    store::{BookingStore, MemoryBookingStore, PgBookingStore},
    AppState,
};
use mentorbridge_database::{create_pool, MigrationRunner};

async fn open_store(config: &BookingConfig) -> anyhow::Result<Arc<dyn BookingStore>> {
    match config.booking.storage {
        StorageBackend::Postgres => {
            let db_pool = create_pool(&config.database)
                .await
                .context("failed to connect to Postgres")?;

            let runner = MigrationRunner::new(db_pool.clone());
            runner.run_all_migrations().await.context("failed to run migrations")?;
            let status = runner.check_migration_status().await?;
            if status.is_up_to_date() {
                tracing::info!("{}", status);
            } else {
                tracing::warn!("{}; schema may be behind this build", status);
            }

            Ok(Arc::new(PgBookingStore::new(db_pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; bookings are lost on restart");
            Ok(Arc::new(MemoryBookingStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentorbridge_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = BookingConfig::from_env()?;

    let store = open_store(&config).await?;
    let address = config.bind_address();
    let app = build_app(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!("Booking service listening on {}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
