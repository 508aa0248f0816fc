use sqlx::migrate::Migrate;
use mentorbridge_common::AppError;

use crate::connection::DbPool;

pub struct MigrationRunner {
    pool: DbPool,
}

impl MigrationRunner {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn run_all_migrations(&self) -> Result<(), AppError> {
        tracing::info!("Starting database migrations...");
        crate::connection::run_migrations(&self.pool).await?;
        tracing::info!("All migrations completed successfully");
        Ok(())
    }

    pub async fn check_migration_status(&self) -> Result<MigrationStatus, AppError> {
        let migrator = sqlx::migrate!("./migrations");

        let mut conn = self.pool.acquire().await?;
        conn.ensure_migrations_table()
            .await
            .map_err(|e| AppError::Internal(format!("Migration table unavailable: {}", e)))?;
        let applied = conn
            .list_applied_migrations()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to list migrations: {}", e)))?;

        let total = migrator
            .iter()
            .filter(|m| !m.migration_type.is_down_migration())
            .count();
        let applied_count = applied.len().min(total);

        Ok(MigrationStatus {
            total,
            applied: applied_count,
            pending: total - applied_count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub total: usize,
    pub applied: usize,
    pub pending: usize,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending == 0
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Migrations: {}/{} applied, {} pending",
            self.applied, self.total, self.pending
        )
    }
}
