use mentorbridge_common::{
    env_list, env_or, env_parse, AppError, DatabaseConfig, JwtConfig, ServerConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub booking: BookingServiceConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::Validation(format!("Unknown storage backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingServiceConfig {
    pub storage: StorageBackend,
    pub session_duration_minutes: i32,
    pub reviews_limit: i64,
    pub leaderboard_limit: i64,
}

impl Default for BookingServiceConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Postgres,
            session_duration_minutes: 60,
            reviews_limit: 10,
            leaderboard_limit: 5,
        }
    }
}

impl BookingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = BookingServiceConfig::default();
        let booking = BookingServiceConfig {
            storage: env_or("BOOKING_STORAGE", "postgres").parse()?,
            session_duration_minutes: env_parse(
                "BOOKING_SESSION_MINUTES",
                defaults.session_duration_minutes,
            ),
            reviews_limit: env_parse("BOOKING_REVIEWS_LIMIT", defaults.reviews_limit),
            leaderboard_limit: env_parse("BOOKING_LEADERBOARD_LIMIT", defaults.leaderboard_limit),
        };
        if booking.session_duration_minutes <= 0 {
            return Err(AppError::Validation(
                "BOOKING_SESSION_MINUTES must be positive".to_string(),
            ));
        }

        Ok(Self {
            server: ServerConfig {
                host: env_or("BOOKING_HOST", "0.0.0.0"),
                port: env_parse("BOOKING_PORT", 8010),
                cors_origins: env_list("CORS_ORIGINS", "http://localhost:3000"),
            },
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            booking,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("postgresql".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn defaults_match_a_one_hour_session() {
        let defaults = BookingServiceConfig::default();
        assert_eq!(defaults.session_duration_minutes, 60);
        assert_eq!(defaults.reviews_limit, 10);
        assert_eq!(defaults.leaderboard_limit, 5);
    }
}
