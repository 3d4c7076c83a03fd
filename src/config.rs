use std::env;

use crate::services::scheduling::ConflictMode;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub conflict_mode: ConflictMode,
    pub session_ttl_hours: i64,
    pub db_busy_timeout_ms: u64,
    pub db_connect_retries: u32,
    pub notification_channel_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "marketplace.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            conflict_mode: env::var("CONFLICT_MODE")
                .ok()
                .map(|v| ConflictMode::parse(&v))
                .unwrap_or_default(),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(720),
            db_busy_timeout_ms: env::var("DB_BUSY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            db_connect_retries: env::var("DB_CONNECT_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            notification_channel_capacity: env::var("NOTIFICATION_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(256),
        }
    }
}
