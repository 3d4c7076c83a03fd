pub mod migrations;
pub mod queries;

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Opens the database, retrying transient failures with exponential backoff.
pub async fn connect(config: &AppConfig) -> anyhow::Result<Connection> {
    let mut attempt = 0;
    loop {
        let opened = init_db(&config.database_url).and_then(|conn| {
            conn.busy_timeout(Duration::from_millis(config.db_busy_timeout_ms))
                .context("failed to set busy timeout")?;
            Ok(conn)
        });

        match opened {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt < config.db_connect_retries => {
                let delay = backoff_delay(attempt);
                tracing::warn!(attempt, error = %e, "database unavailable, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let ms = 100u64.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(ms.min(5_000))
}

pub fn lock(db: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, AppError> {
    db.lock()
        .map_err(|_| AppError::Internal("database lock poisoned".to_string()))
}

/// True when the error chain bottoms out in a UNIQUE constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        )
    })
}
