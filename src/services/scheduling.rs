use anyhow::Context;
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;

/// Longest service a booking can carry; bounds the overlap search window.
const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// How two bookings of the same professional are judged to collide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictMode {
    /// Same start time only.
    #[default]
    Exact,
    /// Any overlap of `[start, start + duration)` intervals.
    Overlap,
}

impl ConflictMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlap" => ConflictMode::Overlap,
            "exact" => ConflictMode::Exact,
            other => {
                tracing::warn!("unknown conflict mode {other:?}, using exact");
                ConflictMode::Exact
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictMode::Exact => "exact",
            ConflictMode::Overlap => "overlap",
        }
    }
}

/// Whether `professional_id` already has an active booking that collides with
/// the candidate slot. `exclude_id` skips the booking being moved.
pub fn has_conflict(
    conn: &Connection,
    mode: ConflictMode,
    professional_id: &str,
    scheduled_at: &NaiveDateTime,
    duration_minutes: i32,
    exclude_id: Option<&str>,
) -> anyhow::Result<bool> {
    match mode {
        ConflictMode::Exact => {
            queries::has_active_booking_at(conn, professional_id, scheduled_at, exclude_id)
        }
        ConflictMode::Overlap => {
            let proposed_end = scheduled_at
                .checked_add_signed(Duration::minutes(duration_minutes as i64))
                .context("booking end is out of range")?;
            let window_start = scheduled_at
                .checked_sub_signed(Duration::minutes(MAX_DURATION_MINUTES))
                .context("overlap window start is out of range")?;

            let bookings = queries::get_active_bookings_in_range(
                conn,
                professional_id,
                &window_start,
                &proposed_end,
                exclude_id,
            )?;

            // Overlap: booking starts before proposed ends AND booking ends after proposed starts
            Ok(bookings
                .iter()
                .any(|b| {
                    b.scheduled_at < proposed_end && b.ends_at().map_or(true, |end| end > *scheduled_at)
                }))
        }
    }
}
