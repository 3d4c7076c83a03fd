use anyhow::Context;
use chrono::{NaiveDateTime, SubsecRound, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingDraft, BookingFilters, BookingStatus, Notification, NotificationDraft,
    NotificationType, Party, PriceType, RatingSummary, Review, Role, Service, ServiceDraft,
    Session, User,
};

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).with_context(|| format!("bad timestamp in row: {s}"))
}

fn parse_opt_ts(s: Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    s.as_deref().map(parse_ts).transpose()
}

/// Current UTC time at the precision the database stores.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

// ── Users ──

pub fn create_user(conn: &Connection, name: &str, email: &str, role: Role) -> anyhow::Result<User> {
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        rating: 0.0,
        review_count: 0,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO users (id, name, email, role, rating, review_count, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, 0, ?5)",
        params![user.id, user.name, user.email, user.role.as_str(), fmt_ts(&user.created_at)],
    )?;
    Ok(user)
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, name, email, role, rating, review_count, created_at FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((id, name, email, role, rating, review_count, created_at)) = row else {
        return Ok(None);
    };

    Ok(Some(User {
        id,
        name,
        email,
        role: Role::parse(&role).with_context(|| format!("unknown role in row: {role}"))?,
        rating,
        review_count,
        created_at: parse_ts(&created_at)?,
    }))
}

/// Recomputes a professional's rating from every review they have received.
pub fn recompute_rating(conn: &Connection, professional_id: &str) -> anyhow::Result<RatingSummary> {
    let (review_count, rating): (i64, f64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(AVG(rating), 0.0) FROM reviews WHERE professional_id = ?1",
        params![professional_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    conn.execute(
        "UPDATE users SET rating = ?1, review_count = ?2 WHERE id = ?3",
        params![rating, review_count, professional_id],
    )?;

    Ok(RatingSummary {
        rating,
        review_count,
    })
}

// ── Sessions ──

pub fn create_session(conn: &Connection, user_id: &str, ttl_hours: i64) -> anyhow::Result<Session> {
    let session = Session {
        token: uuid::Uuid::new_v4().simple().to_string(),
        user_id: user_id.to_string(),
        expires_at: now() + chrono::Duration::hours(ttl_hours),
    };

    conn.execute(
        "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![session.token, session.user_id, fmt_ts(&session.expires_at)],
    )?;
    Ok(session)
}

/// Looks up the user behind a live session token.
pub fn find_session_user(conn: &Connection, token: &str) -> anyhow::Result<Option<(String, Role)>> {
    let row = conn
        .query_row(
            "SELECT u.id, u.role FROM sessions s
             INNER JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.expires_at > ?2",
            params![token, fmt_ts(&now())],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    match row {
        Some((id, role)) => {
            let role = Role::parse(&role).with_context(|| format!("unknown role in row: {role}"))?;
            Ok(Some((id, role)))
        }
        None => Ok(None),
    }
}

pub fn count_users(conn: &Connection) -> anyhow::Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

// ── Services ──

const SERVICE_COLUMNS: &str = "id, professional_id, title, description, price, price_type, \
     duration_minutes, is_active, created_at, updated_at";

pub fn create_service(
    conn: &Connection,
    professional_id: &str,
    draft: &ServiceDraft,
) -> anyhow::Result<Service> {
    let ts = now();
    let service = Service {
        id: uuid::Uuid::new_v4().to_string(),
        professional_id: professional_id.to_string(),
        title: draft.title.clone(),
        description: draft.description.clone(),
        price: draft.price,
        price_type: draft.price_type,
        duration_minutes: draft.duration_minutes,
        is_active: true,
        created_at: ts,
        updated_at: ts,
    };

    conn.execute(
        "INSERT INTO services (id, professional_id, title, description, price, price_type, duration_minutes, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)",
        params![
            service.id,
            service.professional_id,
            service.title,
            service.description,
            service.price,
            service.price_type.as_str(),
            service.duration_minutes,
            fmt_ts(&service.created_at),
            fmt_ts(&service.updated_at),
        ],
    )?;
    Ok(service)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1");
    let result = conn
        .query_row(&sql, params![id], |row| Ok(parse_service_row(row)))
        .optional()?;
    result.transpose()
}

pub fn list_active_services(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Service>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM services WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE is_active = 1
         ORDER BY created_at DESC, id ASC LIMIT ?1 OFFSET ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit, offset], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok((services, total))
}

pub fn set_service_active(conn: &Connection, id: &str, active: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active as i32, fmt_ts(&now()), id],
    )?;
    Ok(count > 0)
}

pub fn count_services(conn: &Connection) -> anyhow::Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))?)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let price_type: String = row.get(5)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Service {
        id: row.get(0)?,
        professional_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        price_type: PriceType::parse(&price_type)
            .with_context(|| format!("unknown price type in row: {price_type}"))?,
        duration_minutes: row.get(6)?,
        is_active: row.get::<_, i32>(7)? != 0,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, client_id, professional_id, service_id, status, scheduled_at, \
     duration_minutes, total_price, notes, confirmed_at, cancelled_at, completed_at, \
     cancellation_reason, created_at, updated_at";

/// `IN` list of the statuses that hold a slot.
fn active_statuses_sql() -> String {
    let quoted = BookingStatus::ACTIVE
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({quoted})")
}

pub fn create_booking(conn: &Connection, draft: &BookingDraft) -> anyhow::Result<Booking> {
    let ts = now();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: draft.client_id.clone(),
        professional_id: draft.professional_id.clone(),
        service_id: draft.service_id.clone(),
        status: BookingStatus::Pending,
        scheduled_at: draft.scheduled_at,
        duration_minutes: draft.duration_minutes,
        total_price: draft.total_price,
        notes: draft.notes.clone(),
        confirmed_at: None,
        cancelled_at: None,
        completed_at: None,
        cancellation_reason: None,
        created_at: ts,
        updated_at: ts,
    };
    insert_booking(conn, &booking)?;
    Ok(booking)
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, client_id, professional_id, service_id, status, scheduled_at, duration_minutes, total_price, notes, confirmed_at, cancelled_at, completed_at, cancellation_reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            booking.id,
            booking.client_id,
            booking.professional_id,
            booking.service_id,
            booking.status.as_str(),
            fmt_ts(&booking.scheduled_at),
            booking.duration_minutes,
            booking.total_price,
            booking.notes,
            booking.confirmed_at.as_ref().map(fmt_ts),
            booking.cancelled_at.as_ref().map(fmt_ts),
            booking.completed_at.as_ref().map(fmt_ts),
            booking.cancellation_reason,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )
    .context("failed to insert booking")?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let result = conn
        .query_row(&sql, params![id], |row| Ok(parse_booking_row(row)))
        .optional()?;
    result.transpose()
}

/// Writes the mutable columns of `booking`, but only if the stored status is
/// still `expected`. Returns false when another writer got there first.
pub fn update_booking(
    conn: &Connection,
    booking: &Booking,
    expected: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn
        .execute(
            "UPDATE bookings SET
               status = ?1,
               scheduled_at = ?2,
               notes = ?3,
               confirmed_at = ?4,
               cancelled_at = ?5,
               completed_at = ?6,
               cancellation_reason = ?7,
               updated_at = ?8
             WHERE id = ?9 AND status = ?10",
            params![
                booking.status.as_str(),
                fmt_ts(&booking.scheduled_at),
                booking.notes,
                booking.confirmed_at.as_ref().map(fmt_ts),
                booking.cancelled_at.as_ref().map(fmt_ts),
                booking.completed_at.as_ref().map(fmt_ts),
                booking.cancellation_reason,
                fmt_ts(&booking.updated_at),
                booking.id,
                expected.as_str(),
            ],
        )
        .context("failed to update booking")?;
    Ok(count > 0)
}

/// Exact start-time match against the professional's active bookings.
pub fn has_active_booking_at(
    conn: &Connection,
    professional_id: &str,
    scheduled_at: &NaiveDateTime,
    exclude_id: Option<&str>,
) -> anyhow::Result<bool> {
    let active = active_statuses_sql();
    let sql = format!(
        "SELECT COUNT(*) > 0 FROM bookings
         WHERE professional_id = ?1 AND scheduled_at = ?2 AND status IN {active}
           AND (?3 IS NULL OR id != ?3)"
    );
    let taken: bool = conn.query_row(
        &sql,
        params![professional_id, fmt_ts(scheduled_at), exclude_id],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// Active bookings of a professional starting inside `[start, end]`.
pub fn get_active_bookings_in_range(
    conn: &Connection,
    professional_id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    exclude_id: Option<&str>,
) -> anyhow::Result<Vec<Booking>> {
    let active = active_statuses_sql();
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE professional_id = ?1 AND scheduled_at >= ?2 AND scheduled_at <= ?3
           AND status IN {active}
           AND (?4 IS NULL OR id != ?4)
         ORDER BY scheduled_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![professional_id, fmt_ts(start), fmt_ts(end), exclude_id],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_bookings_for_user(
    conn: &Connection,
    user_id: &str,
    party: Party,
    filters: &BookingFilters,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Booking>, i64)> {
    let owner_column = match party {
        Party::Client => "client_id",
        Party::Professional => "professional_id",
    };

    let mut clauses = vec![format!("{owner_column} = ?")];
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(status) = filters.status {
        clauses.push("status = ?".to_string());
        values.push(Box::new(status.as_str()));
    }
    if let Some(from) = &filters.from {
        clauses.push("scheduled_at >= ?".to_string());
        values.push(Box::new(fmt_ts(from)));
    }
    if let Some(to) = &filters.to {
        clauses.push("scheduled_at <= ?".to_string());
        values.push(Box::new(fmt_ts(to)));
    }
    let where_sql = clauses.join(" AND ");

    let total: i64 = {
        let refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM bookings WHERE {where_sql}"),
            refs.as_slice(),
            |row| row.get(0),
        )?
    };

    values.push(Box::new(limit));
    values.push(Box::new(offset));
    let refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();

    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE {where_sql}
         ORDER BY scheduled_at DESC, id ASC LIMIT ? OFFSET ?"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok((bookings, total))
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 ORDER BY scheduled_at DESC LIMIT ?2"
            ),
            vec![Box::new(status.as_str()) as Box<dyn ToSql>, Box::new(limit)],
        ),
        None => (
            format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY scheduled_at DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_bookings_by_status(conn: &Connection) -> anyhow::Result<Vec<(BookingStatus, i64)>> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts: Vec<(BookingStatus, i64)> =
        BookingStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for row in rows {
        let (status, count) = row?;
        if let Some(slot) = BookingStatus::parse(&status)
            .and_then(|s| counts.iter_mut().find(|(known, _)| *known == s))
        {
            slot.1 = count;
        }
    }
    Ok(counts)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(4)?;
    let scheduled_at: String = row.get(5)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(Booking {
        id: row.get(0)?,
        client_id: row.get(1)?,
        professional_id: row.get(2)?,
        service_id: row.get(3)?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status in row: {status_str}"))?,
        scheduled_at: parse_ts(&scheduled_at)?,
        duration_minutes: row.get(6)?,
        total_price: row.get(7)?,
        notes: row.get(8)?,
        confirmed_at: parse_opt_ts(row.get(9)?)?,
        cancelled_at: parse_opt_ts(row.get(10)?)?,
        completed_at: parse_opt_ts(row.get(11)?)?,
        cancellation_reason: row.get(12)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Reviews ──

pub fn insert_review(conn: &Connection, review: &Review) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, booking_id, client_id, professional_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            review.id,
            review.booking_id,
            review.client_id,
            review.professional_id,
            review.rating,
            review.comment,
            fmt_ts(&review.created_at),
        ],
    )
    .context("failed to insert review")?;
    Ok(())
}

pub fn review_exists_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM reviews WHERE booking_id = ?1",
        params![booking_id],
        |row| row.get(0),
    )?)
}

pub fn list_reviews_for_professional(
    conn: &Connection,
    professional_id: &str,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Review>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE professional_id = ?1",
        params![professional_id],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, booking_id, client_id, professional_id, rating, comment, created_at
         FROM reviews WHERE professional_id = ?1
         ORDER BY created_at DESC, id ASC LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt.query_map(params![professional_id, limit, offset], |row| {
        Ok(parse_review_row(row))
    })?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row??);
    }
    Ok((reviews, total))
}

fn parse_review_row(row: &rusqlite::Row) -> anyhow::Result<Review> {
    let created_at: String = row.get(6)?;
    Ok(Review {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        client_id: row.get(2)?,
        professional_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Notifications ──

pub fn insert_notification(
    conn: &Connection,
    draft: &NotificationDraft,
) -> anyhow::Result<Notification> {
    let created_at = now();
    conn.execute(
        "INSERT INTO notifications (user_id, title, message, kind, booking_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            draft.recipient_id,
            draft.title,
            draft.message,
            draft.kind.as_str(),
            draft.booking_id,
            fmt_ts(&created_at),
        ],
    )?;

    Ok(Notification {
        id: conn.last_insert_rowid(),
        user_id: draft.recipient_id.clone(),
        title: draft.title.clone(),
        message: draft.message.clone(),
        kind: draft.kind,
        booking_id: draft.booking_id.clone(),
        is_read: false,
        created_at,
    })
}

pub fn list_notifications(
    conn: &Connection,
    user_id: &str,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Notification>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)",
        params![user_id, unread_only as i32],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, message, kind, booking_id, is_read, created_at
         FROM notifications WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY id DESC LIMIT ?3 OFFSET ?4",
    )?;
    let rows = stmt.query_map(params![user_id, unread_only as i32, limit, offset], |row| {
        Ok(parse_notification_row(row))
    })?;

    let mut notifications = vec![];
    for row in rows {
        notifications.push(row??);
    }
    Ok((notifications, total))
}

pub fn get_notifications_since(
    conn: &Connection,
    user_id: &str,
    since_id: i64,
) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, message, kind, booking_id, is_read, created_at
         FROM notifications WHERE user_id = ?1 AND id > ?2
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![user_id, since_id], |row| {
        Ok(parse_notification_row(row))
    })?;

    let mut notifications = vec![];
    for row in rows {
        notifications.push(row??);
    }
    Ok(notifications)
}

pub fn mark_notification_read(conn: &Connection, id: i64, user_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(count > 0)
}

fn parse_notification_row(row: &rusqlite::Row) -> anyhow::Result<Notification> {
    let kind: String = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        kind: NotificationType::parse(&kind)
            .with_context(|| format!("unknown notification type in row: {kind}"))?,
        booking_id: row.get(5)?,
        is_read: row.get::<_, i32>(6)? != 0,
        created_at: parse_ts(&created_at)?,
    })
}
