use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{BookingStatus, Page, Pagination, RatingSummary, Review, Role, User};
use crate::services::auth::Actor;
use crate::services::bookings::find_booking;
use crate::services::{catalog, notifications};
use crate::state::AppState;

/// Leaves the one review a completed booking may carry, then refreshes the
/// professional's aggregate from all of their reviews.
pub async fn create_review(
    state: &AppState,
    actor: &Actor,
    booking_id: &str,
    rating: i32,
    comment: Option<&str>,
) -> Result<Review, AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::invalid("rating", "must be between 1 and 5"));
    }

    let (review, summary, title) = {
        let conn = db::lock(&state.db)?;
        let booking = find_booking(&conn, booking_id)?;
        if booking.client_id != actor.id {
            return Err(AppError::Forbidden(
                "only the client of a booking can review it".to_string(),
            ));
        }
        if booking.status != BookingStatus::Completed {
            return Err(AppError::NotCompleted);
        }
        if queries::review_exists_for_booking(&conn, booking_id)? {
            return Err(AppError::AlreadyReviewed);
        }

        let review = Review {
            id: uuid::Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            client_id: booking.client_id.clone(),
            professional_id: booking.professional_id.clone(),
            rating,
            comment: comment
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            created_at: queries::now(),
        };

        let tx = conn.unchecked_transaction()?;
        queries::insert_review(&tx, &review).map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::AlreadyReviewed
            } else {
                e.into()
            }
        })?;
        let summary = queries::recompute_rating(&tx, &review.professional_id)?;
        tx.commit()?;
        (review, summary, catalog::service_title(&conn, &booking.service_id))
    };

    tracing::info!(
        booking_id = %review.booking_id,
        professional_id = %review.professional_id,
        rating = review.rating,
        new_rating = summary.rating,
        review_count = summary.review_count,
        "review recorded"
    );
    notifications::dispatch(
        state.notifier.as_ref(),
        notifications::for_review(&review, &title),
    )
    .await;
    Ok(review)
}

pub fn list_reviews(
    state: &AppState,
    professional_id: &str,
    pagination: Pagination,
) -> Result<Page<Review>, AppError> {
    let conn = db::lock(&state.db)?;
    let (items, total) = queries::list_reviews_for_professional(
        &conn,
        professional_id,
        pagination.limit,
        pagination.offset(),
    )?;
    Ok(Page::new(items, total, pagination))
}

/// Public profile of a professional, including the rating aggregate.
pub fn get_professional(state: &AppState, id: &str) -> Result<User, AppError> {
    let conn = db::lock(&state.db)?;
    match queries::get_user(&conn, id)? {
        Some(user) if user.role == Role::Professional => Ok(user),
        _ => Err(AppError::NotFound("professional".to_string())),
    }
}

/// Rebuilds the stored aggregate from scratch.
pub fn reconcile_rating(state: &AppState, professional_id: &str) -> Result<RatingSummary, AppError> {
    let conn = db::lock(&state.db)?;
    if queries::get_user(&conn, professional_id)?.is_none() {
        return Err(AppError::NotFound("professional".to_string()));
    }
    let summary = queries::recompute_rating(&conn, professional_id)?;
    tracing::info!(%professional_id, rating = summary.rating, "rating reconciled");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::{Booking, NotificationType, PriceType, ServiceDraft};
    use crate::services::bookings::{self, NewBooking};
    use chrono::NaiveDateTime;

    struct Fixture {
        state: AppState,
        pro: Actor,
        client: Actor,
        service_id: String,
    }

    fn setup() -> Fixture {
        let conn = db::init_db(":memory:").unwrap();
        let pro = queries::create_user(&conn, "Pat", "pat@example.com", Role::Professional).unwrap();
        let client = queries::create_user(&conn, "Cleo", "cleo@example.com", Role::Client).unwrap();
        let service = queries::create_service(
            &conn,
            &pro.id,
            &ServiceDraft {
                title: "Tiling".to_string(),
                description: None,
                price: 80.0,
                price_type: PriceType::PerJob,
                duration_minutes: 120,
            },
        )
        .unwrap();
        let config = AppConfig {
            port: 0,
            database_url: ":memory:".to_string(),
            admin_token: "admin".to_string(),
            conflict_mode: Default::default(),
            session_ttl_hours: 1,
            db_busy_timeout_ms: 1000,
            db_connect_retries: 0,
            notification_channel_capacity: 16,
        };
        Fixture {
            state: AppState::new(conn, config),
            pro: Actor { id: pro.id, role: Role::Professional },
            client: Actor { id: client.id, role: Role::Client },
            service_id: service.id,
        }
    }

    async fn booking_in(f: &Fixture, at: &str, status: Option<BookingStatus>) -> Booking {
        let booking = bookings::create_booking(
            &f.state,
            &f.client,
            NewBooking {
                service_id: f.service_id.clone(),
                scheduled_at: NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M").unwrap(),
                notes: None,
            },
        )
        .await
        .unwrap();
        if status == Some(BookingStatus::Completed) {
            bookings::change_booking_status(&f.state, &f.pro, &booking.id, BookingStatus::Confirmed, None)
                .await
                .unwrap();
            return bookings::change_booking_status(&f.state, &f.pro, &booking.id, BookingStatus::Completed, None)
                .await
                .unwrap();
        }
        booking
    }

    #[tokio::test]
    async fn test_review_updates_aggregate() {
        let f = setup();
        let first = booking_in(&f, "2025-06-02 09:00", Some(BookingStatus::Completed)).await;
        let second = booking_in(&f, "2025-06-03 09:00", Some(BookingStatus::Completed)).await;

        create_review(&f.state, &f.client, &first.id, 5, Some("great")).await.unwrap();
        create_review(&f.state, &f.client, &second.id, 4, None).await.unwrap();

        let pro = get_professional(&f.state, &f.pro.id).unwrap();
        assert_eq!(pro.review_count, 2);
        assert!((pro.rating - 4.5).abs() < f64::EPSILON);

        let page = list_reviews(&f.state, &f.pro.id, Pagination::default()).unwrap();
        assert_eq!(page.total, 2);

        let conn = db::lock(&f.state.db).unwrap();
        let (inbox, _) = queries::list_notifications(&conn, &f.pro.id, false, 50, 0).unwrap();
        assert_eq!(inbox.iter().filter(|n| n.kind == NotificationType::NewReview).count(), 2);
    }

    #[tokio::test]
    async fn test_review_requires_completion_and_is_single() {
        let f = setup();
        let pending = booking_in(&f, "2025-06-02 09:00", None).await;
        let err = create_review(&f.state, &f.client, &pending.id, 5, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotCompleted));

        let done = booking_in(&f, "2025-06-03 09:00", Some(BookingStatus::Completed)).await;
        let err = create_review(&f.state, &f.pro, &done.id, 5, None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        create_review(&f.state, &f.client, &done.id, 3, None).await.unwrap();
        let err = create_review(&f.state, &f.client, &done.id, 4, None).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyReviewed));

        let err = create_review(&f.state, &f.client, &done.id, 6, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_reconcile_restores_drifted_aggregate() {
        let f = setup();
        let done = booking_in(&f, "2025-06-02 09:00", Some(BookingStatus::Completed)).await;
        create_review(&f.state, &f.client, &done.id, 2, None).await.unwrap();

        {
            let conn = db::lock(&f.state.db).unwrap();
            conn.execute(
                "UPDATE users SET rating = 5.0, review_count = 9 WHERE id = ?1",
                [&f.pro.id],
            )
            .unwrap();
        }

        let summary = reconcile_rating(&f.state, &f.pro.id).unwrap();
        assert_eq!(summary.review_count, 1);
        assert!((summary.rating - 2.0).abs() < f64::EPSILON);
        assert!(matches!(reconcile_rating(&f.state, "ghost"), Err(AppError::NotFound(_))));
    }
}
