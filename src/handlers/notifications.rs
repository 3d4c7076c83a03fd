use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Notification, Page, Pagination};
use crate::services::auth::{Actor, Resolution};
use crate::state::AppState;

// GET /api/notifications
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub unread: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Notification>>, AppError> {
    let pagination = Pagination::new(query.page, query.limit);
    let (items, total) = {
        let conn = db::lock(&state.db)?;
        queries::list_notifications(
            &conn,
            &actor.id,
            query.unread.unwrap_or(false),
            pagination.limit,
            pagination.offset(),
        )?
    };
    Ok(Json(Page::new(items, total, pagination)))
}

// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = {
        let conn = db::lock(&state.db)?;
        queries::mark_notification_read(&conn, id, &actor.id)?
    };
    if !updated {
        return Err(AppError::NotFound("notification".to_string()));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/notifications/events (SSE)
#[derive(Debug, Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
    pub last_id: Option<i64>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource cannot set headers, so a session token may come in the query.
    let user_id = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            let conn = db::lock(&state.db)?;
            queries::find_session_user(&conn, token)?
                .map(|(id, _)| id)
                .ok_or(AppError::Unauthorized)?
        }
        None => match state.credentials.resolve(&headers).await? {
            Resolution::Resolved(actor) => actor.id,
            Resolution::Unresolved => return Err(AppError::Unauthorized),
        },
    };

    let last_id = query
        .last_id
        .or_else(|| {
            headers
                .get("last-event-id")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(0);

    // Subscribe before catching up so nothing lands between the two.
    let rx = state.notifications_tx.subscribe();
    let catchup = {
        let conn = db::lock(&state.db)?;
        queries::get_notifications_since(&conn, &user_id, last_id)?
    };
    let high_water = catchup.last().map(|n| n.id).unwrap_or(last_id);

    let catchup_stream = tokio_stream::iter(catchup.into_iter().map(|n| Ok::<_, Infallible>(to_event(&n))));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(n) if n.user_id == user_id && n.id > high_water => Some(Ok(to_event(&n))),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "notification stream lagged");
            None
        }
    });

    let keepalive_stream = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok::<_, Infallible>(Event::default().comment("keepalive")));

    let merged = catchup_stream.chain(live_stream).merge(keepalive_stream);
    Ok(Sse::new(merged))
}

fn to_event(notification: &Notification) -> Event {
    let data = serde_json::to_string(notification).unwrap_or_default();
    Event::default()
        .id(notification.id.to_string())
        .event("notification")
        .data(data)
}
