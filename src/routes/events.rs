use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::DaybookResult;
use crate::extract::{IdPath, JsonBody, QueryParams};
use crate::models::event::occurrence::Occurrence;
use crate::models::event::{CalendarFilterParams, Event, EventForm};
use crate::AppState;

pub async fn list(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    QueryParams(params): QueryParams<CalendarFilterParams>,
) -> DaybookResult<Json<Vec<Event>>> {
    let filter = params.validate()?;
    let events = Event::for_user(auth.user.id, &filter, &state.pool).await?;

    Ok(Json(events))
}

pub async fn show(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
) -> DaybookResult<Json<Event>> {
    Event::with_id(auth.user.id, id, &state.pool).await.map(Json)
}

pub async fn create(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    JsonBody(form): JsonBody<EventForm>,
) -> DaybookResult<(StatusCode, Json<Event>)> {
    let new_event = form.validate(auth.user.id, &state.pool).await?;
    let event = Event::create(auth.user.id, new_event, &state.pool).await?;

    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
    JsonBody(form): JsonBody<EventForm>,
) -> DaybookResult<Json<Event>> {
    let event = Event::with_id(auth.user.id, id, &state.pool).await?;
    let new_event = form.validate(auth.user.id, &state.pool).await?;

    event.update(new_event, &state.pool).await.map(Json)
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
) -> DaybookResult<StatusCode> {
    let event = Event::with_id(auth.user.id, id, &state.pool).await?;
    event.delete(&state.pool).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Deletes the event and every occurrence of it.
pub async fn delete_all(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
) -> DaybookResult<Json<Value>> {
    let event = Event::with_id(auth.user.id, id, &state.pool).await?;
    let count = event.delete_with_occurrences(&state.pool).await?;
    tracing::info!(user_id = auth.user.id, event_id = event.id, count, "deleted event and occurrences");

    Ok(Json(json!({ "count": count })))
}

/// Deletes every occurrence of the event but keeps the event itself.
pub async fn delete_occurrences(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
) -> DaybookResult<Json<Value>> {
    let event = Event::with_id(auth.user.id, id, &state.pool).await?;
    let mut conn = state.pool.acquire().await?;
    let count = Occurrence::delete_for_event(event.id, &mut conn).await?;

    Ok(Json(json!({ "count": count })))
}
