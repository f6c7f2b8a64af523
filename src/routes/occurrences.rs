use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::DaybookResult;
use crate::extract::{IdPath, JsonBody, QueryParams};
use crate::models::event::occurrence::{ExpansionForm, Occurrence, OccurrenceForm};
use crate::models::event::CalendarFilterParams;
use crate::recurrence::RecurrenceType;
use crate::AppState;

#[derive(Serialize)]
pub struct ExpansionResult {
    pub count: usize,
    pub occurrences: Vec<Occurrence>,
}

/// Materializes the occurrences of an event whose recurrence is `recurrence_type`.
async fn expand(
    recurrence_type: RecurrenceType,
    state: AppState,
    auth: AuthUser,
    form: ExpansionForm,
) -> DaybookResult<(StatusCode, Json<ExpansionResult>)> {
    let expansion = form.validate(recurrence_type, auth.user.id, &state.pool).await?;
    let occurrences = Occurrence::create_for_expansion(auth.user.id, expansion, &state.pool).await?;

    Ok((
        StatusCode::CREATED,
        Json(ExpansionResult {
            count: occurrences.len(),
            occurrences,
        }),
    ))
}

macro_rules! expansion_handlers {
    ($( $name:ident => $recurrence_type:ident, )*) => {
        $(
            pub async fn $name(
                Extension(state): Extension<AppState>,
                auth: AuthUser,
                JsonBody(form): JsonBody<ExpansionForm>,
            ) -> DaybookResult<(StatusCode, Json<ExpansionResult>)> {
                expand(RecurrenceType::$recurrence_type, state, auth, form).await
            }
        )*
    };
}

expansion_handlers! {
    expand_weekday => Weekday,
    expand_weekend => Weekend,
    expand_weekly => Weekly,
    expand_monthly => Monthly,
    expand_yearly => Yearly,
}

pub async fn list(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    QueryParams(params): QueryParams<CalendarFilterParams>,
) -> DaybookResult<Json<Vec<Occurrence>>> {
    let filter = params.validate()?;
    let occurrences = Occurrence::for_user(auth.user.id, &filter, &state.pool).await?;

    Ok(Json(occurrences))
}

pub async fn show(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
) -> DaybookResult<Json<Occurrence>> {
    Occurrence::with_id(auth.user.id, id, &state.pool).await.map(Json)
}

pub async fn update(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
    JsonBody(form): JsonBody<OccurrenceForm>,
) -> DaybookResult<Json<Occurrence>> {
    let occurrence = Occurrence::with_id(auth.user.id, id, &state.pool).await?;
    let update = form.validate(&occurrence, &state.pool).await?;

    occurrence.update(update, &state.pool).await.map(Json)
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    auth: AuthUser,
    IdPath(id): IdPath,
) -> DaybookResult<StatusCode> {
    let occurrence = Occurrence::with_id(auth.user.id, id, &state.pool).await?;
    occurrence.delete(&state.pool).await?;

    Ok(StatusCode::NO_CONTENT)
}
