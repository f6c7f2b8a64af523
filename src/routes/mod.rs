//! All routes for the API.
//!
//! Every route but `/health` lives under `/v2`, and every `/v2` route but
//! the ones in [auth] that issue tokens requires a bearer token.

pub mod achievements;
pub mod auth;
pub mod events;
pub mod occurrences;
pub mod profile;
pub mod tags;

use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/v2", api())
}

fn api() -> Router {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route(
            "/profile",
            get(profile::show).put(profile::update).delete(profile::delete),
        )
        .route("/profile/password", put(profile::change_password))
        .route("/calendar/events", get(events::list).post(events::create))
        .route(
            "/calendar/events/:id",
            get(events::show).put(events::update).delete(events::delete),
        )
        .route("/calendar/events/:id/all", delete(events::delete_all))
        .route(
            "/calendar/events/:id/occurrences",
            delete(events::delete_occurrences),
        )
        .route("/calendar/weekday-events", post(occurrences::expand_weekday))
        .route("/calendar/weekend-events", post(occurrences::expand_weekend))
        .route("/calendar/weekly-events", post(occurrences::expand_weekly))
        .route("/calendar/monthly-events", post(occurrences::expand_monthly))
        .route("/calendar/yearly-events", post(occurrences::expand_yearly))
        .route("/calendar/occurrences", get(occurrences::list))
        .route(
            "/calendar/occurrences/:id",
            get(occurrences::show)
                .put(occurrences::update)
                .delete(occurrences::delete),
        )
        .route("/calendar/tags", get(tags::list).post(tags::create))
        .route("/calendar/tags/:id", put(tags::update).delete(tags::delete))
        .route(
            "/achievements",
            get(achievements::list).post(achievements::record),
        )
        .route("/achievements/:id", delete(achievements::delete))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
