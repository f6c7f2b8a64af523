//! The backend for Daybook, a personal calendar.
//!
//! Users keep one-off and recurring events, materialize the occurrences of
//! recurring ones, tag them, and count their achievements. Everything is
//! served as JSON under `/v2` and authenticated with bearer tokens (see
//! [auth]).

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod recurrence;
pub mod routes;
pub mod util;
pub mod validation;

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::{Extension, Router};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
}

/// Builds the full application around a connected pool.
pub fn app(pool: SqlitePool, config: Config) -> anyhow::Result<Router> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let cors = match &config.allowed_origin {
        Some(origin) => cors.allow_origin(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid allowed origin {}", origin))?,
        ),
        None => cors.allow_origin(Any),
    };

    let state = AppState {
        pool,
        config: Arc::new(config),
    };

    Ok(routes::router()
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
