#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use time::Duration;
use tower::ServiceExt;

use daybook::config::Config;
use daybook::db::connect_in_memory;

pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_token_lifetime(Duration::days(30)).await
    }

    pub async fn with_token_lifetime(lifetime: Duration) -> Self {
        let pool = connect_in_memory().await.unwrap();
        let config = Config::new("sqlite::memory:")
            .with_token_lifetime(lifetime)
            .with_bcrypt_cost(4);
        let router = daybook::app(pool.clone(), config).unwrap();

        Self { router, pool }
    }

    /// Sends a request and returns its status and JSON body (`null` when
    /// the body is empty).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    pub async fn get(&self, path: &str, token: &str) -> (u16, Value) {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        self.request(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        self.request(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (u16, Value) {
        self.request(Method::DELETE, path, Some(token), None).await
    }

    /// Registers `login_id` and returns its bearer token.
    pub async fn register(&self, login_id: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/v2/register",
                None,
                Some(json!({
                    "login_id": login_id,
                    "nickname": login_id,
                    "email": format!("{}@example.com", login_id),
                    "password": PASSWORD,
                    "password_confirmation": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, 201, "{}", body);

        body["token"].as_str().unwrap().to_owned()
    }

    pub async fn login(&self, login_id: &str, password: &str) -> (u16, Value) {
        self.request(
            Method::POST,
            "/v2/login",
            None,
            Some(json!({ "login_id": login_id, "password": password })),
        )
        .await
    }

    /// Creates an event and returns its id.
    pub async fn create_event(&self, token: &str, event: Value) -> i64 {
        let (status, body) = self.post("/v2/calendar/events", token, event).await;
        assert_eq!(status, 201, "{}", body);

        body["id"].as_i64().unwrap()
    }

    pub async fn create_tag(&self, token: &str, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/v2/calendar/tags",
                token,
                json!({ "name": name, "color": "#1e90ff" }),
            )
            .await;
        assert_eq!(status, 201, "{}", body);

        body["id"].as_i64().unwrap()
    }
}

/// The validation error codes reported for `field`.
pub fn error_codes(body: &Value, field: &str) -> Vec<String> {
    body["errors"][field]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|error| error["code"].as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}
