mod common;

use axum::http::Method;
use serde_json::json;

use common::{error_codes, TestApp, PASSWORD};

#[test_log::test(tokio::test)]
async fn profile_can_be_updated() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    app.register("bobby").await;

    let (status, body) = app
        .put(
            "/v2/profile",
            &token,
            json!({ "nickname": "Al", "email": "al@example.com", "birthday": "1990-02-28" }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["nickname"], "Al");
    assert_eq!(body["birthday"], "1990-02-28");

    let (status, body) = app
        .put(
            "/v2/profile",
            &token,
            json!({ "nickname": "Al", "email": "bobby@example.com" }),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(error_codes(&body, "email"), vec!["unique"]);
}

#[test_log::test(tokio::test)]
async fn password_change_requires_the_current_password() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app
        .put(
            "/v2/profile/password",
            &token,
            json!({
                "current_password": "not it at all",
                "password": "brand new pass",
                "password_confirmation": "brand new pass",
            }),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(error_codes(&body, "current_password"), vec!["current_password"]);

    let (status, _) = app
        .put(
            "/v2/profile/password",
            &token,
            json!({
                "current_password": PASSWORD,
                "password": "brand new pass",
                "password_confirmation": "brand new pass",
            }),
        )
        .await;
    assert_eq!(status, 204);
    assert_eq!(app.get("/v2/profile", &token).await.0, 401);
    assert_eq!(app.login("alice", "brand new pass").await.0, 200);
}

#[test_log::test(tokio::test)]
async fn deleted_profiles_cannot_log_in() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, _) = app
        .request(Method::DELETE, "/v2/profile", Some(&token), None)
        .await;
    assert_eq!(status, 204);

    assert_eq!(app.get("/v2/profile", &token).await.0, 401);
    let (status, body) = app.login("alice", PASSWORD).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "invalid login id or password");

    let status: String = sqlx::query_scalar("SELECT status FROM users WHERE login_id = 'alice'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(status, "deleted");
}

#[test_log::test(tokio::test)]
async fn health_needs_no_token() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}
