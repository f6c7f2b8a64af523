mod common;

use axum::http::Method;
use serde_json::json;
use time::Duration;

use common::{error_codes, TestApp, PASSWORD};

#[test_log::test(tokio::test)]
async fn register_returns_a_working_token() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app.get("/v2/profile", &token).await;
    assert_eq!(status, 200);
    assert_eq!(body["login_id"], "alice");
    assert_eq!(body["status"], "normal");
    assert!(body.get("pass_hash").is_none());
}

#[test_log::test(tokio::test)]
async fn registration_rejects_duplicates_and_bad_fields() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/v2/register",
            None,
            Some(json!({
                "login_id": "alice",
                "nickname": "",
                "email": "alice@example.com",
                "password": "short",
                "password_confirmation": "shorter",
            })),
        )
        .await;

    assert_eq!(status, 422);
    assert_eq!(error_codes(&body, "login_id"), vec!["unique"]);
    assert_eq!(error_codes(&body, "email"), vec!["unique"]);
    assert_eq!(error_codes(&body, "nickname"), vec!["required"]);
    assert!(error_codes(&body, "password").contains(&"min".to_owned()));
    assert!(error_codes(&body, "password").contains(&"confirmed".to_owned()));
}

#[test_log::test(tokio::test)]
async fn second_login_invalidates_the_first_token() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (status, first) = app.login("alice", PASSWORD).await;
    assert_eq!(status, 200);
    let first = first["token"].as_str().unwrap().to_owned();
    let (status, second) = app.login("alice", PASSWORD).await;
    assert_eq!(status, 200);
    let second = second["token"].as_str().unwrap().to_owned();

    assert_ne!(first, second);
    assert_eq!(app.get("/v2/profile", &first).await.0, 401);
    assert_eq!(app.get("/v2/profile", &second).await.0, 200);
}

#[test_log::test(tokio::test)]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (status, body) = app.login("alice", "wrong password").await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "invalid login id or password");

    let (status, _) = app.login("nobody", PASSWORD).await;
    assert_eq!(status, 401);
}

#[test_log::test(tokio::test)]
async fn expired_missing_and_unknown_tokens_are_unauthorized() {
    let app = TestApp::with_token_lifetime(Duration::seconds(-1)).await;
    let expired = app.register("alice").await;

    let (status, body) = app.get("/v2/calendar/events", &expired).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "login required");

    let (status, _) = app
        .request(Method::GET, "/v2/calendar/events", None, None)
        .await;
    assert_eq!(status, 401);

    let (status, _) = app.get("/v2/calendar/events", "not-a-token").await;
    assert_eq!(status, 401);
}

#[test_log::test(tokio::test)]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, _) = app
        .request(Method::POST, "/v2/logout", Some(&token), None)
        .await;
    assert_eq!(status, 204);
    assert_eq!(app.get("/v2/profile", &token).await.0, 401);
}

#[test_log::test(tokio::test)]
async fn frozen_accounts_cannot_log_in() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;
    sqlx::query("UPDATE users SET status = 'frozen' WHERE login_id = 'alice'")
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, body) = app.login("alice", PASSWORD).await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "account is frozen");
    assert_eq!(app.get("/v2/profile", &token).await.0, 401);
}

#[test_log::test(tokio::test)]
async fn password_reset_flow() {
    let app = TestApp::new().await;
    let old_token = app.register("alice").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/v2/forgot-password",
            None,
            Some(json!({ "email": "alice@example.com" })),
        )
        .await;
    assert_eq!(status, 202);

    // unknown emails are accepted the same way
    let (status, _) = app
        .request(
            Method::POST,
            "/v2/forgot-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, 202);

    let reset_token: String = sqlx::query_scalar("SELECT token FROM password_resets")
        .fetch_one(&app.pool)
        .await
        .unwrap();

    let (status, body) = app
        .request(
            Method::POST,
            "/v2/reset-password",
            None,
            Some(json!({
                "token": "bogus",
                "password": "new password",
                "password_confirmation": "new password",
            })),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(error_codes(&body, "token"), vec!["in"]);

    let (status, _) = app
        .request(
            Method::POST,
            "/v2/reset-password",
            None,
            Some(json!({
                "token": reset_token,
                "password": "new password",
                "password_confirmation": "new password",
            })),
        )
        .await;
    assert_eq!(status, 204);

    assert_eq!(app.get("/v2/profile", &old_token).await.0, 401);
    assert_eq!(app.login("alice", PASSWORD).await.0, 401);
    assert_eq!(app.login("alice", "new password").await.0, 200);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_resets")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
