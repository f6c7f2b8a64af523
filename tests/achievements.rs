mod common;

use serde_json::json;

use common::{error_codes, TestApp};

#[test_log::test(tokio::test)]
async fn recording_counts_up_per_title() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app
        .post(
            "/v2/achievements",
            &token,
            json!({ "title": "Gym", "achieved_on": "2024-06-03" }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["count"], 1);

    let (_, body) = app
        .post(
            "/v2/achievements",
            &token,
            json!({ "title": "Gym", "achieved_on": "2024-06-05" }),
        )
        .await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["last_achieved_on"], "2024-06-05");

    app.post(
        "/v2/achievements",
        &token,
        json!({ "title": "Read a book", "achieved_on": "2024-06-04" }),
    )
    .await;

    let (status, body) = app.get("/v2/achievements", &token).await;
    assert_eq!(status, 200);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|achievement| achievement["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Gym", "Read a book"]);
}

#[test_log::test(tokio::test)]
async fn achievements_can_be_deleted_by_their_owner() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;
    let (_, body) = app
        .post("/v2/achievements", &alice, json!({ "title": "Gym" }))
        .await;
    let path = format!("/v2/achievements/{}", body["id"]);

    assert_eq!(app.delete(&path, &bob).await.0, 404);
    assert_eq!(app.delete(&path, &alice).await.0, 204);

    let (_, body) = app.get("/v2/achievements", &alice).await;
    assert_eq!(body, json!([]));
}

#[test_log::test(tokio::test)]
async fn achievement_titles_are_required() {
    let app = TestApp::new().await;
    let token = app.register("alice").await;

    let (status, body) = app
        .post("/v2/achievements", &token, json!({ "title": " " }))
        .await;
    assert_eq!(status, 422);
    assert_eq!(error_codes(&body, "title"), vec!["required"]);
}
