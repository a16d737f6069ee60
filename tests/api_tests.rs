// tests/api_tests.rs

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{preferences, spawn_app};
use quizarena::{
    config::Config,
    routes,
    state::AppState,
    store::{MemoryStore, PreferenceStore},
};
use serde_json::{Value, json};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn router_rejects_missing_token_without_a_server() {
    let state = AppState::new(Arc::new(MemoryStore::new()), Config::for_memory("secret"));
    let app = routes::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/session/step")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_works() {
    let app = spawn_app().await;

    let response = app.register("ada@quiz.io", "password123").await;
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "ada@quiz.io");
    assert_eq!(body["has_api_key"], false);
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;

    // Not an email
    let response = app.register("not-an-email", "password123").await;
    assert_eq!(response.status().as_u16(), 400);

    // Password too short
    let response = app.register("ada@quiz.io", "12345").await;
    assert_eq!(response.status().as_u16(), 400);

    // Blank name
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "ada@quiz.io", "password": "password123", "name": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = spawn_app().await;
    assert_eq!(app.register("ada@quiz.io", "password123").await.status().as_u16(), 201);
    assert_eq!(app.register("ADA@quiz.io", "password123").await.status().as_u16(), 409);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = spawn_app().await;
    app.register("ada@quiz.io", "password123").await;

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "ada@quiz.io", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/api/profile")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app.get("garbage", "/api/session/step").await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn api_key_lifecycle() {
    let app = spawn_app().await;
    let token = app.signed_up("ada@quiz.io").await;

    assert_eq!(app.step(&token).await, "api-key");

    let response = app
        .put(&token, "/api/profile/api-key", json!({ "api_key": "   " }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .put(&token, "/api/profile/api-key", json!({ "api_key": "sk-live-123" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["step"], "mode-selector");

    let profile: Value = app.get(&token, "/api/profile").await.json().await.unwrap();
    assert_eq!(profile["has_api_key"], true);
    assert!(profile.get("api_key").is_none());

    let response = app.delete(&token, "/api/profile/api-key").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["step"], "api-key");
    assert_eq!(app.step(&token).await, "api-key");
}

#[tokio::test]
async fn preferences_default_then_save() {
    let app = spawn_app().await;
    let token = app.signed_up("ada@quiz.io").await;

    let defaults: Value = app.get(&token, "/api/preferences").await.json().await.unwrap();
    assert_eq!(defaults["difficulty"], "medium");
    assert_eq!(defaults["question_count"], 10);

    let response = app
        .put(&token, "/api/preferences", preferences("Geography", 5))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let stored: Value = app.get(&token, "/api/preferences").await.json().await.unwrap();
    assert_eq!(stored["course"], "Geography");
    assert_eq!(stored["question_count"], 5);
}

#[tokio::test]
async fn invalid_preferences_are_not_saved() {
    let app = spawn_app().await;
    let token = app.signed_up("ada@quiz.io").await;

    let blank_course = preferences("  ", 5);
    let response = app.put(&token, "/api/preferences", blank_course).await;
    assert_eq!(response.status().as_u16(), 400);

    let mut no_types = preferences("Geography", 5);
    no_types["question_types"] = json!([]);
    let response = app.put(&token, "/api/preferences", no_types).await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .put(&token, "/api/preferences", preferences("Geography", 51))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    assert!(app.store.load_preferences(1).await.unwrap().is_none());
}

#[tokio::test]
async fn question_authoring_is_admin_only() {
    let app = spawn_app().await;
    let user_token = app.signed_up("ada@quiz.io").await;
    let question = json!({
        "type": "single",
        "content": "Largest ocean?",
        "options": ["Pacific", "Atlantic"],
        "answer": "Pacific",
        "course": "Geography"
    });

    let response = app.post(&user_token, "/api/questions", question.clone()).await;
    assert_eq!(response.status().as_u16(), 403);

    let admin_token = app.admin_token().await;
    let response = app.post(&admin_token, "/api/questions", question).await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["course"], "Geography");

    let one_option = json!({
        "type": "single",
        "content": "Pick one",
        "options": ["Only"],
        "answer": "Only",
        "course": "Geography"
    });
    let response = app.post(&admin_token, "/api/questions", one_option).await;
    assert_eq!(response.status().as_u16(), 400);
}
