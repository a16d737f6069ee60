// tests/quiz_tests.rs

mod common;

use common::{TestApp, preferences, spawn_app};
use serde_json::{Value, json};

/// Registered user with an API key and saved preferences, on the mode selector.
async fn ready_user(app: &TestApp, prefs: Value) -> String {
    let token = app.signed_up("solo@quiz.io").await;
    assert_eq!(app.step(&token).await, "api-key");
    app.put(&token, "/api/profile/api-key", json!({ "api_key": "sk-solo" }))
        .await;
    app.put(&token, "/api/preferences", prefs).await;
    assert_eq!(app.step(&token).await, "mode-selector");
    token
}

#[tokio::test]
async fn generate_requires_api_key() {
    let app = spawn_app().await;
    app.seed_questions("Physics", 5).await;
    let token = app.signed_up("solo@quiz.io").await;
    app.put(&token, "/api/preferences", preferences("Physics", 3))
        .await;

    let response = app.post(&token, "/api/quiz/generate", json!({})).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn generate_requires_matching_questions() {
    let app = spawn_app().await;
    let token = ready_user(&app, preferences("Astronomy", 3)).await;

    let response = app.post(&token, "/api/quiz/generate", json!({})).await;
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.step(&token).await, "mode-selector");
}

#[tokio::test]
async fn solo_practice_flow() {
    let app = spawn_app().await;
    app.seed_questions("Physics", 5).await;
    let token = ready_user(&app, preferences("Physics", 3)).await;

    let response = app
        .post(&token, "/api/session/mode", json!({ "mode": "solo" }))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["step"], "solo-preferences");

    let response = app.post(&token, "/api/quiz/generate", json!({})).await;
    assert_eq!(response.status().as_u16(), 201);
    let quiz: Value = response.json().await.unwrap();
    assert_eq!(quiz["total"], 3);
    assert_eq!(quiz["index"], 0);
    assert!(quiz["question"].get("answer").is_none());
    assert_eq!(app.step(&token).await, "quiz");

    let first = quiz["question"]["id"].as_i64().unwrap();
    let outcome: Value = app
        .post(
            &token,
            "/api/quiz/answer",
            json!({ "question_id": first, "answer": "B" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["accepted"], true);
    assert_eq!(outcome["feedback"]["correct"], false);
    assert_eq!(outcome["feedback"]["answer"], "A");

    let second: Value = app
        .post(&token, "/api/quiz/navigate", json!({ "index": 1 }))
        .await
        .json()
        .await
        .unwrap();
    let second_id = second["question"]["id"].as_i64().unwrap();
    app.post(
        &token,
        "/api/quiz/answer",
        json!({ "question_id": second_id, "answer": "A" }),
    )
    .await;

    let response = app.post(&token, "/api/quiz/navigate", json!({ "index": 9 })).await;
    assert_eq!(response.status().as_u16(), 400);

    let result: Value = app
        .post(&token, "/api/quiz/finish", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["correct_count"], 1);
    assert_eq!(result["wrong_count"], 1);
    assert_eq!(result["unanswered_count"], 1);
    assert_eq!(result["score"], 1.0);
    assert_eq!(result["reason"], "submitted");

    // Reloading lands on the results.
    assert_eq!(app.step(&token).await, "results");
    let again: Value = app.get(&token, "/api/quiz/result").await.json().await.unwrap();
    assert_eq!(again["finished_at"], result["finished_at"]);

    let retake: Value = app
        .post(&token, "/api/quiz/retake", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(retake["step"], "solo-preferences");
    assert_eq!(
        app.get(&token, "/api/quiz/result").await.status().as_u16(),
        404
    );
}

#[tokio::test]
async fn negative_marking_never_goes_below_zero() {
    let app = spawn_app().await;
    app.seed_questions("Physics", 2).await;
    let mut prefs = preferences("Physics", 2);
    prefs["negative_marking"] = json!(true);
    prefs["negative_marks"] = json!(2.0);
    let token = ready_user(&app, prefs).await;

    let quiz: Value = app
        .post(&token, "/api/quiz/generate", json!({}))
        .await
        .json()
        .await
        .unwrap();
    let first = quiz["question"]["id"].as_i64().unwrap();
    app.post(
        &token,
        "/api/quiz/answer",
        json!({ "question_id": first, "answer": "C" }),
    )
    .await;

    let result: Value = app
        .post(&token, "/api/quiz/finish", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["wrong_count"], 1);
    assert_eq!(result["score"], 0.0);
}

#[tokio::test]
async fn back_abandons_quiz() {
    let app = spawn_app().await;
    app.seed_questions("Physics", 3).await;
    let token = ready_user(&app, preferences("Physics", 3)).await;

    app.post(&token, "/api/quiz/generate", json!({})).await;
    let body: Value = app
        .post(&token, "/api/session/back", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["step"], "mode-selector");

    let response = app.get(&token, "/api/quiz/current").await;
    assert_eq!(response.status().as_u16(), 409);
    assert_eq!(app.step(&token).await, "mode-selector");
}

#[tokio::test]
async fn disallowed_transition_conflicts() {
    let app = spawn_app().await;
    let token = ready_user(&app, preferences("Physics", 3)).await;

    app.post(&token, "/api/session/mode", json!({ "mode": "join_competition" }))
        .await;
    let response = app
        .post(&token, "/api/session/mode", json!({ "mode": "solo" }))
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let view: Value = app.get(&token, "/api/session").await.json().await.unwrap();
    assert_eq!(view["step"], "join-competition");
}
