// tests/competition_tests.rs

mod common;

use std::collections::HashMap;

use common::{TestApp, preferences, spawn_app};
use serde_json::{Value, json};

/// Host creates a competition straight from the preference editor.
async fn host_competition(app: &TestApp, token: &str, body: Value) -> Value {
    app.post(
        token,
        "/api/session/mode",
        json!({ "mode": "create_competition" }),
    )
    .await;
    let response = app.post(token, "/api/competitions", body).await;
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn create_applies_defaults_and_lands_in_lobby() {
    let app = spawn_app().await;
    let host = app.signed_up("host@quiz.io").await;

    let created = host_competition(
        &app,
        &host,
        json!({
            "preferences": preferences("Chemistry", 3),
            "invited_emails": [" a@x.io", "A@X.IO", "", "b@x.io"]
        }),
    )
    .await;

    assert_eq!(created["step"], "competition-lobby");
    let competition = &created["competition"];
    assert_eq!(competition["title"], "Chemistry Competition");
    assert_eq!(
        competition["description"],
        "A medium quiz competition on Chemistry"
    );
    assert_eq!(competition["type"], "private");
    assert_eq!(competition["status"], "waiting");
    assert_eq!(competition["invited_emails"], json!(["a@x.io", "b@x.io"]));

    let code = competition["competition_code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    // Preferences were saved first.
    let stored: Value = app.get(&host, "/api/preferences").await.json().await.unwrap();
    assert_eq!(stored["course"], "Chemistry");
}

#[tokio::test]
async fn invalid_preferences_create_nothing() {
    let app = spawn_app().await;
    let host = app.signed_up("host@quiz.io").await;

    let mut prefs = preferences("Chemistry", 3);
    prefs["question_types"] = json!([]);
    let response = app
        .post(&host, "/api/competitions", json!({ "preferences": prefs }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let mine: Vec<Value> = app.get(&host, "/api/competitions").await.json().await.unwrap();
    assert!(mine.is_empty());
}

#[tokio::test]
async fn unknown_competition_is_not_found() {
    let app = spawn_app().await;
    let token = app.signed_up("ada@quiz.io").await;
    let id = uuid::Uuid::new_v4();

    let response = app.get(&token, &format!("/api/competitions/{id}/status")).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.get(&token, &format!("/api/competitions/{id}")).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn join_by_code_errors() {
    let app = spawn_app().await;
    let guest = app.signed_up("guest@quiz.io").await;

    let response = app
        .post(&guest, "/api/competitions/join", json!({ "code": "ab#1" }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post(&guest, "/api/competitions/join", json!({ "code": "ZZ9ZZ9" }))
        .await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn full_competition_flow() {
    let app = spawn_app().await;
    app.seed_questions("Chemistry", 4).await;
    let host = app.signed_up("host@quiz.io").await;
    let guest = app.signed_up("guest@quiz.io").await;

    let created = host_competition(
        &app,
        &host,
        json!({ "preferences": preferences("Chemistry", 3), "title": "Lab Cup" }),
    )
    .await;
    let id = created["competition"]["id"].as_str().unwrap().to_string();
    let code = created["competition"]["competition_code"]
        .as_str()
        .unwrap()
        .to_lowercase();

    // Guest joins with a sloppy code and follows the join flow.
    app.post(&guest, "/api/session/mode", json!({ "mode": "join_competition" }))
        .await;
    let joined: Value = app
        .post(
            &guest,
            "/api/competitions/join",
            json!({ "code": format!("{}-{}", &code[..3], &code[3..]) }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(joined["step"], "competition-lobby");
    assert_eq!(joined["competition"]["id"], id.as_str());

    let detail: Value = app
        .get(&guest, &format!("/api/competitions/{id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["title"], "Lab Cup");
    assert_eq!(detail["participants"].as_array().unwrap().len(), 2);

    // Questions stay locked until the host starts.
    let response = app.get(&guest, &format!("/api/competitions/{id}/questions")).await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .post(&guest, &format!("/api/competitions/{id}/start"), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let started: Value = app
        .post(&host, &format!("/api/competitions/{id}/start"), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(started["status"], "active");

    // Late joiners are refused.
    let late = app.signed_up("late@quiz.io").await;
    let response = app
        .post(&late, "/api/competitions/join", json!({ "code": code }))
        .await;
    assert_eq!(response.status().as_u16(), 409);

    // Both sessions were moved along by the start.
    assert_eq!(app.step(&guest).await, "competition-quiz");
    assert_eq!(app.step(&host).await, "competition-quiz");

    let questions: Vec<Value> = app
        .get(&guest, &format!("/api/competitions/{id}/questions"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions[0].get("answer").is_none());

    let all_right: HashMap<i64, &str> = questions
        .iter()
        .map(|q| (q["id"].as_i64().unwrap(), "A"))
        .collect();

    let result: Value = app
        .post(
            &host,
            &format!("/api/competitions/{id}/submit"),
            json!({ "answers": all_right }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["correct_count"], 3);
    let view: Value = app.get(&host, "/api/session").await.json().await.unwrap();
    assert_eq!(view["step"], "competition-results");

    let response = app
        .post(
            &host,
            &format!("/api/competitions/{id}/submit"),
            json!({ "answers": all_right }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    app.post(
        &guest,
        &format!("/api/competitions/{id}/submit"),
        json!({ "answers": {} }),
    )
    .await;

    let status: Value = app
        .get(&guest, &format!("/api/competitions/{id}/status"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "completed");
    assert_eq!(app.step(&guest).await, "competition-results");

    let board: Vec<Value> = app
        .get(&guest, &format!("/api/competitions/{id}/leaderboard"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["score"], 3.0);
    assert_eq!(board[1]["score"], 0.0);

    let active: Vec<Value> = app
        .get(&guest, "/api/competitions/active")
        .await
        .json()
        .await
        .unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn host_can_end_early() {
    let app = spawn_app().await;
    app.seed_questions("Chemistry", 2).await;
    let host = app.signed_up("host@quiz.io").await;

    let created = host_competition(
        &app,
        &host,
        json!({ "preferences": preferences("Chemistry", 2) }),
    )
    .await;
    let id = created["competition"]["id"].as_str().unwrap().to_string();

    let response = app
        .post(&host, &format!("/api/competitions/{id}/complete"), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 409);

    app.post(&host, &format!("/api/competitions/{id}/start"), json!({}))
        .await;
    let done: Value = app
        .post(&host, &format!("/api/competitions/{id}/complete"), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(done["status"], "completed");
    assert!(done["ended_at"].is_string());
}

#[tokio::test]
async fn active_competitions_drive_the_step() {
    let app = spawn_app().await;
    let host = app.signed_up("host@quiz.io").await;

    // One waiting competition: auto-selected into its lobby.
    host_competition(&app, &host, json!({ "preferences": preferences("Chemistry", 2) })).await;
    app.delete(&host, "/api/session/competition").await;
    let body: Value = app.get(&host, "/api/session/step").await.json().await.unwrap();
    assert_eq!(body["step"], "competition-lobby");

    // Two: the selector.
    app.delete(&host, "/api/session/competition").await;
    let second = host_competition(&app, &host, json!({ "preferences": preferences("Biology", 2) }))
        .await;
    app.delete(&host, "/api/session/competition").await;
    assert_eq!(app.step(&host).await, "active-competitions-selector");

    let second_id = second["competition"]["id"].as_str().unwrap();
    let selected: Value = app
        .post(&host, &format!("/api/session/competition/{second_id}"), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(selected["step"], "competition-lobby");
    assert_eq!(app.step(&host).await, "competition-lobby");

    let view: Value = app.get(&host, "/api/session").await.json().await.unwrap();
    assert_eq!(view["competition_id"], second_id);
}

#[tokio::test]
async fn lobby_link_selects_competition() {
    let app = spawn_app().await;
    let host = app.signed_up("host@quiz.io").await;
    let created = host_competition(&app, &host, json!({ "preferences": preferences("Chemistry", 2) }))
        .await;
    let id = created["competition"]["id"].as_str().unwrap();

    let guest = app.signed_up("guest@quiz.io").await;
    let body: Value = app
        .get(&guest, &format!("/api/session/step?lobby={id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["step"], "competition-lobby");
    assert_eq!(body["competition_id"], id);
}

#[tokio::test]
async fn selecting_a_foreign_competition_is_forbidden() {
    let app = spawn_app().await;
    let host = app.signed_up("host@quiz.io").await;
    let created = host_competition(&app, &host, json!({ "preferences": preferences("Chemistry", 2) }))
        .await;
    let id = created["competition"]["id"].as_str().unwrap();

    let stranger = app.signed_up("stranger@quiz.io").await;
    let response = app
        .post(&stranger, &format!("/api/session/competition/{id}"), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn random_match_joins_open_public_competition() {
    let app = spawn_app().await;
    let host = app.signed_up("host@quiz.io").await;
    let created = host_competition(
        &app,
        &host,
        json!({ "preferences": preferences("Chemistry", 2), "type": "public" }),
    )
    .await;

    let player = app.signed_up("player@quiz.io").await;
    app.post(&player, "/api/session/mode", json!({ "mode": "random_match" }))
        .await;
    let response = app
        .post(&player, "/api/competitions/random", json!({ "course": "chemistry" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["created"], false);
    assert_eq!(body["competition"]["id"], created["competition"]["id"]);
    assert_eq!(body["step"], "competition-lobby");
}

#[tokio::test]
async fn random_match_hosts_when_nothing_is_open() {
    let app = spawn_app().await;
    let player = app.signed_up("player@quiz.io").await;
    app.put(&player, "/api/preferences", preferences("History", 4))
        .await;

    let response = app
        .post(&player, "/api/competitions/random", json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["created"], true);
    assert_eq!(body["competition"]["type"], "public");
    assert_eq!(body["competition"]["title"], "History Competition");
}
