// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use quizarena::{
    config::Config,
    models::{
        preferences::{Difficulty, Language},
        question::{CreateQuestionRequest, QuestionType},
        user::NewUser,
    },
    routes,
    state::AppState,
    store::{MemoryStore, QuestionBank, UserStore},
    utils::hash::hash_password,
};
use serde_json::{Value, json};

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port against a fresh in-memory store.
pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let config = Config::for_memory("test_secret_for_integration_tests");
    let state = AppState::new(store.clone(), config);

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "email": email,
                "password": password,
                "name": "Quiz Taker"
            }))
            .send()
            .await
            .expect("Register failed")
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let body: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Login failed")
            .json()
            .await
            .expect("Failed to parse login json");
        body["token"].as_str().expect("Token not found").to_string()
    }

    /// Registers a fresh user and returns its bearer token.
    pub async fn signed_up(&self, email: &str) -> String {
        let response = self.register(email, "password123").await;
        assert_eq!(response.status().as_u16(), 201);
        self.login(email, "password123").await
    }

    pub async fn admin_token(&self) -> String {
        self.store
            .create_user(NewUser {
                email: "admin@quiz.io".to_string(),
                name: "Admin".to_string(),
                phone: None,
                password_hash: hash_password("admin-password").unwrap(),
                role: "admin".to_string(),
            })
            .await
            .unwrap();
        self.login("admin@quiz.io", "admin-password").await
    }

    pub async fn seed_questions(&self, course: &str, count: usize) {
        for i in 0..count {
            self.store
                .insert_question(CreateQuestionRequest {
                    question_type: QuestionType::Single,
                    content: format!("{course} question {i}"),
                    options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                    answer: "A".to_string(),
                    analysis: Some("A is right".to_string()),
                    course: course.to_string(),
                    topic: String::new(),
                    difficulty: Difficulty::Medium,
                    language: Language::English,
                })
                .await
                .unwrap();
        }
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn put(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn delete(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn step(&self, token: &str) -> String {
        let body: Value = self.get(token, "/api/session/step").await.json().await.unwrap();
        body["step"].as_str().unwrap().to_string()
    }
}

pub fn preferences(course: &str, count: u32) -> Value {
    json!({
        "course": course,
        "difficulty": "medium",
        "language": "english",
        "question_types": ["single"],
        "question_count": count,
        "mode": "practice"
    })
}
