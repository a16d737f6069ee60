// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, competition, preferences, profile, questions, quiz, session},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public routes: registration and login.
/// * Everything else sits behind `auth_middleware`; question authoring also
///   behind `admin_middleware`.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let profile_routes = Router::new().route("/", get(profile::get_me)).route(
        "/api-key",
        put(profile::set_api_key).delete(profile::clear_api_key),
    );

    let preference_routes = Router::new().route(
        "/",
        get(preferences::get_preferences).put(preferences::save_preferences),
    );

    let quiz_routes = Router::new()
        .route("/generate", post(quiz::generate))
        .route("/current", get(quiz::current))
        .route("/answer", post(quiz::answer))
        .route("/navigate", post(quiz::navigate))
        .route("/finish", post(quiz::finish))
        .route("/result", get(quiz::result))
        .route("/retake", post(quiz::retake))
        .route("/reset", post(quiz::reset));

    let competition_routes = Router::new()
        .route("/", get(competition::list_mine).post(competition::create))
        .route("/active", get(competition::list_active))
        .route("/join", post(competition::join))
        .route("/random", post(competition::random_match))
        .route("/{id}", get(competition::get_competition))
        .route("/{id}/status", get(competition::status))
        .route("/{id}/participants", get(competition::participants))
        .route("/{id}/start", post(competition::start))
        .route("/{id}/questions", get(competition::questions))
        .route("/{id}/submit", post(competition::submit))
        .route("/{id}/complete", post(competition::complete))
        .route("/{id}/leaderboard", get(competition::leaderboard));

    let session_routes = Router::new()
        .route("/", get(session::view))
        .route("/step", get(session::resolve_step))
        .route("/mode", post(session::choose_mode))
        .route("/back", post(session::back))
        .route("/manage", post(session::manage))
        .route("/competition", delete(session::clear_competition))
        .route("/competition/{id}", post(session::select_competition));

    let protected_routes = Router::new()
        .nest("/api/profile", profile_routes)
        .nest("/api/preferences", preference_routes)
        .nest("/api/quiz", quiz_routes)
        .nest("/api/competitions", competition_routes)
        .nest("/api/session", session_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Double middleware protection: Auth first, then Admin check
    let admin_routes = Router::new()
        .route("/", post(questions::create_question))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/questions", admin_routes)
        .merge(protected_routes)
        // Global Middleware (applied top to bottom)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
