// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, exams},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the attempt service router.
///
/// * Exam definitions are public.
/// * Starting and submitting an attempt require a bearer token.
/// * Trace and CORS layers wrap everything.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let attempt_routes = Router::new()
        .route("/{id}/attempts", post(attempts::start_attempt))
        .route("/{id}/attempts/submit", post(attempts::submit_attempt))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let exam_routes = Router::new()
        .route("/{id}", get(exams::get_exam))
        .merge(attempt_routes);

    Router::new()
        .route("/api/health", get(exams::health))
        .nest("/api/exams", exam_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
