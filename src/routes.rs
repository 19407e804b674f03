// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, questions, results, users},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: auth and question generation.
/// * Authenticated: results, profile updates.
/// * Admin: user listing and statistics.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
        HeaderValue::from_static("http://localhost:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let result_routes = Router::new()
        .route("/", get(results::list_results).post(results::submit_result))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes: auth first, then the role check
    let admin_user_routes = Router::new()
        .route("/", get(users::list_users))
        .layer(middleware::from_fn(admin_middleware));

    let user_routes = Router::new()
        .route("/{id}", put(users::update_user))
        .merge(admin_user_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let stats_routes = Router::new()
        .route("/", get(results::get_stats))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/generate", get(questions::generate_questions))
        .nest("/api/results", result_routes)
        .nest("/api/users", user_routes)
        .nest("/api/stats", stats_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
