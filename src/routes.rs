// src/routes.rs

use std::sync::Arc;

use axum::{
    Router, http::Method, middleware, routing::{delete, get, post, put}
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, dashboard, exam, profile},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exam, dashboard, profile, admin).
/// * Applies global middleware (Trace, CORS) and rate limiting on auth.
/// * Injects global state (pool, config, live sessions).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Brute-force guard on credential endpoints only; generous enough for
    // normal SPA traffic. Requires connect-info on the serve side.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(5)
            .burst_size(20)
            .finish()
            .unwrap(),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let exam_routes = Router::new()
        .route("/subjects", get(exam::list_subjects))
        // Protected exam-session routes
        .merge(
            Router::new()
                .route("/start", post(exam::start_session))
                .route("/{id}", get(exam::get_session_state))
                .route("/{id}/position", post(exam::navigate))
                .route("/{id}/answer", post(exam::submit_answer))
                .route("/{id}/flag", post(exam::toggle_flag))
                .route("/{id}/complete", post(exam::complete_session))
                .route("/{id}/results", get(exam::get_results))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let dashboard_routes = Router::new()
        .route("/leaderboard", get(dashboard::get_leaderboard))
        .merge(
            Router::new()
                .route("/", get(dashboard::get_dashboard))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me).put(profile::update_me))
        .route("/sessions", get(profile::list_my_sessions))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            delete(admin::delete_question).put(admin::update_question),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exam", exam_routes)
        .nest("/api/dashboard", dashboard_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
