// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, boards, comments, posts},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, comments, posts, boards).
/// * Applies global middleware (Auth, Trace, CORS).
/// * Injects global state (store + config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new().route("/oauth/{provider}", post(auth::oauth_login));

    let comment_routes = Router::new()
        .route(
            "/",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/{id}",
            put(comments::edit_comment).delete(comments::delete_comment),
        )
        .route("/{id}/like", post(comments::like_comment));

    let post_routes = Router::new()
        .route("/{id}", get(posts::get_post).delete(posts::delete_post))
        .route("/{id}/views", post(posts::record_view))
        .route("/{id}/like", post(posts::like_post));

    let board_routes = Router::new()
        .route("/{id}/posts", post(posts::create_post))
        // Admin-only board management
        .merge(
            Router::new()
                .route("/", post(boards::create_board))
                .route("/{id}", delete(boards::delete_board))
                .layer(middleware::from_fn(admin_middleware)),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/boards", board_routes)
        // Global Middleware (applied from outside in).
        // Auth is lenient: it identifies the caller, handlers decide whether a login is required.
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
