use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        comment::LikeRequest,
        post::{CreatePostRequest, ViewParams},
    },
    services::posts,
    state::AppState,
    utils::jwt::CurrentUser,
};

/// Get a single post. Counts as a view.
pub async fn get_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = posts::read_post(state.store.as_ref(), &state.config, id, current.id()).await?;
    Ok(Json(post))
}

/// Bump the view count with a chosen strategy (`?strategy=naive|atomic|pessimistic|optimistic`).
/// Falls back to the configured strategy.
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, AppError> {
    let strategy = params.strategy.unwrap_or(state.config.view_count_strategy);

    posts::record_view(state.store.as_ref(), &state.config, id, strategy).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a post on a board.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(board_id): Path<i64>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = current.require()?;

    let post = posts::create_post(state.store.as_ref(), board_id, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn like_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<LikeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = current.require()?;

    let liked = posts::like_post(state.store.as_ref(), id, user_id, payload.like).await?;
    Ok(Json(liked))
}

/// Soft-delete a post with all of its comments (Author only).
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = current.require()?;

    posts::delete_post(state.store.as_ref(), id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
