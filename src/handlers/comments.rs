use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::comment::{CommentListParams, CreateCommentRequest, LikeRequest, UpdateCommentRequest},
    ranking::PageRequest,
    services::comments,
    state::AppState,
    utils::jwt::CurrentUser,
};

/// List a post's comments in thread order.
/// Anonymous callers get `isLiked: false` everywhere.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<CommentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageRequest::new(
        params.page.unwrap_or(0),
        params.size.unwrap_or(state.config.comment_page_size),
    )?;

    let page = comments::list_comments(state.store.as_ref(), params.post_id, current.id(), page).await?;
    Ok(Json(page))
}

/// Create a comment or reply.
/// Responds with the page the new comment landed on.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = current.require()?;

    let created =
        comments::create_comment(state.store.as_ref(), &state.config, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = current.require()?;

    let edited =
        comments::edit_comment(state.store.as_ref(), &state.config, id, user_id, payload).await?;
    Ok(Json(edited))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = current.require()?;

    comments::delete_comment(state.store.as_ref(), id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set the caller's like on a comment. Repeating the same request is a no-op.
pub async fn like_comment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<LikeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = current.require()?;

    let liked = comments::like_comment(state.store.as_ref(), id, user_id, payload.like).await?;
    Ok(Json(liked))
}
