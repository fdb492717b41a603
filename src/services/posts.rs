//! Post reads, view/like counters and the post -> comments delete cascade.

use validator::Validate;

use crate::config::Config;
use crate::error::AppError;
use crate::models::comment::LikeResponse;
use crate::models::post::{CreatePostRequest, NewPost, Post, PostView};
use crate::ranking::counter::{self, CounterStrategy, CounterTarget};
use crate::store::ForumStore;
use crate::utils::html::clean_html;

pub async fn create_post(
    store: &dyn ForumStore,
    board_id: i64,
    author_id: i64,
    payload: CreatePostRequest,
) -> Result<Post, AppError> {
    payload.validate()?;

    store
        .find_board(board_id)
        .await?
        .ok_or(AppError::NotFound(format!("Board not found. ID: {board_id}")))?;
    store
        .find_user(author_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let post = store
        .create_post(NewPost {
            board_id,
            user_id: author_id,
            title: payload.title,
            content: clean_html(&payload.content),
        })
        .await?;
    tracing::info!("Post {} created on board {}", post.id, board_id);
    Ok(post)
}

/// Reads a post for display, then counts the view as a separate write.
///
/// View counts are advisory: an optimistic increment that runs out of
/// retries is logged and the read still succeeds.
pub async fn read_post(
    store: &dyn ForumStore,
    config: &Config,
    post_id: i64,
    viewer_id: Option<i64>,
) -> Result<PostView, AppError> {
    let post = find_live_post(store, post_id).await?;
    let is_liked = match viewer_id {
        Some(user_id) => store.is_post_liked(user_id, post_id).await?,
        None => false,
    };

    match record_view(store, config, post_id, config.view_count_strategy).await {
        Ok(()) => {}
        Err(e) if e.is_retry_exhausted() => {
            tracing::warn!("View of post {} not counted: {}", post_id, e);
        }
        Err(e) => return Err(e),
    }

    Ok(PostView { post, is_liked })
}

/// Increments a post's view count with an explicit strategy.
pub async fn record_view(
    store: &dyn ForumStore,
    config: &Config,
    post_id: i64,
    strategy: CounterStrategy,
) -> Result<(), AppError> {
    counter::increment(
        store,
        CounterTarget::PostViews(post_id),
        strategy,
        &config.retry_policy,
    )
    .await
}

/// Brings the user's like on a post to `should_be_liked`.
pub async fn like_post(
    store: &dyn ForumStore,
    post_id: i64,
    user_id: i64,
    should_be_liked: bool,
) -> Result<LikeResponse, AppError> {
    store
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    find_live_post(store, post_id).await?;

    let like_count = store.set_post_like(user_id, post_id, should_be_liked).await?;
    Ok(LikeResponse {
        like_count,
        is_liked: should_be_liked,
    })
}

/// Soft-deletes a post and all of its comments. Author only.
pub async fn delete_post(store: &dyn ForumStore, post_id: i64, user_id: i64) -> Result<(), AppError> {
    let post = find_live_post(store, post_id).await?;
    if post.user_id != user_id {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this post".to_string(),
        ));
    }

    if !store.soft_delete_post(post_id).await? {
        return Err(not_found(post_id));
    }
    tracing::info!("Post {} and its comments soft-deleted", post_id);
    Ok(())
}

async fn find_live_post(store: &dyn ForumStore, post_id: i64) -> Result<Post, AppError> {
    store
        .find_post(post_id)
        .await?
        .ok_or_else(|| not_found(post_id))
}

fn not_found(post_id: i64) -> AppError {
    AppError::NotFound(format!("Post not found. ID: {post_id}"))
}
