use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::Timestamps;

/// Represents the 'posts' table in the database.
///
/// The three counters are denormalized: they are adjusted by the write paths
/// that change the underlying rows and never recomputed on read.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub board_id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,

    pub view_count: i64,
    pub comment_count: i64,
    pub like_count: i64,

    pub is_deleted: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Fields of a post to insert.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub board_id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
}

/// DTO for a single post read, with the viewer's like state.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    /// UI helper: whether the current user has liked this post.
    pub is_liked: bool,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 30,
        message = "Title length must be between 1 and 30 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content length must be between 1 and 10000 chars"
    ))]
    pub content: String,
}

/// Query parameters for an explicit view-count increment.
#[derive(Debug, Deserialize)]
pub struct ViewParams {
    /// Overrides the configured strategy for this request.
    pub strategy: Option<crate::ranking::CounterStrategy>,
}
