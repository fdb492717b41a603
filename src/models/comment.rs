use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::Timestamps;
use crate::ranking::SortKey;

/// Shown instead of the body of a soft-deleted comment.
pub const DELETED_PLACEHOLDER: &str = "This comment has been deleted.";

/// Represents the 'comments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    /// Position in the post's depth-first order. Fixed once the row is finalized.
    pub sort_key: SortKey,
    /// 0 for root comments, parent depth + 1 for replies.
    pub depth: i32,
    pub like_count: i64,
    pub is_deleted: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Everything a store needs to insert and finalize a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub parent: Option<ParentAnchor>,
}

/// The already-persisted comment a reply hangs off.
#[derive(Debug, Clone)]
pub struct ParentAnchor {
    pub id: i64,
    pub sort_key: SortKey,
    pub depth: i32,
}

impl From<&Comment> for ParentAnchor {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            sort_key: comment.sort_key.clone(),
            depth: comment.depth,
        }
    }
}

impl NewComment {
    pub fn depth(&self) -> i32 {
        self.parent.as_ref().map_or(0, |parent| parent.depth + 1)
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.parent.as_ref().map(|parent| parent.id)
    }

    /// Final key once the store has generated `id`.
    pub fn sort_key_for(&self, id: i64) -> Result<SortKey, crate::error::AppError> {
        SortKey::assign(id, self.parent.as_ref().map(|parent| &parent.sort_key))
    }
}

/// Listing projection: the comment joined with its author and its parent's author.
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub author_name: Option<String>,
    pub profile_img_url: Option<String>,
    pub like_count: i64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub parent_id: Option<i64>,
    pub depth: i32,
    pub parent_author_name: Option<String>,
    pub sort_key: SortKey,
}

/// DTO for displaying a comment in a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub comment_id: i64,
    pub content: String,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub profile_img_url: Option<String>,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub parent_comment_id: Option<i64>,
    pub parent_author_name: Option<String>,
    pub depth: i32,
    pub is_liked: bool,
}

impl CommentView {
    /// Deleted comments keep their slot and their reply target but lose
    /// content, author and likes.
    pub fn from_row(row: CommentRow, is_liked: bool) -> Self {
        let (content, author_id, author_name, profile_img_url, like_count) = if row.is_deleted {
            (DELETED_PLACEHOLDER.to_string(), None, None, None, 0)
        } else {
            (
                row.content,
                Some(row.user_id),
                row.author_name,
                row.profile_img_url,
                row.like_count,
            )
        };

        Self {
            comment_id: row.id,
            content,
            author_id,
            author_name,
            profile_img_url,
            like_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            parent_comment_id: row.parent_id,
            parent_author_name: row.parent_author_name,
            depth: row.depth,
            is_liked,
        }
    }
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: i64,

    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,

    /// Optional: the ID of the comment being replied to.
    pub parent_comment_id: Option<i64>,
}

/// DTO for editing a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

/// Where a written comment ended up, so the client can jump to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWriteResponse {
    pub comment_id: i64,
    pub page_number: i64,
}

/// Query parameters for listing comments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListParams {
    pub post_id: i64,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// Desired like state; sending the target state rather than a toggle keeps
/// retried or duplicated requests idempotent.
#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub like: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub like_count: i64,
    pub is_liked: bool,
}
