//! Persistence interface consumed by the services.
//!
//! [`PgStore`] is the production implementation. [`MemoryStore`] keeps the
//! same tables in process, with per-row locks standing in for
//! `SELECT ... FOR UPDATE`, and backs the test suites.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::board::Board;
use crate::models::comment::{Comment, CommentRow, NewComment};
use crate::models::post::{NewPost, Post};
use crate::models::user::User;
use crate::ranking::{CounterTarget, SortKey};
use crate::utils::oauth::OAuthUserInfo;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Primitive counter operations the update strategies are built from.
///
/// Every method returns `None`/`false` when the target row does not exist,
/// except `compare_and_set_counter`, whose `false` also covers a lost race.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Plain read, no lock held afterwards.
    async fn read_counter(&self, target: CounterTarget) -> Result<Option<i64>, AppError>;

    /// Blind overwrite.
    async fn write_counter(&self, target: CounterTarget, value: i64) -> Result<bool, AppError>;

    /// `col = GREATEST(0, col + delta)` in one statement.
    async fn add_to_counter(&self, target: CounterTarget, delta: i64) -> Result<bool, AppError>;

    /// Locks the row, reads, writes `value + 1`, releases on commit.
    async fn increment_counter_locked(&self, target: CounterTarget) -> Result<bool, AppError>;

    /// Writes `new` only if the column still holds `expected`.
    async fn compare_and_set_counter(
        &self,
        target: CounterTarget,
        expected: i64,
        new: i64,
    ) -> Result<bool, AppError>;
}

/// Everything the forum services persist.
///
/// `find_*` lookups only return live (not soft-deleted) rows.
#[async_trait]
pub trait ForumStore: CounterStore {
    // ---- users ----
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError>;

    /// Creates the user on first login, refreshes name and avatar afterwards.
    async fn upsert_oauth_user(&self, info: &OAuthUserInfo) -> Result<User, AppError>;

    // ---- boards ----
    /// Fails with `Conflict` when a live board already has the name.
    async fn create_board(&self, name: &str, description: Option<&str>) -> Result<Board, AppError>;

    async fn find_board(&self, board_id: i64) -> Result<Option<Board>, AppError>;

    /// Soft-deletes the board's comments (joined through its posts), its
    /// posts and the board itself in one transaction.
    async fn soft_delete_board(&self, board_id: i64) -> Result<bool, AppError>;

    // ---- posts ----
    async fn create_post(&self, new: NewPost) -> Result<Post, AppError>;

    async fn find_post(&self, post_id: i64) -> Result<Option<Post>, AppError>;

    /// Soft-deletes every comment of the post, then the post.
    async fn soft_delete_post(&self, post_id: i64) -> Result<bool, AppError>;

    async fn is_post_liked(&self, user_id: i64, post_id: i64) -> Result<bool, AppError>;

    /// Brings the like row to `liked` and returns the post's like count.
    async fn set_post_like(&self, user_id: i64, post_id: i64, liked: bool) -> Result<i64, AppError>;

    // ---- comments ----
    async fn find_comment(&self, comment_id: i64) -> Result<Option<Comment>, AppError>;

    /// Inserts with a placeholder key, finalizes the key from the generated
    /// id and bumps the post's comment count, all in one transaction.
    async fn insert_comment(&self, new: NewComment) -> Result<Comment, AppError>;

    async fn update_comment_content(&self, comment_id: i64, content: &str) -> Result<bool, AppError>;

    /// Flips `is_deleted` and decrements the post's comment count.
    /// Returns `false` if the comment was missing or already deleted.
    async fn soft_delete_comment(&self, comment_id: i64) -> Result<bool, AppError>;

    /// All comments of the post, deleted ones included.
    async fn count_comments(&self, post_id: i64) -> Result<i64, AppError>;

    /// Comments of the post whose key is `<= key`: the key's 1-based rank.
    async fn count_comments_up_to(&self, post_id: i64, key: &SortKey) -> Result<i64, AppError>;

    /// One window of the post's comments in sort-key order, deleted ones included.
    async fn list_comments(
        &self,
        post_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CommentRow>, AppError>;

    /// The subset of `comment_ids` the user has liked.
    async fn liked_comment_ids(
        &self,
        user_id: i64,
        comment_ids: &[i64],
    ) -> Result<HashSet<i64>, AppError>;

    /// Brings the like row to `liked` and returns the comment's like count.
    async fn set_comment_like(
        &self,
        user_id: i64,
        comment_id: i64,
        liked: bool,
    ) -> Result<i64, AppError>;
}
