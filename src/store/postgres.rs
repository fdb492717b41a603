// src/store/postgres.rs

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::board::Board;
use crate::models::comment::{Comment, CommentRow, NewComment};
use crate::models::post::{NewPost, Post};
use crate::models::user::{DEFAULT_PROFILE_IMG, User};
use crate::ranking::{CounterTarget, SortKey};
use crate::store::{CounterStore, ForumStore};
use crate::utils::oauth::OAuthUserInfo;

/// `ForumStore` backed by Postgres through a sqlx pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl CounterStore for PgStore {
    async fn read_counter(&self, target: CounterTarget) -> Result<Option<i64>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND NOT is_deleted",
            target.column(),
            target.table()
        );
        let value = sqlx::query_scalar::<_, i64>(&sql)
            .bind(target.row_id())
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn write_counter(&self, target: CounterTarget, value: i64) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET {} = $2 WHERE id = $1 AND NOT is_deleted",
            target.table(),
            target.column()
        );
        let result = sqlx::query(&sql)
            .bind(target.row_id())
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_to_counter(&self, target: CounterTarget, delta: i64) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {table} SET {col} = GREATEST(0, {col} + $2) WHERE id = $1 AND NOT is_deleted",
            table = target.table(),
            col = target.column()
        );
        let result = sqlx::query(&sql)
            .bind(target.row_id())
            .bind(delta)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_counter_locked(&self, target: CounterTarget) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock is held until commit; concurrent writers queue here.
        let select = format!(
            "SELECT {} FROM {} WHERE id = $1 AND NOT is_deleted FOR UPDATE",
            target.column(),
            target.table()
        );
        let current = sqlx::query_scalar::<_, i64>(&select)
            .bind(target.row_id())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            return Ok(false);
        };

        let update = format!(
            "UPDATE {} SET {} = $2 WHERE id = $1",
            target.table(),
            target.column()
        );
        sqlx::query(&update)
            .bind(target.row_id())
            .bind(current + 1)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn compare_and_set_counter(
        &self,
        target: CounterTarget,
        expected: i64,
        new: i64,
    ) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {table} SET {col} = $3 WHERE id = $1 AND {col} = $2 AND NOT is_deleted",
            table = target.table(),
            col = target.column()
        );
        let result = sqlx::query(&sql)
            .bind(target.row_id())
            .bind(expected)
            .bind(new)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl ForumStore for PgStore {
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, profile_img_url, role, is_deleted, created_at, updated_at
            FROM users
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn upsert_oauth_user(&self, info: &OAuthUserInfo) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, profile_img_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
                SET username = EXCLUDED.username,
                    profile_img_url = EXCLUDED.profile_img_url,
                    updated_at = NOW()
            RETURNING id, username, email, profile_img_url, role, is_deleted, created_at, updated_at
            "#,
        )
        .bind(&info.name)
        .bind(&info.email)
        .bind(info.image_url.as_deref().unwrap_or(DEFAULT_PROFILE_IMG))
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_board(&self, name: &str, description: Option<&str>) -> Result<Board, AppError> {
        sqlx::query_as::<_, Board>(
            r#"
            INSERT INTO boards (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, is_deleted, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::Conflict(format!("Board name already in use: {name}"));
            }
            AppError::from(e)
        })
    }

    async fn find_board(&self, board_id: i64) -> Result<Option<Board>, AppError> {
        let board = sqlx::query_as::<_, Board>(
            r#"
            SELECT id, name, description, is_deleted, created_at, updated_at
            FROM boards
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(board)
    }

    async fn soft_delete_board(&self, board_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            "UPDATE boards SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(board_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if flipped == 0 {
            return Ok(false);
        }

        // Children first: comments through their posts, then the posts.
        sqlx::query(
            r#"
            UPDATE comments c
            SET is_deleted = TRUE, updated_at = NOW()
            FROM posts p
            WHERE c.post_id = p.id
              AND p.board_id = $1
              AND NOT c.is_deleted
            "#,
        )
        .bind(board_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE posts SET is_deleted = TRUE, updated_at = NOW() WHERE board_id = $1 AND NOT is_deleted",
        )
        .bind(board_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn create_post(&self, new: NewPost) -> Result<Post, AppError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (board_id, user_id, title, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, board_id, user_id, title, content,
                      view_count, comment_count, like_count,
                      is_deleted, created_at, updated_at
            "#,
        )
        .bind(new.board_id)
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn find_post(&self, post_id: i64) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, board_id, user_id, title, content,
                   view_count, comment_count, like_count,
                   is_deleted, created_at, updated_at
            FROM posts
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn soft_delete_post(&self, post_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            "UPDATE posts SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if flipped == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE comments SET is_deleted = TRUE, updated_at = NOW() WHERE post_id = $1 AND NOT is_deleted",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn is_post_liked(&self, user_id: i64, post_id: i64) -> Result<bool, AppError> {
        let existing = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM post_likes WHERE user_id = $1 AND post_id = $2",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(existing.is_some())
    }

    async fn set_post_like(&self, user_id: i64, post_id: i64, liked: bool) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock the post so two likes from the same user cannot both insert.
        let current = sqlx::query_scalar::<_, i64>(
            "SELECT like_count FROM posts WHERE id = $1 AND NOT is_deleted FOR UPDATE",
        )
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound(format!("Post not found. ID: {post_id}")))?;

        let existing = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM post_likes WHERE user_id = $1 AND post_id = $2",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

        let delta = match (existing, liked) {
            (true, false) => {
                sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
                    .bind(user_id)
                    .bind(post_id)
                    .execute(&mut *tx)
                    .await?;
                -1
            }
            (false, true) => {
                sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2)")
                    .bind(user_id)
                    .bind(post_id)
                    .execute(&mut *tx)
                    .await?;
                1
            }
            // Already in the requested state.
            _ => 0,
        };

        let like_count = if delta == 0 {
            current
        } else {
            sqlx::query_scalar::<_, i64>(
                "UPDATE posts SET like_count = GREATEST(0, like_count + $2) WHERE id = $1 RETURNING like_count",
            )
            .bind(post_id)
            .bind(delta)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;
        Ok(like_count)
    }

    async fn find_comment(&self, comment_id: i64) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, user_id, parent_id, content, sort_key, depth,
                   like_count, is_deleted, created_at, updated_at
            FROM comments
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Insert with a placeholder key to obtain the generated id.
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO comments (post_id, user_id, parent_id, content, sort_key, depth)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(new.post_id)
        .bind(new.user_id)
        .bind(new.parent_id())
        .bind(&new.content)
        .bind(SortKey::placeholder())
        .bind(new.depth())
        .fetch_one(&mut *tx)
        .await?;

        // 2. Finalize the key now that the id is known.
        let sort_key = new.sort_key_for(id)?;
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            UPDATE comments SET sort_key = $2
            WHERE id = $1
            RETURNING id, post_id, user_id, parent_id, content, sort_key, depth,
                      like_count, is_deleted, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&sort_key)
        .fetch_one(&mut *tx)
        .await?;

        // 3. Count it on the post.
        sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
            .bind(new.post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn update_comment_content(&self, comment_id: i64, content: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(comment_id)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_comment(&self, comment_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let post_id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE comments SET is_deleted = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING post_id
            "#,
        )
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(post_id) = post_id else {
            return Ok(false);
        };

        sqlx::query("UPDATE posts SET comment_count = GREATEST(0, comment_count - 1) WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn count_comments(&self, post_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_comments_up_to(&self, post_id: i64, key: &SortKey) -> Result<i64, AppError> {
        // Covered by idx_comments_post_sort_key.
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND sort_key <= $2",
        )
        .bind(post_id)
        .bind(key)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_comments(
        &self,
        post_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CommentRow>, AppError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT
                c.id, c.content, c.user_id,
                a.username AS author_name,
                a.profile_img_url,
                c.like_count, c.is_deleted, c.created_at, c.updated_at,
                c.parent_id, c.depth,
                pa.username AS parent_author_name,
                c.sort_key
            FROM comments c
            LEFT JOIN users a ON a.id = c.user_id
            LEFT JOIN comments pc ON pc.id = c.parent_id
            LEFT JOIN users pa ON pa.id = pc.user_id
            WHERE c.post_id = $1
            ORDER BY c.sort_key ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn liked_comment_ids(
        &self,
        user_id: i64,
        comment_ids: &[i64],
    ) -> Result<HashSet<i64>, AppError> {
        if comment_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT comment_id FROM comment_likes WHERE user_id = $1 AND comment_id = ANY($2)",
        )
        .bind(user_id)
        .bind(comment_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn set_comment_like(
        &self,
        user_id: i64,
        comment_id: i64,
        liked: bool,
    ) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, i64>(
            "SELECT like_count FROM comments WHERE id = $1 AND NOT is_deleted FOR UPDATE",
        )
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound(format!("Comment not found. ID: {comment_id}")))?;

        let existing = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM comment_likes WHERE user_id = $1 AND comment_id = $2",
        )
        .bind(user_id)
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

        let delta = match (existing, liked) {
            (true, false) => {
                sqlx::query("DELETE FROM comment_likes WHERE user_id = $1 AND comment_id = $2")
                    .bind(user_id)
                    .bind(comment_id)
                    .execute(&mut *tx)
                    .await?;
                -1
            }
            (false, true) => {
                sqlx::query("INSERT INTO comment_likes (user_id, comment_id) VALUES ($1, $2)")
                    .bind(user_id)
                    .bind(comment_id)
                    .execute(&mut *tx)
                    .await?;
                1
            }
            _ => 0,
        };

        let like_count = if delta == 0 {
            current
        } else {
            sqlx::query_scalar::<_, i64>(
                "UPDATE comments SET like_count = GREATEST(0, like_count + $2) WHERE id = $1 RETURNING like_count",
            )
            .bind(comment_id)
            .bind(delta)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;
        Ok(like_count)
    }
}
