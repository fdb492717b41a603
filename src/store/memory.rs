// src/store/memory.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::OwnedMutexGuard;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::Timestamps;
use crate::models::board::Board;
use crate::models::comment::{Comment, CommentRow, NewComment};
use crate::models::post::{NewPost, Post};
use crate::models::user::{DEFAULT_PROFILE_IMG, User};
use crate::ranking::{CounterTarget, SortKey};
use crate::store::{CounterStore, ForumStore};
use crate::utils::oauth::OAuthUserInfo;

/// In-process `ForumStore`.
///
/// One mutex guards all tables, so every multi-row write is atomic the way a
/// transaction would be. Counter reads give up the thread before returning,
/// which lets concurrent read-modify-write sequences interleave like they do
/// over a network round trip.
///
/// Every write to a counter column first takes that row's async lock, the
/// way any `UPDATE` waits on a row held `FOR UPDATE`. Plain reads never lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<CounterTarget, Weak<tokio::sync::Mutex<()>>>>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    boards: BTreeMap<i64, Board>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    post_likes: HashSet<(i64, i64)>,
    comment_likes: HashSet<(i64, i64)>,
    sequences: Sequences,
}

/// Per-table id generators, like BIGSERIAL.
#[derive(Default)]
struct Sequences {
    users: i64,
    boards: i64,
    posts: i64,
    comments: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

impl Tables {
    fn counter_mut(&mut self, target: CounterTarget) -> Option<&mut i64> {
        match target {
            CounterTarget::CommentLikes(id) => self
                .comments
                .get_mut(&id)
                .filter(|c| !c.is_deleted)
                .map(|c| &mut c.like_count),
            CounterTarget::PostViews(id) => self.live_post_mut(id).map(|p| &mut p.view_count),
            CounterTarget::PostLikes(id) => self.live_post_mut(id).map(|p| &mut p.like_count),
            CounterTarget::PostComments(id) => {
                self.live_post_mut(id).map(|p| &mut p.comment_count)
            }
        }
    }

    fn live_post_mut(&mut self, post_id: i64) -> Option<&mut Post> {
        self.posts.get_mut(&post_id).filter(|p| !p.is_deleted)
    }

    fn soft_delete_comments_where(&mut self, mut matches: impl FnMut(&Comment) -> bool) {
        for comment in self.comments.values_mut() {
            if !comment.is_deleted && matches(comment) {
                comment.is_deleted = true;
                comment.timestamps.touch();
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store poisoned".to_string()))
    }

    /// Waits for the row lock of `target`.
    ///
    /// Only weak handles are kept, so a lock disappears with its last guard.
    /// Dead handles are swept whenever a new lock has to be created.
    async fn lock_row(&self, target: CounterTarget) -> Result<OwnedMutexGuard<()>, AppError> {
        let lock = {
            let mut locks = self
                .row_locks
                .lock()
                .map_err(|_| AppError::InternalServerError("row lock table poisoned".to_string()))?;
            match locks.get(&target).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    locks.retain(|_, weak| weak.strong_count() > 0);
                    let lock = Arc::new(tokio::sync::Mutex::new(()));
                    locks.insert(target, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        Ok(lock.lock_owned().await)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn read_counter(&self, target: CounterTarget) -> Result<Option<i64>, AppError> {
        let value = self.tables()?.counter_mut(target).map(|v| *v);
        tokio::task::yield_now().await;
        Ok(value)
    }

    async fn write_counter(&self, target: CounterTarget, value: i64) -> Result<bool, AppError> {
        let _row = self.lock_row(target).await?;
        let mut tables = self.tables()?;
        Ok(match tables.counter_mut(target) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        })
    }

    async fn add_to_counter(&self, target: CounterTarget, delta: i64) -> Result<bool, AppError> {
        let _row = self.lock_row(target).await?;
        let mut tables = self.tables()?;
        Ok(match tables.counter_mut(target) {
            Some(slot) => {
                *slot = (*slot + delta).max(0);
                true
            }
            None => false,
        })
    }

    async fn increment_counter_locked(&self, target: CounterTarget) -> Result<bool, AppError> {
        let _row = self.lock_row(target).await?;

        let current = self.tables()?.counter_mut(target).map(|v| *v);
        let Some(current) = current else {
            return Ok(false);
        };
        tokio::task::yield_now().await;

        let mut tables = self.tables()?;
        Ok(match tables.counter_mut(target) {
            Some(slot) => {
                *slot = current + 1;
                true
            }
            None => false,
        })
    }

    async fn compare_and_set_counter(
        &self,
        target: CounterTarget,
        expected: i64,
        new: i64,
    ) -> Result<bool, AppError> {
        let _row = self.lock_row(target).await?;
        let mut tables = self.tables()?;
        Ok(match tables.counter_mut(target) {
            Some(slot) if *slot == expected => {
                *slot = new;
                true
            }
            _ => false,
        })
    }
}

#[async_trait]
impl ForumStore for MemoryStore {
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let tables = self.tables()?;
        Ok(tables.users.get(&user_id).filter(|u| !u.is_deleted).cloned())
    }

    async fn upsert_oauth_user(&self, info: &OAuthUserInfo) -> Result<User, AppError> {
        let mut tables = self.tables()?;
        let avatar = info
            .image_url
            .clone()
            .unwrap_or_else(|| DEFAULT_PROFILE_IMG.to_string());

        if let Some(user) = tables.users.values_mut().find(|u| u.email == info.email) {
            user.username = info.name.clone();
            user.profile_img_url = avatar;
            user.timestamps.touch();
            return Ok(user.clone());
        }

        let id = next(&mut tables.sequences.users);
        let user = User {
            id,
            username: info.name.clone(),
            email: info.email.clone(),
            profile_img_url: avatar,
            role: "user".to_string(),
            is_deleted: false,
            timestamps: Timestamps::now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn create_board(&self, name: &str, description: Option<&str>) -> Result<Board, AppError> {
        let mut tables = self.tables()?;
        if tables.boards.values().any(|b| !b.is_deleted && b.name == name) {
            return Err(AppError::Conflict(format!("Board name already in use: {name}")));
        }

        let id = next(&mut tables.sequences.boards);
        let board = Board {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            is_deleted: false,
            timestamps: Timestamps::now(),
        };
        tables.boards.insert(id, board.clone());
        Ok(board)
    }

    async fn find_board(&self, board_id: i64) -> Result<Option<Board>, AppError> {
        let tables = self.tables()?;
        Ok(tables.boards.get(&board_id).filter(|b| !b.is_deleted).cloned())
    }

    async fn soft_delete_board(&self, board_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        let Some(board) = tables.boards.get_mut(&board_id).filter(|b| !b.is_deleted) else {
            return Ok(false);
        };
        board.is_deleted = true;
        board.timestamps.touch();

        let post_ids: HashSet<i64> = tables
            .posts
            .values()
            .filter(|p| p.board_id == board_id)
            .map(|p| p.id)
            .collect();
        tables.soft_delete_comments_where(|c| post_ids.contains(&c.post_id));
        for post in tables.posts.values_mut() {
            if post.board_id == board_id && !post.is_deleted {
                post.is_deleted = true;
                post.timestamps.touch();
            }
        }
        Ok(true)
    }

    async fn create_post(&self, new: NewPost) -> Result<Post, AppError> {
        let mut tables = self.tables()?;
        if !tables.boards.contains_key(&new.board_id) {
            return Err(AppError::NotFound(format!("Board not found. ID: {}", new.board_id)));
        }

        let id = next(&mut tables.sequences.posts);
        let post = Post {
            id,
            board_id: new.board_id,
            user_id: new.user_id,
            title: new.title,
            content: new.content,
            view_count: 0,
            comment_count: 0,
            like_count: 0,
            is_deleted: false,
            timestamps: Timestamps::now(),
        };
        tables.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn find_post(&self, post_id: i64) -> Result<Option<Post>, AppError> {
        let tables = self.tables()?;
        Ok(tables.posts.get(&post_id).filter(|p| !p.is_deleted).cloned())
    }

    async fn soft_delete_post(&self, post_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        let Some(post) = tables.live_post_mut(post_id) else {
            return Ok(false);
        };
        post.is_deleted = true;
        post.timestamps.touch();
        tables.soft_delete_comments_where(|c| c.post_id == post_id);
        Ok(true)
    }

    async fn is_post_liked(&self, user_id: i64, post_id: i64) -> Result<bool, AppError> {
        Ok(self.tables()?.post_likes.contains(&(user_id, post_id)))
    }

    async fn set_post_like(&self, user_id: i64, post_id: i64, liked: bool) -> Result<i64, AppError> {
        let _row = self.lock_row(CounterTarget::PostLikes(post_id)).await?;
        let mut guard = self.tables()?;
        let tables = &mut *guard;
        let post = tables
            .posts
            .get_mut(&post_id)
            .filter(|p| !p.is_deleted)
            .ok_or(AppError::NotFound(format!("Post not found. ID: {post_id}")))?;

        let key = (user_id, post_id);
        let existing = tables.post_likes.contains(&key);
        if existing && !liked {
            tables.post_likes.remove(&key);
            post.like_count = (post.like_count - 1).max(0);
        } else if !existing && liked {
            tables.post_likes.insert(key);
            post.like_count += 1;
        }
        Ok(post.like_count)
    }

    async fn find_comment(&self, comment_id: i64) -> Result<Option<Comment>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .comments
            .get(&comment_id)
            .filter(|c| !c.is_deleted)
            .cloned())
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, AppError> {
        let _row = self.lock_row(CounterTarget::PostComments(new.post_id)).await?;
        let mut tables = self.tables()?;
        if !tables.posts.contains_key(&new.post_id) {
            return Err(AppError::NotFound(format!("Post not found. ID: {}", new.post_id)));
        }

        // 1. Insert with a placeholder key to obtain the generated id.
        let id = next(&mut tables.sequences.comments);
        let sort_key = new.sort_key_for(id)?;
        let mut comment = Comment {
            id,
            post_id: new.post_id,
            user_id: new.user_id,
            parent_id: new.parent_id(),
            content: new.content.clone(),
            sort_key: SortKey::placeholder(),
            depth: new.depth(),
            like_count: 0,
            is_deleted: false,
            timestamps: Timestamps::now(),
        };

        // 2. Finalize the key now that the id is known.
        comment.sort_key = sort_key;
        tables.comments.insert(id, comment.clone());

        // 3. Count it on the post.
        if let Some(post) = tables.posts.get_mut(&new.post_id) {
            post.comment_count += 1;
        }
        Ok(comment)
    }

    async fn update_comment_content(&self, comment_id: i64, content: &str) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        Ok(match tables.comments.get_mut(&comment_id).filter(|c| !c.is_deleted) {
            Some(comment) => {
                comment.content = content.to_string();
                comment.timestamps.touch();
                true
            }
            None => false,
        })
    }

    async fn soft_delete_comment(&self, comment_id: i64) -> Result<bool, AppError> {
        let post_id = self.tables()?.comments.get(&comment_id).map(|c| c.post_id);
        let Some(post_id) = post_id else {
            return Ok(false);
        };
        let _row = self.lock_row(CounterTarget::PostComments(post_id)).await?;

        let mut tables = self.tables()?;
        let Some(comment) = tables
            .comments
            .get_mut(&comment_id)
            .filter(|c| !c.is_deleted)
        else {
            return Ok(false);
        };
        comment.is_deleted = true;
        comment.timestamps.touch();
        let post_id = comment.post_id;

        if let Some(post) = tables.posts.get_mut(&post_id) {
            post.comment_count = (post.comment_count - 1).max(0);
        }
        Ok(true)
    }

    async fn count_comments(&self, post_id: i64) -> Result<i64, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .count() as i64)
    }

    async fn count_comments_up_to(&self, post_id: i64, key: &SortKey) -> Result<i64, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.sort_key <= *key)
            .count() as i64)
    }

    async fn list_comments(
        &self,
        post_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CommentRow>, AppError> {
        let tables = self.tables()?;
        let mut comments: Vec<&Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));

        let author = |user_id: i64| tables.users.get(&user_id);
        let rows = comments
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|c| {
                let parent_author_name = c
                    .parent_id
                    .and_then(|pid| tables.comments.get(&pid))
                    .and_then(|parent| author(parent.user_id))
                    .map(|u| u.username.clone());
                CommentRow {
                    id: c.id,
                    content: c.content.clone(),
                    user_id: c.user_id,
                    author_name: author(c.user_id).map(|u| u.username.clone()),
                    profile_img_url: author(c.user_id).map(|u| u.profile_img_url.clone()),
                    like_count: c.like_count,
                    is_deleted: c.is_deleted,
                    created_at: c.timestamps.created_at,
                    updated_at: c.timestamps.updated_at,
                    parent_id: c.parent_id,
                    depth: c.depth,
                    parent_author_name,
                    sort_key: c.sort_key.clone(),
                }
            })
            .collect();
        Ok(rows)
    }

    async fn liked_comment_ids(
        &self,
        user_id: i64,
        comment_ids: &[i64],
    ) -> Result<HashSet<i64>, AppError> {
        let tables = self.tables()?;
        Ok(comment_ids
            .iter()
            .copied()
            .filter(|id| tables.comment_likes.contains(&(user_id, *id)))
            .collect())
    }

    async fn set_comment_like(
        &self,
        user_id: i64,
        comment_id: i64,
        liked: bool,
    ) -> Result<i64, AppError> {
        let _row = self.lock_row(CounterTarget::CommentLikes(comment_id)).await?;
        let mut guard = self.tables()?;
        let tables = &mut *guard;
        let comment = tables
            .comments
            .get_mut(&comment_id)
            .filter(|c| !c.is_deleted)
            .ok_or(AppError::NotFound(format!("Comment not found. ID: {comment_id}")))?;

        let key = (user_id, comment_id);
        let existing = tables.comment_likes.contains(&key);
        if existing && !liked {
            tables.comment_likes.remove(&key);
            comment.like_count = (comment.like_count - 1).max(0);
        } else if !existing && liked {
            tables.comment_likes.insert(key);
            comment.like_count += 1;
        }
        Ok(comment.like_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn row_locks_are_dropped_with_their_last_guard() {
        let store = MemoryStore::new();
        for id in 1..=50 {
            // No such rows; the lock is still taken and released.
            assert!(!store.add_to_counter(CounterTarget::PostViews(id), 1).await.unwrap());
        }

        let locks = store.row_locks.lock().unwrap();
        assert!(locks.len() <= 1, "kept {} handles", locks.len());
        assert!(locks.values().all(|weak| weak.strong_count() == 0));
    }

    #[tokio::test]
    async fn held_row_lock_is_shared_by_the_same_target() {
        let store = MemoryStore::new();
        let guard = store.lock_row(CounterTarget::CommentLikes(3)).await.unwrap();

        // A different counter on another row is not blocked.
        let other = store.lock_row(CounterTarget::PostLikes(3)).await.unwrap();
        drop(other);

        let waiting = store.lock_row(CounterTarget::CommentLikes(3));
        tokio::pin!(waiting);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), &mut waiting)
                .await
                .is_err()
        );
        drop(guard);
        assert!(waiting.await.is_ok());
    }
}
