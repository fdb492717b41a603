//! Comment write paths and the ordered listing.
//!
//! Writes resolve a comment's position once, when it is created, by giving it
//! a [`SortKey`](crate::ranking::SortKey). Reads are then a plain range scan
//! ordered by that key, and the page a comment sits on is a single count.

use validator::Validate;

use crate::config::Config;
use crate::error::AppError;
use crate::models::comment::{
    Comment, CommentView, CommentWriteResponse, CreateCommentRequest, LikeResponse, NewComment,
    ParentAnchor, UpdateCommentRequest,
};
use crate::ranking::{Page, PageRequest, SortKey, page_number_of};
use crate::store::ForumStore;
use crate::utils::html::clean_html;

/// Creates a comment or a reply and reports the page it landed on.
pub async fn create_comment(
    store: &dyn ForumStore,
    config: &Config,
    author_id: i64,
    payload: CreateCommentRequest,
) -> Result<CommentWriteResponse, AppError> {
    payload.validate()?;

    let post = store
        .find_post(payload.post_id)
        .await?
        .ok_or(AppError::NotFound(format!("Post not found. ID: {}", payload.post_id)))?;
    store
        .find_user(author_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let parent = match payload.parent_comment_id {
        Some(parent_id) => {
            let parent = find_live_comment(store, parent_id).await?;
            check_reply_target(&parent, post.id, config.max_comment_depth)?;
            Some(ParentAnchor::from(&parent))
        }
        None => None,
    };

    let comment = store
        .insert_comment(NewComment {
            post_id: post.id,
            user_id: author_id,
            content: sanitize(&payload.content)?,
            parent,
        })
        .await?;

    let page_number = page_of(store, config, comment.post_id, &comment.sort_key).await?;
    tracing::info!(
        "Comment {} created on post {} (depth {}, page {})",
        comment.id,
        comment.post_id,
        comment.depth,
        page_number
    );

    Ok(CommentWriteResponse {
        comment_id: comment.id,
        page_number,
    })
}

/// One page of a post's comments in thread order, with the viewer's likes.
///
/// Deleted comments stay in the page with placeholder content so that
/// positions and reply chains do not shift.
pub async fn list_comments(
    store: &dyn ForumStore,
    post_id: i64,
    viewer_id: Option<i64>,
    page: PageRequest,
) -> Result<Page<CommentView>, AppError> {
    store
        .find_post(post_id)
        .await?
        .ok_or(AppError::NotFound(format!("Post not found. ID: {post_id}")))?;

    let total = store.count_comments(post_id).await?;
    let rows = store
        .list_comments(post_id, page.offset(), page.limit())
        .await?;
    if rows.is_empty() {
        return Ok(Page::new(Vec::new(), page, total));
    }

    let liked = match viewer_id {
        Some(user_id) => {
            let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
            store.liked_comment_ids(user_id, &ids).await?
        }
        None => Default::default(),
    };

    let content = rows
        .into_iter()
        .map(|row| {
            let is_liked = liked.contains(&row.id);
            CommentView::from_row(row, is_liked)
        })
        .collect();
    Ok(Page::new(content, page, total))
}

/// Replaces a comment's content. Position is unchanged; the page is
/// returned so the client can navigate back to it.
pub async fn edit_comment(
    store: &dyn ForumStore,
    config: &Config,
    comment_id: i64,
    editor_id: i64,
    payload: UpdateCommentRequest,
) -> Result<CommentWriteResponse, AppError> {
    payload.validate()?;

    let comment = find_live_comment(store, comment_id).await?;
    if comment.user_id != editor_id {
        return Err(AppError::Forbidden(
            "You are not allowed to edit this comment".to_string(),
        ));
    }

    if !store
        .update_comment_content(comment.id, &sanitize(&payload.content)?)
        .await?
    {
        return Err(not_found(comment_id));
    }

    let page_number = page_of(store, config, comment.post_id, &comment.sort_key).await?;
    Ok(CommentWriteResponse {
        comment_id: comment.id,
        page_number,
    })
}

/// Soft-deletes a comment and decrements its post's comment count.
pub async fn delete_comment(
    store: &dyn ForumStore,
    comment_id: i64,
    user_id: i64,
) -> Result<(), AppError> {
    let comment = find_live_comment(store, comment_id).await?;
    if comment.user_id != user_id {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this comment".to_string(),
        ));
    }

    if !store.soft_delete_comment(comment_id).await? {
        // Lost a race with another delete.
        return Err(not_found(comment_id));
    }
    tracing::info!("Comment {} soft-deleted by user {}", comment_id, user_id);
    Ok(())
}

/// Brings the user's like on a comment to `should_be_liked`.
pub async fn like_comment(
    store: &dyn ForumStore,
    comment_id: i64,
    user_id: i64,
    should_be_liked: bool,
) -> Result<LikeResponse, AppError> {
    store
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    let comment = find_live_comment(store, comment_id).await?;

    let like_count = store
        .set_comment_like(user_id, comment.id, should_be_liked)
        .await?;
    Ok(LikeResponse {
        like_count,
        is_liked: should_be_liked,
    })
}

/// 0-based page of the comment with `key` under the configured page size.
pub async fn page_of(
    store: &dyn ForumStore,
    config: &Config,
    post_id: i64,
    key: &SortKey,
) -> Result<i64, AppError> {
    let rank = store.count_comments_up_to(post_id, key).await?;
    Ok(page_number_of(rank, config.comment_page_size))
}

fn check_reply_target(parent: &Comment, post_id: i64, max_depth: i32) -> Result<(), AppError> {
    if parent.post_id != post_id {
        return Err(AppError::BadRequest(format!(
            "Comment {} belongs to a different post",
            parent.id
        )));
    }
    // The child key is built from the parent's, so it has to be final and
    // agree with the row it is stored on.
    let key = SortKey::parse(parent.sort_key.as_str())?;
    if key.own_id() != Some(parent.id) || key.depth() != parent.depth as usize {
        return Err(AppError::InternalServerError(format!(
            "Comment {} has an inconsistent sort key: {}",
            parent.id, key
        )));
    }
    if parent.depth + 1 > max_depth {
        return Err(AppError::BadRequest(format!(
            "Replies cannot be nested deeper than {max_depth} levels"
        )));
    }
    Ok(())
}

/// Markup-only content sanitizes to nothing and is rejected like an empty body.
fn sanitize(content: &str) -> Result<String, AppError> {
    let cleaned = clean_html(content);
    if cleaned.trim().is_empty() {
        return Err(AppError::BadRequest("Comment must not be empty".to_string()));
    }
    Ok(cleaned)
}

async fn find_live_comment(store: &dyn ForumStore, comment_id: i64) -> Result<Comment, AppError> {
    store
        .find_comment(comment_id)
        .await?
        .ok_or_else(|| not_found(comment_id))
}

fn not_found(comment_id: i64) -> AppError {
    AppError::NotFound(format!("Comment not found. ID: {comment_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timestamps;

    fn comment(id: i64, post_id: i64, sort_key: SortKey, depth: i32) -> Comment {
        Comment {
            id,
            post_id,
            user_id: 1,
            parent_id: None,
            content: "x".to_string(),
            sort_key,
            depth,
            like_count: 0,
            is_deleted: false,
            timestamps: Timestamps::now(),
        }
    }

    #[test]
    fn reply_target_must_be_on_the_same_post() {
        let parent = comment(4, 1, SortKey::assign(4, None).unwrap(), 0);
        assert!(check_reply_target(&parent, 1, 10).is_ok());
        assert!(matches!(
            check_reply_target(&parent, 2, 10),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn reply_target_depth_ceiling() {
        let root = SortKey::assign(1, None).unwrap();
        let child = SortKey::assign(2, Some(&root)).unwrap();
        let parent = comment(2, 1, child, 1);

        assert!(check_reply_target(&parent, 1, 2).is_ok());
        assert!(matches!(
            check_reply_target(&parent, 1, 1),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn reply_target_with_unfinished_key_is_rejected() {
        let parent = comment(9, 1, SortKey::placeholder(), 0);
        assert!(matches!(
            check_reply_target(&parent, 1, 10),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn reply_target_key_must_match_its_row() {
        // Key of comment 3 stored on comment 9.
        let parent = comment(9, 1, SortKey::assign(3, None).unwrap(), 0);
        assert!(matches!(
            check_reply_target(&parent, 1, 10),
            Err(AppError::InternalServerError(_))
        ));

        // Depth disagrees with the key.
        let parent = comment(3, 1, SortKey::assign(3, None).unwrap(), 2);
        assert!(matches!(
            check_reply_target(&parent, 1, 10),
            Err(AppError::InternalServerError(_))
        ));
    }

    #[test]
    fn markup_only_content_is_empty() {
        assert!(matches!(
            sanitize("<script>alert(1)</script>"),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(sanitize("<b>hi</b>").unwrap(), "<b>hi</b>");
    }
}
