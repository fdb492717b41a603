use validator::Validate;

use crate::error::AppError;
use crate::models::board::{Board, CreateBoardRequest};
use crate::store::ForumStore;

pub async fn create_board(store: &dyn ForumStore, payload: CreateBoardRequest) -> Result<Board, AppError> {
    payload.validate()?;

    let board = store
        .create_board(payload.name.trim(), payload.description.as_deref())
        .await?;
    tracing::info!("Board {} ({}) created", board.id, board.name);
    Ok(board)
}

/// Soft-deletes a board, its posts and their comments in one cascade.
pub async fn delete_board(store: &dyn ForumStore, board_id: i64) -> Result<(), AppError> {
    if !store.soft_delete_board(board_id).await? {
        return Err(AppError::NotFound(format!("Board not found. ID: {board_id}")));
    }
    tracing::info!("Board {} soft-deleted with its posts and comments", board_id);
    Ok(())
}
