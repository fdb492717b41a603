use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{error::AppError, models::board::CreateBoardRequest, services::boards, state::AppState};

/// Create a board (Admin only).
pub async fn create_board(
    State(state): State<AppState>,
    Json(payload): Json<CreateBoardRequest>,
) -> Result<impl IntoResponse, AppError> {
    let board = boards::create_board(state.store.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

/// Soft-delete a board, its posts and their comments (Admin only).
pub async fn delete_board(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    boards::delete_board(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
