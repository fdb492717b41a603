use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::Timestamps;

/// Represents the 'boards' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_deleted: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// DTO for creating a board.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBoardRequest {
    #[validate(length(
        min = 1,
        max = 50,
        message = "Board name must be between 1 and 50 characters"
    ))]
    pub name: String,

    #[validate(length(max = 50))]
    pub description: Option<String>,
}
