// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::Timestamps;

/// Avatar used until the identity provider supplies one.
pub const DEFAULT_PROFILE_IMG: &str = "/img/t3";

/// Represents the 'users' table in the database.
///
/// Rows are created and refreshed from OAuth logins; see `utils::oauth`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Display name shown next to comments.
    pub username: String,

    /// Unique; the key OAuth logins are matched on.
    pub email: String,

    pub profile_img_url: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    pub is_deleted: bool,

    #[sqlx(flatten)]
    #[serde(flatten)]
    pub timestamps: Timestamps,
}
