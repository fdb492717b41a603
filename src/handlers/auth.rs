// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::{Value, json};

use crate::{error::AppError, services::auth, state::AppState};

/// Logs a user in from an OAuth provider's user-info response.
///
/// `provider` is the registration id (e.g. `spotify`); the body is the
/// provider's user-info JSON as obtained after the code exchange.
/// Returns a JWT for the created or refreshed user.
pub async fn oauth_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(attributes): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let (user, token) =
        auth::login_with_provider(state.store.as_ref(), &state.config, &provider, &attributes)
            .await?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": user
    })))
}
