use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;
use crate::models::user::User;
use crate::store::ForumStore;
use crate::utils::{jwt::sign_jwt, oauth::user_info_from};

/// Signs in with a provider's user-info payload.
///
/// The user is created on first login and refreshed afterwards; either way a
/// fresh token is issued for them.
pub async fn login_with_provider(
    store: &dyn ForumStore,
    config: &Config,
    registration_id: &str,
    attributes: &Value,
) -> Result<(User, String), AppError> {
    let info = user_info_from(registration_id, attributes)?;
    let user = store.upsert_oauth_user(&info).await?;

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!("User {} signed in via {}", user.id, registration_id);
    Ok((user, token))
}
