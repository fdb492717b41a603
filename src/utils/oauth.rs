//! Maps provider-specific OAuth user-info payloads onto one shape.
//!
//! Each provider is a variant of [`OAuthProvider`] looked up by the
//! registration id the login was started with; every variant yields the same
//! [`OAuthUserInfo`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Spotify,
}

/// Registration id -> provider.
const PROVIDERS: &[(&str, OAuthProvider)] = &[("spotify", OAuthProvider::Spotify)];

/// Provider-neutral identity extracted from a user-info response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthUserInfo {
    pub provider: OAuthProvider,
    pub provider_id: String,
    pub email: String,
    pub name: String,
    pub image_url: Option<String>,
}

impl OAuthProvider {
    pub fn from_registration_id(registration_id: &str) -> Result<Self, AppError> {
        PROVIDERS
            .iter()
            .find(|(id, _)| *id == registration_id)
            .map(|(_, provider)| *provider)
            .ok_or_else(|| {
                AppError::NotFound(format!("Unsupported OAuth provider: {registration_id}"))
            })
    }

    pub fn registration_id(&self) -> &'static str {
        match self {
            OAuthProvider::Spotify => "spotify",
        }
    }

    pub fn extract(&self, attributes: &Value) -> Result<OAuthUserInfo, AppError> {
        match self {
            OAuthProvider::Spotify => extract_spotify(attributes),
        }
    }
}

/// Shortcut for `from_registration_id(..)?.extract(..)`.
pub fn user_info_from(registration_id: &str, attributes: &Value) -> Result<OAuthUserInfo, AppError> {
    OAuthProvider::from_registration_id(registration_id)?.extract(attributes)
}

fn extract_spotify(attributes: &Value) -> Result<OAuthUserInfo, AppError> {
    let provider_id = required_str(attributes, "id")?;
    let email = required_str(attributes, "email")?;
    // Spotify allows an empty display name; fall back to the account id.
    let name = attributes
        .get("display_name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&provider_id)
        .to_string();
    let image_url = attributes
        .get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .and_then(|image| image.get("url"))
        .and_then(Value::as_str)
        .filter(|raw| Url::parse(raw).is_ok())
        .map(str::to_string);

    Ok(OAuthUserInfo {
        provider: OAuthProvider::Spotify,
        provider_id,
        email,
        name,
        image_url,
    })
}

fn required_str(attributes: &Value, field: &str) -> Result<String, AppError> {
    attributes
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest(format!("OAuth attribute '{field}' is missing")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spotify_attributes() {
        let attrs = json!({
            "id": "sp-123",
            "email": "listener@example.com",
            "display_name": "Listener",
            "images": [
                { "url": "https://i.scdn.co/image/abc", "height": 300 },
                { "url": "https://i.scdn.co/image/small", "height": 64 }
            ]
        });

        let info = user_info_from("spotify", &attrs).unwrap();
        assert_eq!(info.provider, OAuthProvider::Spotify);
        assert_eq!(info.provider_id, "sp-123");
        assert_eq!(info.email, "listener@example.com");
        assert_eq!(info.name, "Listener");
        assert_eq!(info.image_url.as_deref(), Some("https://i.scdn.co/image/abc"));
    }

    #[test]
    fn spotify_without_images_or_name() {
        let attrs = json!({ "id": "sp-9", "email": "a@b.c", "display_name": "", "images": [] });

        let info = OAuthProvider::Spotify.extract(&attrs).unwrap();
        assert_eq!(info.name, "sp-9");
        assert_eq!(info.image_url, None);
    }

    #[test]
    fn missing_email_is_rejected() {
        let err = user_info_from("spotify", &json!({ "id": "x" })).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn unknown_provider_is_not_found() {
        let err = user_info_from("youtube", &json!({})).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(OAuthProvider::Spotify.registration_id(), "spotify");
    }
}
