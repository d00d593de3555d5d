//! API-key authentication
//!
//! Keys arrive either in an `apiKey` header or as a bearer token. The
//! extractor resolves the key to a user row; permission helpers check
//! the superuser flag or per-project group roles.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use taskhive_core::Role;

use crate::db::repos::{User, UserRepo};

use super::error::ApiError;
use super::server::AppState;

/// The user resolved from the request's API key
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let key = api_key_from_headers(parts).ok_or(ApiError::Unauthorized {
            reason: "missing API key",
        })?;

        let user = UserRepo::new(&state.pool)
            .find_by_api_key(&key)
            .await
            .map_err(ApiError::from)?
            .ok_or(ApiError::Unauthorized {
                reason: "unknown API key",
            })?;

        Ok(Self(user))
    }
}

/// Pull the API key out of `apiKey:` or `Authorization: Bearer`.
fn api_key_from_headers(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get("apikey") {
        if let Ok(key) = value.to_str() {
            let key = key.trim();
            if !key.is_empty() {
                return Some(key.to_owned());
            }
        }
    }

    let auth = parts.headers.get("authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ").or_else(|| auth.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_owned())
    }
}

/// Fail with 403 unless the user is a superuser.
pub fn require_superuser(user: &User) -> Result<(), ApiError> {
    if user.is_superuser {
        Ok(())
    } else {
        Err(ApiError::forbidden("superuser required"))
    }
}

/// Fail with 403 unless the user holds `required` (or stronger) on the
/// project. Superusers always pass.
pub async fn require_project_role(
    state: &AppState,
    user: &User,
    project_id: i64,
    required: Role,
) -> Result<(), ApiError> {
    if user.is_superuser {
        return Ok(());
    }

    let held = UserRepo::new(&state.pool)
        .role_on_project(user.id, project_id)
        .await
        .map_err(ApiError::from)?;

    match held {
        Some(role) if role.grants(required) => Ok(()),
        _ => Err(ApiError::forbidden(format!(
            "{} role required on project {}",
            required.as_str(),
            project_id
        ))),
    }
}

/// Fail with 403 unless the user is acting on themselves or is a
/// superuser.
pub fn require_self_or_superuser(user: &User, target_id: i64) -> Result<(), ApiError> {
    if user.id == target_id || user.is_superuser {
        Ok(())
    } else {
        Err(ApiError::forbidden("may only act on your own account"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::Utc;

    fn parts_with(name: &str, value: &str) -> Parts {
        let request = Request::builder()
            .header(name, value)
            .body(())
            .expect("request build");
        request.into_parts().0
    }

    fn user(id: i64, is_superuser: bool) -> User {
        User {
            id,
            osm_id: id * 100,
            display_name: format!("user-{}", id),
            avatar_url: None,
            oauth_token: None,
            oauth_secret: None,
            api_key: None,
            is_superuser,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn reads_api_key_header() {
        let parts = parts_with("apiKey", "abc123");
        assert_eq!(api_key_from_headers(&parts).as_deref(), Some("abc123"));
    }

    #[test]
    fn reads_bearer_token() {
        let parts = parts_with("Authorization", "Bearer xyz");
        assert_eq!(api_key_from_headers(&parts).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_key_is_none() {
        let parts = parts_with("x-other", "nope");
        assert!(api_key_from_headers(&parts).is_none());
    }

    #[test]
    fn blank_key_is_none() {
        let parts = parts_with("apiKey", "   ");
        assert!(api_key_from_headers(&parts).is_none());
    }

    #[test]
    fn superuser_check() {
        assert!(require_superuser(&user(1, true)).is_ok());
        assert!(require_superuser(&user(1, false)).is_err());
    }

    #[test]
    fn self_or_superuser_check() {
        assert!(require_self_or_superuser(&user(1, false), 1).is_ok());
        assert!(require_self_or_superuser(&user(1, false), 2).is_err());
        assert!(require_self_or_superuser(&user(1, true), 2).is_ok());
    }
}
