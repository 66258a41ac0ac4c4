//! Bearer token extraction.
//!
//! The hosted auth service sits in front of this server and forwards the
//! member's profile id as the bearer token. With `AUTH_SECRET` configured the
//! token is `<profile_id>:<secret>` and anonymous requests are refused.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::AppState;

/// Caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Acting member, `None` for anonymous readers
    pub profile_id: Option<String>,
}

impl AuthUser {
    pub fn anonymous() -> Self {
        Self { profile_id: None }
    }

    pub fn member(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: Some(profile_id.into()),
        }
    }

    /// The acting member, or `Unauthorized` for anonymous callers.
    pub fn require_member(&self) -> Result<&str> {
        self.profile_id.as_deref().ok_or(AppError::Unauthorized)
    }

    /// The acting member if they may create events.
    pub fn require_admin(&self, config: &Config) -> Result<&str> {
        let profile_id = self.require_member()?;
        if config.is_admin(profile_id) {
            Ok(profile_id)
        } else {
            Err(AppError::Forbidden("only club admins can do that".to_string()))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        authenticate(auth_header, state.config.auth_secret.as_deref())
            .map_err(|reason| (StatusCode::UNAUTHORIZED, reason))
    }
}

/// Resolve the caller from an `Authorization` header value.
pub(crate) fn authenticate(
    header: Option<&str>,
    secret: Option<&str>,
) -> std::result::Result<AuthUser, &'static str> {
    let Some(header) = header else {
        return match secret {
            None => Ok(AuthUser::anonymous()),
            Some(_) => Err("Missing authorization header"),
        };
    };

    let token = header
        .strip_prefix("Bearer ")
        .ok_or("Invalid authorization header format")?
        .trim();
    if token.is_empty() {
        return Err("Empty bearer token");
    }

    let profile_id = match secret {
        None => token,
        Some(secret) => match token.rsplit_once(':') {
            Some((profile_id, given)) if given == secret => profile_id,
            _ => return Err("Invalid bearer token"),
        },
    };
    if profile_id.is_empty() {
        return Err("Empty bearer token");
    }

    Ok(AuthUser::member(profile_id))
}
