//! Session surface: the current user lives in an encrypted private cookie.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use time::Duration;
use tracing::warn;

use crate::db::User;
use crate::error::NexusError;

pub const SESSION_COOKIE: &str = "currentUser";

/// Cookie attributes shared by every session write.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub secure: bool,
    pub max_age: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            secure: true,
            max_age: Duration::days(30),
        }
    }
}

/// The logged-in user, if any. A cookie that fails to decode counts as no session.
pub fn current_user(jar: &PrivateCookieJar) -> Option<User> {
    let cookie = jar.get(SESSION_COOKIE)?;
    serde_json::from_str(cookie.value())
        .inspect_err(|e| warn!(error = %e, "discarding unreadable session cookie"))
        .ok()
}

pub fn set_session(
    jar: PrivateCookieJar,
    user: &User,
    policy: SessionPolicy,
) -> Result<PrivateCookieJar, NexusError> {
    let value = serde_json::to_string(user)
        .map_err(|_| NexusError::OperationFailed("Failed to store session"))?;
    let cookie = Cookie::build(Cookie::new(SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(policy.secure)
        .same_site(SameSite::Lax)
        .max_age(policy.max_age)
        .build();
    Ok(jar.add(cookie))
}

pub fn clear_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
}

/// Extractor for routes that act on behalf of a user; rejects with `NotLoggedIn`.
#[derive(Debug, Clone)]
pub struct RequireSession(pub User);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = NexusError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .map_err(|_| NexusError::NotLoggedIn)?;
        current_user(&jar)
            .map(RequireSession)
            .ok_or(NexusError::NotLoggedIn)
    }
}
