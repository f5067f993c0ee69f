use axum::extract::{FromRef, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};
use std::borrow::Cow;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::NexusError;

/// Static admin password guarding the database viewer routes.
#[derive(Debug, Clone)]
pub struct AdminKey(pub Arc<str>);

impl AdminKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Exact string match.
    pub fn matches(&self, candidate: &str) -> bool {
        bool::from(candidate.as_bytes().ct_eq(self.0.as_bytes()))
    }
}

/// Where an admin key may arrive, in the order they are tried.
fn presented_keys<'a>(headers: &'a HeaderMap, query: Option<&'a str>) -> Vec<Cow<'a, str>> {
    let mut keys = Vec::new();
    if let Some(hv) = headers.get("x-admin-key").and_then(|v| v.to_str().ok()) {
        keys.push(Cow::Borrowed(hv));
    }
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .and_then(|auth| {
            auth.strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
        })
    {
        keys.push(Cow::Borrowed(token));
    }
    if let Some(qs) = query {
        keys.extend(
            url::form_urlencoded::parse(qs.as_bytes())
                .filter(|(k, _)| k == "key")
                .map(|(_, v)| v),
        );
    }
    keys
}

/// `Unauthorized` unless one of `x-admin-key`, `Authorization: Bearer` or
/// `?key=` carries the configured key.
pub fn ensure_admin(
    key: &AdminKey,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<(), NexusError> {
    if presented_keys(headers, query)
        .iter()
        .any(|candidate| key.matches(candidate))
    {
        Ok(())
    } else {
        Err(NexusError::Unauthorized)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AdminKey: FromRef<S>,
{
    type Rejection = NexusError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        ensure_admin(&AdminKey::from_ref(state), &parts.headers, parts.uri.query())
            .map(|()| Self)
    }
}
