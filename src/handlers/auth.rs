use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::middleware::session::{clear_session, current_user, set_session};
use crate::service::validation::{validate_login, validate_registration};
use crate::{NexusError, router::NexusState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/register -> creates the account and starts a session.
pub async fn register(
    State(state): State<NexusState>,
    jar: PrivateCookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, NexusError> {
    let form = validate_registration(
        &req.username,
        &req.email,
        &req.password,
        req.confirm_password.as_deref(),
    )?;
    let user = state
        .identity
        .register(form.username, form.email, form.password)
        .await?;
    let jar = set_session(jar, &user, state.session)?;
    Ok((jar, Json(json!({ "success": true, "user": user }))))
}

/// POST /api/login
pub async fn login(
    State(state): State<NexusState>,
    jar: PrivateCookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, NexusError> {
    let username = validate_login(&req.username, &req.password)?;
    let user = state.identity.login(username, &req.password).await?;
    info!(user_id = user.id, "session started");
    let jar = set_session(jar, &user, state.session)?;
    Ok((jar, Json(json!({ "success": true, "user": user }))))
}

/// POST /api/logout
pub async fn logout(jar: PrivateCookieJar) -> impl IntoResponse {
    (clear_session(jar), Json(json!({ "success": true })))
}

/// GET /api/me -> `{"loggedIn": bool, "user": User | null}`
pub async fn me(jar: PrivateCookieJar) -> impl IntoResponse {
    let user = current_user(&jar);
    Json(json!({ "loggedIn": user.is_some(), "user": user }))
}
