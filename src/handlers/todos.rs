use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::db::Todo;
use crate::middleware::session::{RequireSession, current_user};
use crate::{NexusError, router::NexusState};

#[derive(Debug, Deserialize)]
pub struct CreateTodo {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SetCompleted {
    pub completed: bool,
}

/// GET /api/todos -> the caller's todos; empty without a session.
pub async fn list(
    State(state): State<NexusState>,
    jar: PrivateCookieJar,
) -> Result<Json<Vec<Todo>>, NexusError> {
    let Some(user) = current_user(&jar) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(state.tasks.list_todos(user.id).await?))
}

/// POST /api/todos
pub async fn create(
    State(state): State<NexusState>,
    RequireSession(user): RequireSession,
    Json(req): Json<CreateTodo>,
) -> Result<Json<Value>, NexusError> {
    let id = state.tasks.add_todo(user.id, &req.title).await?;
    debug!(todo_id = id, user_id = user.id, "todo added");
    Ok(Json(json!({ "success": true, "insertedId": id })))
}

/// PATCH /api/todos/{id}
pub async fn set_completed(
    State(state): State<NexusState>,
    RequireSession(user): RequireSession,
    Path(id): Path<i64>,
    Json(req): Json<SetCompleted>,
) -> Result<Json<Value>, NexusError> {
    if state.strict_ownership {
        state
            .tasks
            .set_completed_owned(id, user.id, req.completed)
            .await?;
    } else {
        state.tasks.set_completed(id, req.completed).await?;
    }
    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/todos/{id}
pub async fn delete(
    State(state): State<NexusState>,
    RequireSession(user): RequireSession,
    Path(id): Path<i64>,
) -> Result<Json<Value>, NexusError> {
    if state.strict_ownership {
        state.tasks.delete_todo_owned(id, user.id).await?;
    } else {
        state.tasks.delete_todo(id).await?;
    }
    Ok(Json(json!({ "success": true })))
}
