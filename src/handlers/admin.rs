use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::db::models::{ClearScope, ColumnInfo, UserTodoCounts};
use crate::db::{DatabaseInfo, Todo, UserRecord, UserStats};
use crate::middleware::auth::RequireAdmin;
use crate::{NexusError, router::NexusState};

#[derive(Debug, Default, Deserialize)]
pub struct ClearQuery {
    #[serde(default)]
    pub scope: ClearScope,
}

/// GET /admin/info
pub async fn info(_: RequireAdmin, State(state): State<NexusState>) -> Json<DatabaseInfo> {
    Json(state.diagnostics.info().await)
}

/// GET /admin/export -> `text/plain` SQL dump.
pub async fn export(_: RequireAdmin, State(state): State<NexusState>) -> Response {
    match state.diagnostics.export_sql().await {
        Some(dump) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            dump,
        )
            .into_response(),
        None => NexusError::OperationFailed("Failed to export database").into_response(),
    }
}

/// GET /admin/users
pub async fn users(_: RequireAdmin, State(state): State<NexusState>) -> Json<Vec<UserRecord>> {
    Json(state.identity.list_users().await)
}

/// GET /admin/users/count
pub async fn user_count(_: RequireAdmin, State(state): State<NexusState>) -> Json<Value> {
    Json(json!({ "count": state.identity.user_count().await }))
}

/// GET /admin/users/stats
pub async fn user_stats(_: RequireAdmin, State(state): State<NexusState>) -> Json<UserStats> {
    Json(state.identity.user_stats().await)
}

/// GET /admin/users/todo-counts
pub async fn users_with_todo_counts(
    _: RequireAdmin,
    State(state): State<NexusState>,
) -> Json<Vec<UserTodoCounts>> {
    Json(state.diagnostics.users_with_todo_counts().await)
}

/// GET /admin/todos -> every todo, highest id first.
pub async fn all_todos(
    _: RequireAdmin,
    State(state): State<NexusState>,
) -> Result<Json<Vec<Todo>>, NexusError> {
    Ok(Json(state.tasks.list_all().await?))
}

/// GET /admin/schema/{table}
pub async fn table_schema(
    _: RequireAdmin,
    State(state): State<NexusState>,
    Path(table): Path<String>,
) -> Result<Json<Vec<ColumnInfo>>, Response> {
    let columns = state.diagnostics.table_schema(&table).await;
    if columns.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": format!("no such table: {table}") })),
        )
            .into_response());
    }
    Ok(Json(columns))
}

/// POST /admin/clear?scope=todos|all
pub async fn clear(
    _: RequireAdmin,
    State(state): State<NexusState>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<Value>, NexusError> {
    let report = state.tasks.clear_all(query.scope).await?;
    Ok(Json(json!({ "success": true, "cleared": report })))
}

/// POST /admin/reset -> drop and recreate the schema.
pub async fn reset(
    _: RequireAdmin,
    State(state): State<NexusState>,
) -> Result<Json<Value>, NexusError> {
    state.store.reset().await.map_err(|e| {
        warn!(error = %e, "Error resetting database");
        NexusError::OperationFailed("Failed to reset database")
    })?;
    Ok(Json(json!({ "success": true })))
}
