use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Public identity of a registered user. This is also what the session holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// User listing row for admin views (no digest).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct Todo {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub completed: bool,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct RecentUser {
    pub username: String,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: i64,
    pub today_users: i64,
    pub week_users: i64,
    pub recent_user: Option<RecentUser>,
    pub last_updated: DateTime<Utc>,
}

impl UserStats {
    pub fn empty() -> Self {
        Self {
            total_users: 0,
            today_users: 0,
            week_users: 0,
            recent_user: None,
            last_updated: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct UserTodoCounts {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: Option<NaiveDateTime>,
    pub todo_count: i64,
    pub completed_todos: i64,
    pub pending_todos: i64,
}

/// One row of `pragma_table_info`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub column_type: String,
    #[sqlx(rename = "notnull")]
    pub not_null: bool,
    #[sqlx(rename = "dflt_value")]
    pub default_value: Option<String>,
    #[sqlx(rename = "pk")]
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub location: String,
    pub platform_hint: String,
    pub tables: Vec<String>,
    pub user_count: i64,
    pub todo_count: i64,
    pub total_records: i64,
    pub estimated_size_kb: i64,
}

/// Which tables an administrative clear wipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    /// Baseline clear: todos only.
    #[default]
    Todos,
    /// Protected clear: todos and users.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub todos_deleted: u64,
    pub users_deleted: u64,
}
