use crate::db::Store;
use crate::db::models::{ColumnInfo, DatabaseInfo, UserTodoCounts};
use crate::db::schema::APP_TABLES;
use crate::error::NexusError;
use chrono::{NaiveDateTime, Utc};
use sqlx::FromRow;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::{error, info};

/// Per-record weight behind the size estimate in [`DatabaseInfo`].
pub const ESTIMATED_RECORD_BYTES: i64 = 512;

/// Read-only views over both tables for the admin viewer.
///
/// Nothing here fails loudly: reads degrade to empty values and the export
/// returns `None`, with the fault logged.
#[derive(Clone)]
pub struct Diagnostics {
    store: Arc<Store>,
}

#[derive(FromRow)]
#[sqlx(rename_all = "camelCase")]
struct ExportUser {
    id: i64,
    username: String,
    email: String,
    created_at: Option<NaiveDateTime>,
}

#[derive(FromRow)]
#[sqlx(rename_all = "camelCase")]
struct ExportTodo {
    user_id: i64,
    title: String,
    completed: bool,
    created_at: Option<NaiveDateTime>,
}

impl Diagnostics {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn info(&self) -> DatabaseInfo {
        match self.try_info().await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "Error getting database info");
                DatabaseInfo {
                    location: self.store.location().to_string(),
                    platform_hint: platform_hint().to_string(),
                    tables: Vec::new(),
                    user_count: 0,
                    todo_count: 0,
                    total_records: 0,
                    estimated_size_kb: 1,
                }
            }
        }
    }

    async fn try_info(&self) -> Result<DatabaseInfo, NexusError> {
        let pool = self.store.pool().await?;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&pool)
        .await?;
        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await?;
        let todo_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todos")
            .fetch_one(&pool)
            .await?;
        let total_records = user_count + todo_count;

        Ok(DatabaseInfo {
            location: resolve_location(self.store.location()),
            platform_hint: platform_hint().to_string(),
            tables,
            user_count,
            todo_count,
            total_records,
            estimated_size_kb: estimate_size_kb(total_records),
        })
    }

    /// Dump of both tables as replayable SQL. Password digests are never written.
    pub async fn export_sql(&self) -> Option<String> {
        match self.try_export_sql().await {
            Ok(dump) => {
                info!(bytes = dump.len(), "database exported");
                Some(dump)
            }
            Err(e) => {
                error!(error = %e, "Error exporting database");
                None
            }
        }
    }

    async fn try_export_sql(&self) -> Result<String, NexusError> {
        let pool = self.store.pool().await?;

        let mut ddl = Vec::with_capacity(APP_TABLES.len());
        for table in APP_TABLES {
            let sql: String = sqlx::query_scalar(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await?;
            ddl.push(replayable_ddl(&sql));
        }
        let users: Vec<ExportUser> =
            sqlx::query_as("SELECT id, username, email, createdAt FROM users ORDER BY id")
                .fetch_all(&pool)
                .await?;
        let todos: Vec<ExportTodo> =
            sqlx::query_as("SELECT userId, title, completed, createdAt FROM todos ORDER BY id")
                .fetch_all(&pool)
                .await?;

        let mut out = String::new();
        write_dump(&mut out, &ddl, &users, &todos)
            .map_err(|_| NexusError::OperationFailed("Failed to export database"))?;
        Ok(out)
    }

    /// Column layout of `table`; empty for unknown tables.
    pub async fn table_schema(&self, table: &str) -> Vec<ColumnInfo> {
        let columns = async {
            let pool = self.store.pool().await?;
            let rows: Vec<ColumnInfo> = sqlx::query_as(
                r#"SELECT cid, name, type, "notnull", dflt_value, pk FROM pragma_table_info(?)"#,
            )
            .bind(table)
            .fetch_all(&pool)
            .await?;
            Ok::<_, NexusError>(rows)
        };
        columns.await.unwrap_or_else(|e| {
            error!(table, error = %e, "Error reading table schema");
            Vec::new()
        })
    }

    /// Each user with total, completed and pending todo counts.
    pub async fn users_with_todo_counts(&self) -> Vec<UserTodoCounts> {
        let rows = async {
            let pool = self.store.pool().await?;
            let rows: Vec<UserTodoCounts> = sqlx::query_as(
                r#"
                SELECT
                    u.id,
                    u.username,
                    u.email,
                    u.createdAt,
                    COUNT(t.id) AS todoCount,
                    COUNT(CASE WHEN t.completed = 1 THEN 1 END) AS completedTodos,
                    COUNT(CASE WHEN t.completed = 0 THEN 1 END) AS pendingTodos
                FROM users u
                LEFT JOIN todos t ON u.id = t.userId
                GROUP BY u.id, u.username, u.email, u.createdAt
                ORDER BY u.createdAt DESC, u.id DESC
                "#,
            )
            .fetch_all(&pool)
            .await?;
            Ok::<_, NexusError>(rows)
        };
        rows.await.unwrap_or_else(|e| {
            error!(error = %e, "Error getting users with todo counts");
            Vec::new()
        })
    }
}

/// Users keep their ids so every todo's `userId` still points at its owner
/// after replay. The digest is withheld; an empty one never matches a login.
fn write_dump(
    out: &mut String,
    ddl: &[String],
    users: &[ExportUser],
    todos: &[ExportTodo],
) -> fmt::Result {
    writeln!(out, "-- todo-nexus database export")?;
    writeln!(out, "-- Generated: {}", Utc::now().to_rfc3339())?;
    writeln!(out)?;
    for stmt in ddl {
        writeln!(out, "{stmt};\n")?;
    }
    for u in users {
        writeln!(
            out,
            "INSERT INTO users (id, username, email, password, createdAt) VALUES ({}, {}, {}, '', {});",
            u.id,
            quote(&u.username),
            quote(&u.email),
            quote_timestamp(u.created_at),
        )?;
    }
    writeln!(out)?;
    for t in todos {
        writeln!(
            out,
            "INSERT INTO todos (userId, title, completed, createdAt) VALUES ({}, {}, {}, {});",
            t.user_id,
            quote(&t.title),
            i32::from(t.completed),
            quote_timestamp(t.created_at),
        )?;
    }
    Ok(())
}

/// `records * ESTIMATED_RECORD_BYTES` in KiB, rounded up, at least 1.
pub fn estimate_size_kb(records: i64) -> i64 {
    let bytes = records.max(0) * ESTIMATED_RECORD_BYTES;
    ((bytes + 1023) / 1024).max(1)
}

pub fn platform_hint() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux: relative paths resolve against the service working directory",
        "macos" => "macOS: relative paths resolve against the service working directory",
        "windows" => "Windows: relative paths resolve against the service working directory",
        "android" => "Android: stored in the app's private databases directory",
        "ios" => "iOS: stored in the app's Documents/SQLite directory",
        _ => "Stored next to the running process",
    }
}

fn resolve_location(url: &str) -> String {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.contains(":memory:") {
        return "In-memory database (no file on disk)".to_string();
    }
    std::path::absolute(path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.to_string())
}

/// `sqlite_master` keeps `CREATE TABLE name`; the dump must also replay over
/// a schema that `open` has already created.
fn replayable_ddl(ddl: &str) -> String {
    match ddl.strip_prefix("CREATE TABLE ") {
        Some(rest) if !rest.starts_with("IF NOT EXISTS") => {
            format!("CREATE TABLE IF NOT EXISTS {rest}")
        }
        _ => ddl.to_string(),
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn quote_timestamp(ts: Option<NaiveDateTime>) -> String {
    match ts {
        Some(ts) => quote(&ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        None => "NULL".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::identity::IdentityRepository;
    use crate::service::tasks::TaskRepository;

    #[test]
    fn size_estimate_has_floor() {
        assert_eq!(estimate_size_kb(0), 1);
        assert_eq!(estimate_size_kb(1), 1);
        assert_eq!(estimate_size_kb(2), 1);
        assert_eq!(estimate_size_kb(3), 2);
        assert_eq!(estimate_size_kb(10), 5);
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(quote("it's"), "'it''s'");
        assert_eq!(quote("''"), "''''''");
    }

    #[test]
    fn ddl_is_made_replayable() {
        assert_eq!(
            replayable_ddl("CREATE TABLE users (id INTEGER)"),
            "CREATE TABLE IF NOT EXISTS users (id INTEGER)"
        );
        assert_eq!(
            replayable_ddl("CREATE TABLE IF NOT EXISTS users (id INTEGER)"),
            "CREATE TABLE IF NOT EXISTS users (id INTEGER)"
        );
    }

    #[test]
    fn memory_location_gets_placeholder() {
        assert_eq!(
            resolve_location("sqlite::memory:"),
            "In-memory database (no file on disk)"
        );
        assert!(resolve_location("sqlite:todos.db").ends_with("todos.db"));
    }

    async fn seeded() -> (Arc<Store>, Diagnostics) {
        let store = Arc::new(Store::new("sqlite::memory:").unwrap());
        let identity = IdentityRepository::new(store.clone());
        let tasks = TaskRepository::new(store.clone());

        let alice = identity.register("o'brien", "ob@x.io", "secret1").await.unwrap();
        let bob = identity.register("bob", "bob@x.io", "secret1").await.unwrap();
        tasks.add_todo(alice.id, "don't forget;\nsecond line").await.unwrap();
        let done = tasks.add_todo(alice.id, "done").await.unwrap();
        tasks.set_completed(done, true).await.unwrap();
        tasks.add_todo(bob.id, "bob's").await.unwrap();

        (store.clone(), Diagnostics::new(store))
    }

    #[tokio::test]
    async fn info_counts_records() {
        let (_store, diag) = seeded().await;
        let info = diag.info().await;

        assert_eq!(info.user_count, 2);
        assert_eq!(info.todo_count, 3);
        assert_eq!(info.total_records, 5);
        assert_eq!(info.estimated_size_kb, 3);
        assert!(info.tables.contains(&"users".to_string()));
        assert!(info.tables.contains(&"todos".to_string()));
    }

    #[tokio::test]
    async fn export_never_contains_digest() {
        let (_store, diag) = seeded().await;
        let dump = diag.export_sql().await.unwrap();

        assert!(dump.contains("'o''brien'"));
        assert!(dump.contains("'don''t forget;\nsecond line'"));
        assert!(!dump.contains(&crate::service::digest::rolling_hash("secret1")));
    }

    #[tokio::test]
    async fn export_replays_to_same_counts() {
        let (_store, diag) = seeded().await;
        let dump = diag.export_sql().await.unwrap();

        let target = Arc::new(Store::new("sqlite::memory:").unwrap());
        let pool = target.pool().await.unwrap();
        sqlx::raw_sql(&dump).execute(&pool).await.unwrap();

        let replayed = Diagnostics::new(target).info().await;
        assert_eq!(replayed.user_count, 2);
        assert_eq!(replayed.todo_count, 3);

        let counts = diag.users_with_todo_counts().await;
        let ob = counts.iter().find(|c| c.username == "o'brien").unwrap();
        assert_eq!((ob.todo_count, ob.completed_todos, ob.pending_todos), (2, 1, 1));
    }

    #[tokio::test]
    async fn export_keeps_owners_when_ids_have_gaps() {
        use crate::db::ClearScope;

        let store = Arc::new(Store::new("sqlite::memory:").unwrap());
        let identity = IdentityRepository::new(store.clone());
        let tasks = TaskRepository::new(store.clone());
        identity.register("zed", "zed@x.io", "secret1").await.unwrap();
        tasks.clear_all(ClearScope::All).await.unwrap();
        let bob = identity.register("bob", "bob@x.io", "secret1").await.unwrap();
        let carol = identity.register("carol", "carol@x.io", "secret1").await.unwrap();
        assert_eq!((bob.id, carol.id), (2, 3));
        tasks.add_todo(bob.id, "bob's errand").await.unwrap();

        let dump = Diagnostics::new(store).export_sql().await.unwrap();
        let target = Arc::new(Store::new("sqlite::memory:").unwrap());
        let pool = target.pool().await.unwrap();
        sqlx::raw_sql(&dump).execute(&pool).await.unwrap();

        let owner: String = sqlx::query_scalar(
            "SELECT u.username FROM todos t JOIN users u ON u.id = t.userId \
             WHERE t.title = 'bob''s errand'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(owner, "bob");
        let carols = TaskRepository::new(target).list_todos(carol.id).await.unwrap();
        assert!(carols.is_empty());
    }

    #[tokio::test]
    async fn schema_lists_todo_columns() {
        let (_store, diag) = seeded().await;
        let cols = diag.table_schema("todos").await;

        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "userId", "title", "completed", "createdAt"]);
        let user_id = &cols[1];
        assert!(user_id.not_null);
        assert!(!user_id.primary_key);
        assert!(cols[0].primary_key);
        assert!(diag.table_schema("nope").await.is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nope").join("db").display());
        let diag = Diagnostics::new(Arc::new(Store::new(&url).unwrap()));

        assert!(diag.export_sql().await.is_none());
        let info = diag.info().await;
        assert_eq!((info.total_records, info.estimated_size_kb), (0, 1));
        assert!(diag.users_with_todo_counts().await.is_empty());
    }
}
