use crate::db::schema::{
    self, CREATE_TODOS, CREATE_TODOS_WITH_LEGACY_OWNER, DROP_LEGACY_TODOS, DROP_TODOS, DROP_USERS,
    MIGRATIONS, Migration, MigrationStep, RENAME_LEGACY_TODOS,
};
use crate::error::NexusError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

pub type SqlitePool = Pool<Sqlite>;

/// Owner of the single embedded database handle.
///
/// The handle is opened lazily on first use and memoized; concurrent first
/// callers all await the same open-and-migrate. A failed open leaves the cell
/// empty so the next caller tries again.
pub struct Store {
    options: SqliteConnectOptions,
    location: String,
    handle: OnceCell<SqlitePool>,
}

impl Store {
    /// Build a store for a `sqlite:` URL. Nothing is opened until first use.
    pub fn new(database_url: &str) -> Result<Self, NexusError> {
        let options = SqliteConnectOptions::from_str(database_url)?;
        Ok(Self::with_options(options, database_url))
    }

    pub fn with_options(options: SqliteConnectOptions, location: impl Into<String>) -> Self {
        // Referential integrity is the caller's job; the engine must not reject
        // orphaned todos or user wipes that leave todos behind.
        let options = options.create_if_missing(true).foreign_keys(false);
        Self {
            options,
            location: location.into(),
            handle: OnceCell::new(),
        }
    }

    /// The URL or path this store was configured with.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Open the handle, running pending migrations on first call.
    ///
    /// Returns `None` when the file cannot be opened or a migration fails; the
    /// fault is logged and the next call tries again.
    pub async fn open(&self) -> Option<SqlitePool> {
        match self.handle.get_or_try_init(|| self.connect_and_migrate()).await {
            Ok(pool) => Some(pool.clone()),
            Err(e) => {
                error!(location = %self.location, error = %e, "Error setting up database");
                None
            }
        }
    }

    /// Like [`Store::open`], but as a `Result` for repository code.
    pub async fn pool(&self) -> Result<SqlitePool, NexusError> {
        self.open().await.ok_or(NexusError::StoreUnavailable)
    }

    /// Drop both tables and rebuild an empty schema.
    ///
    /// The drop and every migration run in one transaction on the pool's only
    /// connection, so concurrent callers see either the old data or the fresh
    /// schema and never a missing table.
    pub async fn reset(&self) -> Result<(), NexusError> {
        let pool = self.pool().await?;

        let mut tx = pool.begin().await?;
        sqlx::query(DROP_TODOS).execute(&mut *tx).await?;
        sqlx::query(DROP_USERS).execute(&mut *tx).await?;
        for migration in MIGRATIONS {
            apply_step(&mut *tx, migration)
                .await
                .map_err(|source| NexusError::Migration {
                    version: migration.version,
                    name: migration.name,
                    source,
                })?;
        }
        tx.commit().await?;

        info!(location = %self.location, "Database reset successfully");
        Ok(())
    }

    /// Current value of the schema version marker.
    pub async fn schema_version(&self) -> Result<i64, NexusError> {
        let pool = self.pool().await?;
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        Ok(version)
    }

    async fn connect_and_migrate(&self) -> Result<SqlitePool, NexusError> {
        // One connection: statements against the handle are serialized, and an
        // in-memory database survives as long as the pool does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(self.options.clone())
            .await?;

        if let Err(e) = run_migrations(&pool).await {
            pool.close().await;
            return Err(e);
        }
        info!(location = %self.location, "Database and tables ready");
        Ok(pool)
    }
}

/// Bring the schema up to [`schema::latest_version`].
///
/// Each migration and its version bump commit together, so a failure leaves
/// the database at the last completed version.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), NexusError> {
    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        debug!(
            version = migration.version,
            name = migration.name,
            "applying migration"
        );
        apply(pool, migration)
            .await
            .map_err(|source| NexusError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
    }
    Ok(())
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    apply_step(&mut *tx, migration).await?;
    tx.commit().await
}

/// Run one migration and stamp its version, inside the caller's transaction.
async fn apply_step(conn: &mut SqliteConnection, migration: &Migration) -> Result<(), sqlx::Error> {
    match migration.step {
        MigrationStep::Statements(stmts) => {
            for stmt in stmts {
                sqlx::query(stmt).execute(&mut *conn).await?;
            }
        }
        MigrationStep::TodosOwner => migrate_todos_owner(&mut *conn).await?,
    }
    // PRAGMA arguments cannot be bound; the version is a compile-time integer.
    sqlx::query(&format!("PRAGMA user_version = {}", migration.version))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn migrate_todos_owner(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('todos')")
        .fetch_all(&mut *conn)
        .await?;

    if columns.is_empty() {
        sqlx::query(CREATE_TODOS).execute(&mut *conn).await?;
        return Ok(());
    }
    if columns.iter().any(|c| c == "userId") {
        return Ok(());
    }

    warn!(columns = ?columns, "Migrating existing todos table");
    let has = |name: &str| columns.iter().any(|c| c == name);
    let copy = schema::copy_legacy_todos(has("completed"), has("createdAt"));

    sqlx::query(RENAME_LEGACY_TODOS).execute(&mut *conn).await?;
    sqlx::query(CREATE_TODOS_WITH_LEGACY_OWNER)
        .execute(&mut *conn)
        .await?;
    let copied = sqlx::query(&copy).execute(&mut *conn).await?.rows_affected();
    sqlx::query(DROP_LEGACY_TODOS).execute(&mut *conn).await?;

    info!(rows = copied, "Database migration completed");
    Ok(())
}
