use crate::db::Store;
use crate::db::models::{RecentUser, User, UserRecord, UserStats};
use crate::error::NexusError;
use crate::service::digest::{PasswordDigest, RollingDigest};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Registration, login and read-only aggregates over `users`.
#[derive(Clone)]
pub struct IdentityRepository {
    store: Arc<Store>,
    digest: Arc<dyn PasswordDigest>,
}

impl IdentityRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_digest(store, Arc::new(RollingDigest))
    }

    pub fn with_digest(store: Arc<Store>, digest: Arc<dyn PasswordDigest>) -> Self {
        Self { store, digest }
    }

    /// Create a user. Fails with `DuplicateIdentity` if the username or the email is taken.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, NexusError> {
        let pool = self.store.pool().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE username = ? OR email = ?")
                .bind(username)
                .bind(email)
                .fetch_optional(&pool)
                .await
                .map_err(|e| failed("Registration failed", e))?;
        if existing.is_some() {
            return Err(NexusError::DuplicateIdentity);
        }

        let digest = self.digest.digest(password);
        let result = sqlx::query("INSERT INTO users (username, email, password) VALUES (?, ?, ?)")
            .bind(username)
            .bind(email)
            .bind(digest)
            .execute(&pool)
            .await;

        match result {
            Ok(done) => {
                let user = User {
                    id: done.last_insert_rowid(),
                    username: username.to_string(),
                    email: email.to_string(),
                };
                info!(user_id = user.id, username = %user.username, "user registered");
                Ok(user)
            }
            // Lost a race with a concurrent registration of the same identity.
            Err(e) if NexusError::is_unique_violation(&e) => Err(NexusError::DuplicateIdentity),
            Err(e) => Err(failed("Registration failed", e)),
        }
    }

    /// Match on username and digest together; any miss is `InvalidCredentials`.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, NexusError> {
        let pool = self.store.pool().await?;
        let digest = self.digest.digest(password);

        let row: Option<User> = sqlx::query_as(
            "SELECT id, username, email FROM users WHERE username = ? AND password = ?",
        )
        .bind(username)
        .bind(digest)
        .fetch_optional(&pool)
        .await
        .map_err(|e| failed("Login failed", e))?;

        match row {
            Some(user) => {
                debug!(user_id = user.id, "login succeeded");
                Ok(user)
            }
            None => Err(NexusError::InvalidCredentials),
        }
    }

    /// Total registered users; 0 when the store cannot answer.
    pub async fn user_count(&self) -> i64 {
        let count = async {
            let pool = self.store.pool().await?;
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(&pool)
                .await?;
            Ok::<_, NexusError>(n)
        };
        count.await.unwrap_or_else(|e| {
            error!(error = %e, "Error getting user count");
            0
        })
    }

    /// Every user without the digest, newest registration first.
    pub async fn list_users(&self) -> Vec<UserRecord> {
        let users = async {
            let pool = self.store.pool().await?;
            let rows: Vec<UserRecord> = sqlx::query_as(
                "SELECT id, username, email, createdAt FROM users \
                 ORDER BY createdAt DESC, id DESC",
            )
            .fetch_all(&pool)
            .await?;
            Ok::<_, NexusError>(rows)
        };
        users.await.unwrap_or_else(|e| {
            error!(error = %e, "Error getting users");
            Vec::new()
        })
    }

    /// Registration counts for all time, today (UTC) and the last seven days.
    pub async fn user_stats(&self) -> UserStats {
        match self.try_user_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Error getting user stats");
                UserStats::empty()
            }
        }
    }

    async fn try_user_stats(&self) -> Result<UserStats, NexusError> {
        let pool = self.store.pool().await?;
        let now = Utc::now();
        let today = now.format("%Y-%m-%d").to_string();
        let week_ago = (now - Duration::days(7)).format(SQLITE_DATETIME).to_string();

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await?;
        let today_users: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE DATE(createdAt) = ?")
                .bind(today)
                .fetch_one(&pool)
                .await?;
        let week_users: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE datetime(createdAt) >= datetime(?)",
        )
        .bind(week_ago)
        .fetch_one(&pool)
        .await?;
        let recent_user: Option<RecentUser> = sqlx::query_as(
            "SELECT username, createdAt FROM users ORDER BY createdAt DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&pool)
        .await?;

        Ok(UserStats {
            total_users,
            today_users,
            week_users,
            recent_user,
            last_updated: now,
        })
    }
}

fn failed(msg: &'static str, e: sqlx::Error) -> NexusError {
    error!(error = %e, "{msg}");
    NexusError::OperationFailed(msg)
}
