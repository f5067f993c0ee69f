use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum NexusError {
    #[error("Username or email already exists")]
    DuplicateIdentity,

    /// Login miss. Never says whether the username or the password was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Database is unavailable")]
    StoreUnavailable,

    #[error("{0}")]
    Validation(String),

    #[error("User not logged in")]
    NotLoggedIn,

    #[error("Todo not found")]
    NotFound,

    #[error("Invalid or missing admin key")]
    Unauthorized,

    /// Generic repository failure; the underlying fault is logged, not exposed.
    #[error("{0}")]
    OperationFailed(&'static str),

    #[error("Migration {version} ({name}) failed: {source}")]
    Migration {
        version: i64,
        name: &'static str,
        #[source]
        source: SqlxError,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Config error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NexusError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for a UNIQUE constraint hit, which registration maps to `DuplicateIdentity`.
    pub fn is_unique_violation(err: &SqlxError) -> bool {
        err.as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation())
    }

    fn status(&self) -> StatusCode {
        match self {
            NexusError::DuplicateIdentity => StatusCode::CONFLICT,
            NexusError::InvalidCredentials | NexusError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            NexusError::Unauthorized => StatusCode::FORBIDDEN,
            NexusError::Validation(_) => StatusCode::BAD_REQUEST,
            NexusError::NotFound => StatusCode::NOT_FOUND,
            NexusError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            NexusError::OperationFailed(_)
            | NexusError::Migration { .. }
            | NexusError::DatabaseError(_)
            | NexusError::Config(_)
            | NexusError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<figment::Error> for NexusError {
    fn from(e: figment::Error) -> Self {
        NexusError::Config(Box::new(e))
    }
}

impl IntoResponse for NexusError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error = match self {
            // Infrastructure faults never reach the caller verbatim.
            NexusError::Migration { .. }
            | NexusError::DatabaseError(_)
            | NexusError::Config(_)
            | NexusError::Io(_) => "An internal error occurred.".to_string(),
            other => other.to_string(),
        };
        (
            status,
            Json(ApiErrorBody {
                success: false,
                error,
            }),
        )
            .into_response()
    }
}

/// Failure half of the `{success, ...}` result shape every caller-facing route returns.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_share_one_message() {
        assert_eq!(
            NexusError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
        assert_eq!(
            NexusError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn internal_faults_are_masked() {
        let resp = NexusError::DatabaseError(SqlxError::PoolClosed).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
