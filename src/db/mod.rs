//! Database module: the schema store, its migrations and row models.
//!
//! Layout:
//! - `sqlite.rs`: `Store`, the lazily opened single handle, plus open/reset and migration runner
//! - `schema.rs`: SQL DDL and the ordered, versioned migration list
//! - `models.rs`: Rust structs mirroring DB rows and admin aggregates

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{ClearScope, DatabaseInfo, Todo, User, UserRecord, UserStats};
pub use schema::MIGRATIONS;
pub use sqlite::{SqlitePool, Store};
