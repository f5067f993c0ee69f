pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;

pub use db::Store;
pub use error::NexusError;
pub use service::{Diagnostics, IdentityRepository, TaskRepository};
