use axum::{
    Router,
    extract::FromRef,
    routing::{get, patch, post},
};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::handlers::{admin, auth, todos};
use crate::middleware::auth::AdminKey;
use crate::middleware::session::SessionPolicy;
use crate::service::{Diagnostics, IdentityRepository, TaskRepository};

/// Process-wide context injected into every handler.
#[derive(Clone)]
pub struct NexusState {
    pub store: Arc<Store>,
    pub identity: IdentityRepository,
    pub tasks: TaskRepository,
    pub diagnostics: Diagnostics,
    pub cookie_key: Key,
    pub admin_key: AdminKey,
    pub session: SessionPolicy,
    pub strict_ownership: bool,
}

impl NexusState {
    pub fn new(store: Arc<Store>, cookie_key: Key, admin_key: AdminKey) -> Self {
        Self {
            identity: IdentityRepository::new(store.clone()),
            tasks: TaskRepository::new(store.clone()),
            diagnostics: Diagnostics::new(store.clone()),
            store,
            cookie_key,
            admin_key,
            session: SessionPolicy::default(),
            strict_ownership: false,
        }
    }

    /// Wire the state from configuration. A missing or short cookie secret
    /// falls back to a per-process random key.
    pub fn from_config(store: Arc<Store>, cfg: &Config) -> Self {
        let cookie_key = match cfg.basic.cookie_secret.as_deref() {
            Some(secret) => Key::try_from(secret.as_bytes()).unwrap_or_else(|_| {
                tracing::warn!("cookie_secret shorter than 64 bytes; using a random key");
                Key::generate()
            }),
            None => Key::generate(),
        };
        let mut state = Self::new(
            store,
            cookie_key,
            AdminKey::new(cfg.admin.password.as_str()),
        );
        state.session.secure = !cfg.basic.insecure_cookie;
        state.strict_ownership = cfg.basic.strict_ownership;
        state
    }
}

impl FromRef<NexusState> for Key {
    fn from_ref(state: &NexusState) -> Self {
        state.cookie_key.clone()
    }
}

impl FromRef<NexusState> for AdminKey {
    fn from_ref(state: &NexusState) -> Self {
        state.admin_key.clone()
    }
}

pub fn nexus_router(state: NexusState) -> Router {
    let api = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/todos", get(todos::list).post(todos::create))
        .route("/todos/{id}", patch(todos::set_completed).delete(todos::delete));

    let admin = Router::new()
        .route("/info", get(admin::info))
        .route("/export", get(admin::export))
        .route("/users", get(admin::users))
        .route("/users/count", get(admin::user_count))
        .route("/users/stats", get(admin::user_stats))
        .route("/users/todo-counts", get(admin::users_with_todo_counts))
        .route("/todos", get(admin::all_todos))
        .route("/schema/{table}", get(admin::table_schema))
        .route("/clear", post(admin::clear))
        .route("/reset", post(admin::reset));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .nest("/admin", admin)
        .with_state(state)
}
