use crate::db::Store;
use crate::db::models::{ClearReport, ClearScope, Todo};
use crate::error::NexusError;
use crate::service::validation::validate_title;
use std::sync::Arc;
use tracing::{error, warn};

const TODO_COLUMNS: &str = "id, userId, title, completed, createdAt";

/// CRUD over `todos`, scoped by the owning user where the caller supplies one.
///
/// `set_completed` and `delete_todo` match on `id` alone and do not check the
/// owner; `set_completed_owned` and `delete_todo_owned` add the `userId` filter.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<Store>,
}

impl TaskRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Insert a todo for `user_id`; returns the new row id. The title is trimmed.
    pub async fn add_todo(&self, user_id: i64, title: &str) -> Result<i64, NexusError> {
        let title = validate_title(title)?;
        let pool = self.store.pool().await?;

        let done = sqlx::query("INSERT INTO todos (userId, title, completed) VALUES (?, ?, 0)")
            .bind(user_id)
            .bind(title)
            .execute(&pool)
            .await
            .map_err(|e| failed("Failed to save todo", e))?;
        Ok(done.last_insert_rowid())
    }

    /// The user's todos, newest first.
    pub async fn list_todos(&self, user_id: i64) -> Result<Vec<Todo>, NexusError> {
        let pool = self.store.pool().await?;
        sqlx::query_as(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE userId = ? ORDER BY createdAt DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&pool)
        .await
        .map_err(|e| failed("Failed to load todos", e))
    }

    /// Every todo regardless of owner, highest id first.
    pub async fn list_all(&self) -> Result<Vec<Todo>, NexusError> {
        let pool = self.store.pool().await?;
        sqlx::query_as(&format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY id DESC"))
            .fetch_all(&pool)
            .await
            .map_err(|e| failed("Failed to load todos", e))
    }

    pub async fn set_completed(&self, id: i64, completed: bool) -> Result<(), NexusError> {
        let pool = self.store.pool().await?;
        sqlx::query("UPDATE todos SET completed = ? WHERE id = ?")
            .bind(completed)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(|e| failed("Failed to update todo", e))?;
        Ok(())
    }

    pub async fn delete_todo(&self, id: i64) -> Result<(), NexusError> {
        let pool = self.store.pool().await?;
        sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .map_err(|e| failed("Failed to delete todo", e))?;
        Ok(())
    }

    /// `NotFound` unless the todo exists and belongs to `user_id`.
    pub async fn set_completed_owned(
        &self,
        id: i64,
        user_id: i64,
        completed: bool,
    ) -> Result<(), NexusError> {
        let pool = self.store.pool().await?;
        let done = sqlx::query("UPDATE todos SET completed = ? WHERE id = ? AND userId = ?")
            .bind(completed)
            .bind(id)
            .bind(user_id)
            .execute(&pool)
            .await
            .map_err(|e| failed("Failed to update todo", e))?;
        if done.rows_affected() == 0 {
            return Err(NexusError::NotFound);
        }
        Ok(())
    }

    /// `NotFound` unless the todo exists and belongs to `user_id`.
    pub async fn delete_todo_owned(&self, id: i64, user_id: i64) -> Result<(), NexusError> {
        let pool = self.store.pool().await?;
        let done = sqlx::query("DELETE FROM todos WHERE id = ? AND userId = ?")
            .bind(id)
            .bind(user_id)
            .execute(&pool)
            .await
            .map_err(|e| failed("Failed to delete todo", e))?;
        if done.rows_affected() == 0 {
            return Err(NexusError::NotFound);
        }
        Ok(())
    }

    /// Administrative wipe. `Todos` empties `todos`; `All` empties `users` as well.
    pub async fn clear_all(&self, scope: ClearScope) -> Result<ClearReport, NexusError> {
        let pool = self.store.pool().await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| failed("Failed to clear data", e))?;

        let todos_deleted = sqlx::query("DELETE FROM todos")
            .execute(&mut *tx)
            .await
            .map_err(|e| failed("Failed to clear data", e))?
            .rows_affected();
        let users_deleted = match scope {
            ClearScope::Todos => 0,
            ClearScope::All => sqlx::query("DELETE FROM users")
                .execute(&mut *tx)
                .await
                .map_err(|e| failed("Failed to clear data", e))?
                .rows_affected(),
        };
        tx.commit()
            .await
            .map_err(|e| failed("Failed to clear data", e))?;

        warn!(?scope, todos_deleted, users_deleted, "all data cleared");
        Ok(ClearReport {
            todos_deleted,
            users_deleted,
        })
    }
}

fn failed(msg: &'static str, e: sqlx::Error) -> NexusError {
    error!(error = %e, "{msg}");
    NexusError::OperationFailed(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::identity::IdentityRepository;

    struct Fixture {
        tasks: TaskRepository,
        identity: IdentityRepository,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(Store::new("sqlite::memory:").unwrap());
        Fixture {
            tasks: TaskRepository::new(store.clone()),
            identity: IdentityRepository::new(store),
        }
    }

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let f = fixture();
        let alice = f.identity.register("alice", "alice@x.io", "secret1").await.unwrap();

        let id = f.tasks.add_todo(alice.id, "  buy milk\nand eggs ").await.unwrap();
        let todos = f.tasks.list_todos(alice.id).await.unwrap();

        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].id, id);
        assert_eq!(todos[0].user_id, alice.id);
        assert_eq!(todos[0].title, "buy milk\nand eggs");
        assert!(!todos[0].completed);
        assert!(todos[0].created_at.is_some());
    }

    #[tokio::test]
    async fn empty_title_never_reaches_storage() {
        let f = fixture();
        let err = f.tasks.add_todo(1, "   ").await.unwrap_err();
        assert!(matches!(err, NexusError::Validation(_)));
        assert!(f.tasks.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let f = fixture();
        let first = f.tasks.add_todo(1, "first").await.unwrap();
        let second = f.tasks.add_todo(1, "second").await.unwrap();

        let ids: Vec<i64> = f.tasks.list_todos(1).await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn todos_are_isolated_per_user() {
        let f = fixture();
        let alice = f.identity.register("alice", "alice@x.io", "secret1").await.unwrap();
        let bob = f.identity.register("bob", "bob@x.io", "secret1").await.unwrap();

        f.tasks.add_todo(alice.id, "alice's").await.unwrap();
        f.tasks.add_todo(bob.id, "bob's").await.unwrap();

        let bobs = f.tasks.list_todos(bob.id).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert!(bobs.iter().all(|t| t.user_id == bob.id));
    }

    #[tokio::test]
    async fn toggle_and_delete() {
        let f = fixture();
        let id = f.tasks.add_todo(1, "toggle me").await.unwrap();

        f.tasks.set_completed(id, true).await.unwrap();
        assert!(f.tasks.list_todos(1).await.unwrap()[0].completed);
        f.tasks.set_completed(id, false).await.unwrap();
        assert!(!f.tasks.list_todos(1).await.unwrap()[0].completed);

        f.tasks.delete_todo(id).await.unwrap();
        assert!(f.tasks.list_todos(1).await.unwrap().iter().all(|t| t.id != id));
    }

    #[tokio::test]
    async fn unscoped_mutations_ignore_owner() {
        let f = fixture();
        let id = f.tasks.add_todo(1, "owned by 1").await.unwrap();

        // Any caller holding the id can toggle it.
        f.tasks.set_completed(id, true).await.unwrap();
        assert!(f.tasks.list_todos(1).await.unwrap()[0].completed);
    }

    #[tokio::test]
    async fn owned_mutations_check_owner() {
        let f = fixture();
        let id = f.tasks.add_todo(1, "owned by 1").await.unwrap();

        assert!(matches!(
            f.tasks.set_completed_owned(id, 2, true).await,
            Err(NexusError::NotFound)
        ));
        assert!(matches!(
            f.tasks.delete_todo_owned(id, 2).await,
            Err(NexusError::NotFound)
        ));
        assert!(!f.tasks.list_todos(1).await.unwrap()[0].completed);

        f.tasks.set_completed_owned(id, 1, true).await.unwrap();
        f.tasks.delete_todo_owned(id, 1).await.unwrap();
        assert!(f.tasks.list_todos(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_scopes() {
        let f = fixture();
        let alice = f.identity.register("alice", "alice@x.io", "secret1").await.unwrap();
        f.tasks.add_todo(alice.id, "a").await.unwrap();
        f.tasks.add_todo(alice.id, "b").await.unwrap();

        let report = f.tasks.clear_all(ClearScope::Todos).await.unwrap();
        assert_eq!(report, ClearReport { todos_deleted: 2, users_deleted: 0 });
        assert_eq!(f.identity.user_count().await, 1);

        f.tasks.add_todo(alice.id, "c").await.unwrap();
        let report = f.tasks.clear_all(ClearScope::All).await.unwrap();
        assert_eq!(report, ClearReport { todos_deleted: 1, users_deleted: 1 });
        assert_eq!(f.identity.user_count().await, 0);
    }

    #[tokio::test]
    async fn owner_is_not_revalidated_on_insert() {
        let f = fixture();
        // No such user: the store does not re-validate the owner.
        let id = f.tasks.add_todo(42, "orphan").await.unwrap();
        assert_eq!(f.tasks.list_todos(42).await.unwrap()[0].id, id);
    }
}
