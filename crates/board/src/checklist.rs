use domain::{DomainError, NewTodo, Scope, Todo, TodoId, TodoPatch, UserId};
use infrastructure::BoardStore;
use shared::AppError;
use std::sync::Arc;
use tracing::debug;

/// フラットなチェックリスト表示
///
/// 変更のたびに一覧を読み直す。
pub struct Checklist<S: BoardStore> {
    store: Arc<S>,
    scope: Scope,
    actor: UserId,
    todos: Vec<Todo>,
}

impl<S: BoardStore> Checklist<S> {
    pub async fn load(store: Arc<S>, scope: Scope, actor: UserId) -> Result<Self, AppError> {
        let todos = store.list_todos(&scope).await?;
        Ok(Self {
            store,
            scope,
            actor,
            todos,
        })
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub async fn reload(&mut self) -> Result<(), AppError> {
        self.todos = self.store.list_todos(&self.scope).await?;
        debug!("チェックリストを再読み込み: {} 件", self.todos.len());
        Ok(())
    }

    /// 列なしでカードを追加
    pub async fn add(&mut self, title: &str) -> Result<TodoId, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::Validation("Todo title cannot be empty".to_string()).into());
        }
        let id = self
            .store
            .create_todo(&self.scope, &self.actor, NewTodo::new(title))
            .await?;
        self.reload().await?;
        Ok(id)
    }

    pub async fn toggle(&mut self, id: &TodoId) -> Result<(), AppError> {
        let completed = self
            .todos
            .iter()
            .find(|t| &t.id == id)
            .map(|t| t.completed)
            .ok_or_else(|| DomainError::TodoNotFound(id.to_string()))?;
        self.store
            .update_todo(id, TodoPatch::completed(!completed))
            .await?;
        self.reload().await
    }

    pub async fn delete(&mut self, id: &TodoId) -> Result<(), AppError> {
        self.store.delete_todo(id).await?;
        self.reload().await
    }
}
