//! The todo list feature.
//!
//! The board only ever holds todos the server has confirmed. A failed call
//! raises an error notice and leaves the list exactly as it was.

use shared::models::{Todo, TodoCreate, TodoUpdate};
use shared::validation::Validate;
use tracing::{debug, warn};

use crate::error::{ClientError, TodoError};
use crate::http::ApiClient;
use crate::notifications::{
    Notifier, TODO_CREATE_FAILED, TODO_CREATED, TODO_DELETE_FAILED, TODO_REMOVED,
    TODO_UPDATE_FAILED, TODO_UPDATED, TODOS_LOAD_FAILED,
};
use crate::session::SessionManager;

#[derive(Debug, Clone)]
pub struct TodoBoard {
    api: ApiClient,
    notifier: Notifier,
    todos: Vec<Todo>,
    loaded: bool,
}

impl TodoBoard {
    pub fn new(api: ApiClient, notifier: Notifier) -> Self {
        Self {
            api,
            notifier,
            todos: Vec::new(),
            loaded: false,
        }
    }

    /// Board whose requests carry `session`'s token and whose 401s sign
    /// that session out.
    #[must_use]
    pub fn for_session(session: &SessionManager) -> Self {
        Self::new(session.api().clone(), session.notifier().clone())
    }

    #[must_use]
    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|todo| todo.id == id)
    }

    /// Replace the list with the server's.
    pub async fn refresh(&mut self) -> Result<&[Todo], TodoError> {
        let todos = self
            .api
            .list_todos()
            .await
            .map_err(|err| self.failed(TODOS_LOAD_FAILED, err))?;
        debug!(count = todos.len(), "todos loaded");
        self.todos = todos;
        self.loaded = true;
        Ok(&self.todos)
    }

    pub async fn create(&mut self, draft: TodoCreate) -> Result<&Todo, TodoError> {
        let draft = TodoCreate {
            title: draft.title.trim().to_string(),
            ..draft
        }
        .normalized();
        draft.validate()?;

        let todo = self
            .api
            .create_todo(&draft)
            .await
            .map_err(|err| self.failed(TODO_CREATE_FAILED, err))?;
        self.notifier.success(TODO_CREATED);
        self.todos.insert(0, todo);
        Ok(&self.todos[0])
    }

    pub async fn update(&mut self, id: &str, patch: TodoUpdate) -> Result<&Todo, TodoError> {
        let patch = TodoUpdate {
            title: patch.title.map(|title| title.trim().to_string()),
            ..patch
        }
        .normalized();
        patch.validate()?;

        let todo = self
            .api
            .update_todo(id, &patch)
            .await
            .map_err(|err| self.failed(TODO_UPDATE_FAILED, err))?;
        self.notifier.success(TODO_UPDATED);
        Ok(self.apply(todo))
    }

    /// Flip completion of a todo already on the board.
    pub async fn toggle(&mut self, id: &str) -> Result<&Todo, TodoError> {
        let patch = self
            .get(id)
            .map(TodoUpdate::toggle)
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;
        self.update(id, patch).await
    }

    /// Mark a todo completed.
    pub async fn complete(&mut self, id: &str) -> Result<&Todo, TodoError> {
        let patch = TodoUpdate {
            is_completed: Some(true),
            ..TodoUpdate::default()
        };
        self.update(id, patch).await
    }

    pub async fn remove(&mut self, id: &str) -> Result<(), TodoError> {
        self.api
            .delete_todo(id)
            .await
            .map_err(|err| self.failed(TODO_DELETE_FAILED, err))?;
        self.notifier.success(TODO_REMOVED);
        self.todos.retain(|todo| todo.id != id);
        Ok(())
    }

    fn apply(&mut self, todo: Todo) -> &Todo {
        match self.todos.iter().position(|existing| existing.id == todo.id) {
            Some(index) => {
                self.todos[index] = todo;
                &self.todos[index]
            }
            None => {
                self.todos.insert(0, todo);
                &self.todos[0]
            }
        }
    }

    fn failed(&self, message: &'static str, err: ClientError) -> TodoError {
        warn!(error = %err, "{message}");
        self.notifier.error(message);
        TodoError::Api(err)
    }
}
