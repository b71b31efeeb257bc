//! User-facing notices raised by the session and the todo board.

use std::fmt;

use tokio::sync::broadcast;

pub const SESSION_EXPIRED: &str = "Session expired, please sign in again";
pub const AUTHENTICATED: &str = "Authenticated successfully";
pub const AUTHENTICATION_FAILED: &str = "Authentication failed, please try again";
pub const SIGNED_OUT: &str = "Signed out";
pub const TODO_CREATED: &str = "Todo created";
pub const TODO_CREATE_FAILED: &str = "Unable to create todo";
pub const TODO_UPDATED: &str = "Todo updated";
pub const TODO_UPDATE_FAILED: &str = "Unable to update todo";
pub const TODO_REMOVED: &str = "Todo removed";
pub const TODO_DELETE_FAILED: &str = "Unable to delete todo";
pub const TODOS_LOAD_FAILED: &str = "Unable to load todos";

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Fan-out of notices to whoever renders them. Sending with no subscriber
/// is not an error; the notice is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            level,
            message: message.into(),
        };
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice");
        let _ = self.sender.send(notice);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Error, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, message);
    }
}
