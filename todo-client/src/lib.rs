//! Client-side core of the todo application.
//!
//! The [`session::SessionManager`] owns authentication state and is the only
//! writer of the persisted token. The [`http::ApiClient`] reads that token
//! through an injected [`http::TokenSource`] and reports 401 responses back
//! over a channel, so neither side holds the other. Front ends observe the
//! session through a watch channel and gate their views with [`guard::guard`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth_form;
pub mod error;
pub mod guard;
pub mod http;
pub mod notifications;
pub mod session;
pub mod todos;
pub mod token_store;

pub use error::{ClientError, SessionError, TodoError};
pub use guard::{Navigation, Route, guard};
pub use http::{ApiClient, ApiRequest, TokenSource, UnauthorizedSignal};
pub use notifications::{Notice, NoticeLevel, Notifier};
pub use session::{Session, SessionManager, SessionStatus};
pub use todos::TodoBoard;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
