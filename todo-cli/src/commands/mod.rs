pub mod auth;
pub mod completion;
pub mod config;
pub mod context;
pub mod todos;
