//! Wire models exchanged with the todo REST API.

pub mod errors;
pub mod timestamp;
pub mod todo;
pub mod user;

pub use errors::ErrorResponse;
pub use timestamp::Timestamp;
pub use todo::{Todo, TodoCreate, TodoUpdate};
pub use user::{LoginRequest, RegisterRequest, TokenResponse, User};
