//! Typed endpoints of the todo REST API.

use shared::models::{
    LoginRequest, RegisterRequest, Todo, TodoCreate, TodoUpdate, TokenResponse, User,
};

use crate::error::ClientError;
use crate::http::{ApiClient, ApiRequest};

impl ApiClient {
    /// Create an account. Does not sign in.
    pub async fn register(&self, payload: &RegisterRequest) -> Result<User, ClientError> {
        let request = ApiRequest::post(["auth", "register"])
            .anonymous()
            .json(payload)?;
        self.send_json(request).await
    }

    /// Exchange credentials for an access token.
    pub async fn login(&self, payload: &LoginRequest) -> Result<TokenResponse, ClientError> {
        let request = ApiRequest::post(["auth", "token"])
            .anonymous()
            .form(payload.form_fields());
        self.send_json(request).await
    }

    /// Profile of the token holder.
    pub async fn me(&self) -> Result<User, ClientError> {
        self.send_json(ApiRequest::get(["auth", "me"])).await
    }

    pub async fn list_todos(&self) -> Result<Vec<Todo>, ClientError> {
        self.send_json(ApiRequest::get(["todos"])).await
    }

    pub async fn create_todo(&self, payload: &TodoCreate) -> Result<Todo, ClientError> {
        self.send_json(ApiRequest::post(["todos"]).json(payload)?)
            .await
    }

    pub async fn update_todo(&self, id: &str, payload: &TodoUpdate) -> Result<Todo, ClientError> {
        self.send_json(ApiRequest::patch(["todos", id]).json(payload)?)
            .await
    }

    pub async fn delete_todo(&self, id: &str) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(["todos", id])).await
    }
}
