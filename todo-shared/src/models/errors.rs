use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error envelope returned by the API.
///
/// `detail` is a plain message for most failures and a list of field errors
/// (`[{"loc": [...], "msg": "..."}]`) when a payload is rejected.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorResponse {
    /// Creates an error response carrying a plain message.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(Value::String(detail.into())),
        }
    }

    /// Checks if this error response has a detail.
    #[must_use]
    pub const fn has_detail(&self) -> bool {
        self.detail.is_some()
    }

    /// Readable message extracted from `detail`.
    ///
    /// Field error lists are flattened into `msg` entries joined with `"; "`.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            Value::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(text) => Some(text.clone()),
                        other => other
                            .get("msg")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message() {
            Some(message) => f.write_str(&message),
            None => f.write_str("unknown error"),
        }
    }
}

impl std::error::Error for ErrorResponse {}
