//! Input checks run before anything is submitted to the API.
//!
//! Failures are reported per field so a front end can render them next to
//! the offending input. Nothing that fails validation is ever sent.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::models::{LoginRequest, RegisterRequest, TodoCreate, TodoUpdate};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_FULL_NAME_LEN: usize = 2;
pub const MIN_TITLE_LEN: usize = 2;
pub const MAX_DESCRIPTION_LEN: usize = 280;

pub const INVALID_EMAIL: &str = "Enter a valid email";
pub const PASSWORD_TOO_SHORT: &str = "Minimum 8 characters";
pub const FULL_NAME_REQUIRED: &str = "Your name is required";
pub const TITLE_REQUIRED: &str = "Title is required";
pub const DESCRIPTION_TOO_LONG: &str = "Keep it under 280 characters";
pub const NOTHING_TO_UPDATE: &str = "Change at least one field";

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern compiles")
});

/// A single rejected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every field error found in one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// First message recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message)
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "invalid input ({joined})")
    }
}

impl std::error::Error for ValidationErrors {}

/// Payloads that can be checked locally before submission.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value.trim())
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn check_credentials(errors: &mut ValidationErrors, email: &str, password: &str) {
    if !is_valid_email(email) {
        errors.push("email", INVALID_EMAIL);
    }
    if char_len(password) < MIN_PASSWORD_LEN {
        errors.push("password", PASSWORD_TOO_SHORT);
    }
}

fn check_description(errors: &mut ValidationErrors, description: Option<&str>) {
    if description.is_some_and(|text| char_len(text) > MAX_DESCRIPTION_LEN) {
        errors.push("description", DESCRIPTION_TOO_LONG);
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_credentials(&mut errors, &self.email, &self.password);
        errors.into_result()
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if char_len(&self.full_name) < MIN_FULL_NAME_LEN {
            errors.push("full_name", FULL_NAME_REQUIRED);
        }
        check_credentials(&mut errors, &self.email, &self.password);
        errors.into_result()
    }
}

impl Validate for TodoCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if char_len(&self.title) < MIN_TITLE_LEN {
            errors.push("title", TITLE_REQUIRED);
        }
        check_description(&mut errors, self.description.as_deref());
        errors.into_result()
    }
}

impl Validate for TodoUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self
            .title
            .as_deref()
            .is_some_and(|title| char_len(title) < MIN_TITLE_LEN)
        {
            errors.push("title", TITLE_REQUIRED);
        }
        check_description(&mut errors, self.description.as_ref().and_then(Option::as_deref));
        if self.is_empty() {
            errors.push("patch", NOTHING_TO_UPDATE);
        }
        errors.into_result()
    }
}
