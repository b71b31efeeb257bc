//! Login and registration flow on top of the session.

use std::fmt;

use shared::models::{LoginRequest, RegisterRequest};
use shared::validation::{Validate, ValidationErrors};

use crate::error::SessionError;
use crate::notifications::{AUTHENTICATED, AUTHENTICATION_FAILED};
use crate::session::{Session, SessionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

/// Values entered in the sign-in or sign-up form.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl fmt::Debug for AuthForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthForm")
            .field("mode", &self.mode)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .finish()
    }
}

impl AuthForm {
    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::Login,
            email: email.into(),
            password: password.into(),
            full_name: String::new(),
        }
    }

    pub fn register(
        email: impl Into<String>,
        full_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            mode: AuthMode::Register,
            email: email.into(),
            password: password.into(),
            full_name: full_name.into(),
        }
    }

    fn login_request(&self) -> LoginRequest {
        LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        }
    }

    fn register_request(&self) -> RegisterRequest {
        RegisterRequest {
            email: self.email.trim().to_string(),
            full_name: self.full_name.trim().to_string(),
            password: self.password.clone(),
        }
    }

    /// Field errors to show inline. Nothing is sent while any remain.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self.mode {
            AuthMode::Login => self.login_request().validate(),
            AuthMode::Register => self.register_request().validate(),
        }
    }

    /// Validate, then sign in or sign up through `session`.
    ///
    /// Rejected credentials and failed requests raise a notice on the
    /// session's notifier. Field errors, a second concurrent attempt and a
    /// torn-down session come back without one.
    pub async fn submit(&self, session: &SessionManager) -> Result<Session, SessionError> {
        self.validate()?;
        let result = match self.mode {
            AuthMode::Login => session.login(&self.login_request()).await,
            AuthMode::Register => session.register(&self.register_request()).await,
        };

        let notifier = session.notifier();
        match &result {
            Ok(outcome) if outcome.is_authenticated() => notifier.success(AUTHENTICATED),
            // a failed bootstrap has already raised its own notice
            Ok(_) => {}
            Err(
                SessionError::Validation(_)
                | SessionError::AttemptInProgress
                | SessionError::Closed,
            ) => {}
            Err(err) => {
                tracing::debug!(error = %err, mode = ?self.mode, "authentication attempt failed");
                notifier.error(AUTHENTICATION_FAILED);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::notifications::Notifier;
    use crate::token_store::MemoryTokenStore;
    use shared::config::ClientConfig;
    use shared::validation::{FULL_NAME_REQUIRED, INVALID_EMAIL, PASSWORD_TOO_SHORT};

    #[test]
    fn login_form_checks_email_and_password() {
        let errors = AuthForm::login("not-an-email", "short").validate().unwrap_err();
        assert_eq!(errors.get("email"), Some(INVALID_EMAIL));
        assert_eq!(errors.get("password"), Some(PASSWORD_TOO_SHORT));
        assert!(errors.get("full_name").is_none());
    }

    #[test]
    fn register_form_requires_name() {
        let errors = AuthForm::register("a@b.com", " ", "longenoughpassword")
            .validate()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("full_name"), Some(FULL_NAME_REQUIRED));
    }

    #[test]
    fn email_is_trimmed_before_validation() {
        assert!(AuthForm::login("  a@b.com ", "longenoughpassword").validate().is_ok());
    }

    #[tokio::test]
    async fn closed_session_raises_no_failure_notice() {
        let mut config = ClientConfig::with_defaults();
        config.api_base_url = "http://127.0.0.1:9".parse().unwrap();
        let notifier = Notifier::new();
        let mut notices = notifier.subscribe();
        let session =
            SessionManager::start(&config, Arc::new(MemoryTokenStore::new()), notifier).unwrap();
        session.shutdown();

        let result = AuthForm::login("a@b.com", "longenoughpassword")
            .submit(&session)
            .await;
        assert!(matches!(result, Err(SessionError::Closed)));
        assert!(notices.try_recv().is_err());
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", AuthForm::login("a@b.com", "hunter22hunter"));
        assert!(!rendered.contains("hunter22hunter"));
    }
}
