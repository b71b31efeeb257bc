//! Navigation gate driven by session status.

use std::fmt;

use crate::session::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Settings,
}

impl Route {
    /// Resolve a path. Unknown paths land on the dashboard.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/login" => Self::Login,
            "/register" => Self::Register,
            "/settings" => Self::Settings,
            _ => Self::Dashboard,
        }
    }

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Dashboard => "/",
            Self::Settings => "/settings",
        }
    }

    #[must_use]
    pub const fn is_protected(self) -> bool {
        matches!(self, Self::Dashboard | Self::Settings)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// What the front end should do for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Show a neutral waiting view; do not navigate.
    Wait,
    Redirect(Route),
    Render(Route),
}

/// Gate `route` on `status`.
///
/// Protected content renders only once the session is authenticated; while
/// the status is still loading the answer is always [`Navigation::Wait`].
#[must_use]
pub const fn guard(route: Route, status: SessionStatus) -> Navigation {
    if route.is_protected() {
        match status {
            SessionStatus::Loading => Navigation::Wait,
            SessionStatus::Unauthenticated => Navigation::Redirect(Route::Login),
            SessionStatus::Authenticated => Navigation::Render(route),
        }
    } else {
        match status {
            SessionStatus::Authenticated => Navigation::Redirect(Route::Dashboard),
            SessionStatus::Loading | SessionStatus::Unauthenticated => Navigation::Render(route),
        }
    }
}

/// [`guard`] for a raw path.
#[must_use]
pub fn resolve(path: &str, status: SessionStatus) -> Navigation {
    guard(Route::from_path(path), status)
}
