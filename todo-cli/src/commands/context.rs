use std::sync::Arc;

use anyhow::{Context, Result, bail};
use client::{
    FileTokenStore, Navigation, Notice, NoticeLevel, Notifier, Route, Session, SessionManager,
    guard,
};
use shared::config::ClientConfig;
use shared::validation::ValidationErrors;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

/// Session plus the notices it raises, for the lifetime of one command.
#[derive(Debug)]
pub struct AppContext {
    pub session: SessionManager,
    notices: broadcast::Receiver<Notice>,
}

impl AppContext {
    pub fn open(config: &ClientConfig) -> Result<Self> {
        let token_dir = config.resolved_token_dir();
        debug!(dir = %token_dir.display(), "using token directory");
        let notifier = Notifier::new();
        let notices = notifier.subscribe();
        let session = SessionManager::start(config, Arc::new(FileTokenStore::new(token_dir)), notifier)
            .context("failed to set up the API client")?;
        Ok(Self { session, notices })
    }

    /// Bootstrap the stored token and gate on the dashboard route.
    pub async fn require_session(&mut self) -> Result<Session> {
        let session = self.session.bootstrap().await;
        self.flush_notices();
        match guard(Route::Dashboard, session.status()) {
            Navigation::Render(_) => Ok(session),
            Navigation::Redirect(_) => bail!("not signed in; run `todo login` first"),
            Navigation::Wait => bail!("the session could not be resolved"),
        }
    }

    /// Let pending session work (a 401 sign-out) run, then print notices.
    pub async fn settle(&mut self) {
        tokio::task::yield_now().await;
        self.flush_notices();
    }

    pub fn flush_notices(&mut self) {
        loop {
            match self.notices.try_recv() {
                Ok(notice) => print_notice(&notice),
                Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "notices dropped"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    pub fn close(mut self) {
        self.flush_notices();
        self.session.shutdown();
    }
}

fn print_notice(notice: &Notice) {
    let label = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Error => "error",
        NoticeLevel::Info => "info",
    };
    eprintln!("[{label}] {}", notice.message);
}

/// Print field errors the way a form would show them inline.
pub fn report_invalid(errors: &ValidationErrors) -> anyhow::Error {
    for error in errors.iter() {
        eprintln!("  {}: {}", error.field, error.message);
    }
    anyhow::anyhow!("invalid input")
}
