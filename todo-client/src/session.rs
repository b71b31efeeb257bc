//! Authentication state machine.
//!
//! A [`SessionManager`] holds the current [`Session`] in a watch channel and
//! is its only writer. Every change of the held token bumps a generation
//! counter; a profile fetch started under an older generation is discarded
//! when it completes. Transitions are applied inside the channel's update
//! closure, so the persisted token, the generation and the published session
//! always change together.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use shared::config::ClientConfig;
use shared::models::{LoginRequest, RegisterRequest, User};
use shared::validation::Validate;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, SessionError};
use crate::http::{ApiClient, TokenSource, UnauthorizedSignal};
use crate::notifications::{Notifier, SESSION_EXPIRED, SIGNED_OUT};
use crate::token_store::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        })
    }
}

/// Snapshot of the authentication state.
///
/// `Authenticated` always carries both token and user; `Unauthenticated`
/// carries neither.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    user: Option<User>,
    status: SessionStatus,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user.as_ref().map(|user| user.email.as_str()))
            .field("status", &self.status)
            .finish()
    }
}

impl Session {
    #[must_use]
    pub const fn unauthenticated() -> Self {
        Self {
            token: None,
            user: None,
            status: SessionStatus::Unauthenticated,
        }
    }

    /// State before the profile for `token` is known.
    #[must_use]
    pub fn initial(token: Option<String>) -> Self {
        match token {
            Some(token) => Self {
                token: Some(token),
                user: None,
                status: SessionStatus::Loading,
            },
            None => Self::unauthenticated(),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Status implied by the fields alone, used when an attempt ends without
    /// changing the token.
    fn settled_status(&self) -> SessionStatus {
        match (&self.token, &self.user) {
            (None, _) => SessionStatus::Unauthenticated,
            (Some(_), Some(_)) => SessionStatus::Authenticated,
            (Some(_), None) => SessionStatus::Loading,
        }
    }
}

/// Reads the bearer token out of the published session.
struct SessionTokens(watch::Receiver<Session>);

impl TokenSource for SessionTokens {
    fn bearer_token(&self) -> Option<String> {
        self.0.borrow().token.clone()
    }
}

struct Inner {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<Session>,
    generation: AtomicU64,
    resolving: Arc<AtomicUsize>,
    attempt_in_flight: AtomicBool,
    shutdown: CancellationToken,
    notifier: Notifier,
}

/// Cancels the session once the last [`SessionManager`] handle is dropped.
struct Teardown(CancellationToken);

impl Drop for Teardown {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Clears the in-flight flag when a login or registration attempt ends.
struct AttemptGuard<'a>(&'a AtomicBool);

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Counts a profile fetch from before it is started until it ends.
struct PendingResolve(Arc<AtomicUsize>);

impl PendingResolve {
    fn begin(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingResolve {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Owner of the session. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
    _teardown: Arc<Teardown>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &*self.inner.state.borrow())
            .field("generation", &self.inner.generation.load(Ordering::Acquire))
            .field("resolving", &self.inner.resolving.load(Ordering::Acquire))
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Build the session from the persisted token and start listening for
    /// unauthorized signals. Must be called inside a Tokio runtime.
    ///
    /// A persisted token is resolved in the background right away; use
    /// [`bootstrap`](Self::bootstrap) to wait for the outcome.
    pub fn start(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        notifier: Notifier,
    ) -> Result<Self, ClientError> {
        let persisted = store.get();
        let (state, reader) = watch::channel(Session::initial(persisted.clone()));
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let api = ApiClient::new(
            &config.api_base_url,
            config.request_timeout(),
            Arc::new(SessionTokens(reader)),
        )?
        .with_unauthorized_channel(signals_tx);

        let inner = Arc::new(Inner {
            api,
            store,
            state,
            generation: AtomicU64::new(0),
            resolving: Arc::new(AtomicUsize::new(0)),
            attempt_in_flight: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            notifier,
        });
        tokio::spawn(listen_unauthorized(
            Arc::downgrade(&inner),
            inner.shutdown.clone(),
            signals_rx,
        ));
        if persisted.is_some() {
            let pending = PendingResolve::begin(&inner.resolving);
            let task = Arc::clone(&inner);
            tokio::spawn(async move { task.resolve(0, persisted, pending).await });
        }

        debug!(status = %inner.state.borrow().status, "session started");
        let teardown = Arc::new(Teardown(inner.shutdown.clone()));
        Ok(Self {
            inner,
            _teardown: teardown,
        })
    }

    /// Client whose requests carry this session's token.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status
    }

    /// Observe every published session.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.inner.shutdown.is_cancelled()
    }

    /// Tear the session down. In-flight profile fetches are abandoned and no
    /// later result is applied.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Wait until the held token has resolved into a user or the session
    /// has settled as unauthenticated.
    ///
    /// Joins a profile fetch already in flight; one is started only when the
    /// session is loading and nothing is pending.
    pub async fn bootstrap(&self) -> Session {
        let mut updates = self.inner.state.subscribe();
        loop {
            if self.status() != SessionStatus::Loading || !self.is_live() {
                return self.snapshot();
            }
            if self.inner.resolving.load(Ordering::Acquire) == 0 {
                self.inner.resolve_current().await;
                return self.snapshot();
            }
            tokio::select! {
                () = self.inner.shutdown.cancelled() => return self.snapshot(),
                changed = updates.changed() => {
                    if changed.is_err() {
                        return self.snapshot();
                    }
                }
            }
        }
    }

    /// Replace the held token and bootstrap it. `None` signs out.
    pub async fn adopt_token(&self, token: Option<String>) -> Session {
        let pending = PendingResolve::begin(&self.inner.resolving);
        let generation = self.inner.replace_token(token.clone());
        self.inner.resolve(generation, token, pending).await;
        self.snapshot()
    }

    /// Sign in with email and password.
    ///
    /// On success the returned session is the outcome of the bootstrap that
    /// follows; it is not authenticated if the profile fetch failed.
    pub async fn login(&self, request: &LoginRequest) -> Result<Session, SessionError> {
        request.validate()?;
        let _attempt = self.begin_attempt()?;
        self.authenticate(request).await
    }

    /// Create an account, then sign in with the same credentials.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Session, SessionError> {
        request.validate()?;
        let _attempt = self.begin_attempt()?;

        self.inner.mark_loading();
        if let Err(err) = self.inner.api.register(request).await {
            self.inner.settle().await;
            return Err(err.into());
        }
        if !self.is_live() {
            return Err(SessionError::Closed);
        }
        info!(email = %request.email, "account registered");

        self.authenticate(&request.credentials()).await
    }

    /// Forget the token and user. Returns whether anything changed.
    pub fn logout(&self) -> bool {
        let inner = &self.inner;
        let changed = inner.state.send_if_modified(|session| {
            inner.generation.fetch_add(1, Ordering::AcqRel);
            inner.store.clear();
            if *session == Session::unauthenticated() {
                return false;
            }
            *session = Session::unauthenticated();
            true
        });
        if changed {
            info!("signed out");
            inner.notifier.info(SIGNED_OUT);
        }
        changed
    }

    /// Apply a 401 reported by the HTTP client.
    ///
    /// Only a rejection of the token currently held signs the user out;
    /// signals raised for an earlier token or for a tokenless request are
    /// ignored. Returns whether the session changed.
    pub fn handle_unauthorized(&self, signal: &UnauthorizedSignal) -> bool {
        self.inner.handle_unauthorized(signal)
    }

    fn begin_attempt(&self) -> Result<AttemptGuard<'_>, SessionError> {
        if !self.is_live() {
            return Err(SessionError::Closed);
        }
        self.inner
            .attempt_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::AttemptInProgress)?;
        Ok(AttemptGuard(&self.inner.attempt_in_flight))
    }

    async fn authenticate(&self, request: &LoginRequest) -> Result<Session, SessionError> {
        self.inner.mark_loading();
        let token = match self.inner.api.login(request).await {
            Ok(token) => token,
            Err(err) => {
                self.inner.settle().await;
                return Err(err.into());
            }
        };
        if !self.is_live() {
            return Err(SessionError::Closed);
        }
        info!(email = %request.email, "credentials accepted");
        Ok(self.adopt_token(Some(token.access_token)).await)
    }
}

impl Inner {
    fn handle_unauthorized(&self, signal: &UnauthorizedSignal) -> bool {
        let Some(rejected) = signal.token.as_deref() else {
            debug!(request_id = %signal.request_id, "ignoring 401 for anonymous request");
            return false;
        };

        let applied = self.state.send_if_modified(|session| {
            if session.token.as_deref() != Some(rejected) {
                return false;
            }
            self.generation.fetch_add(1, Ordering::AcqRel);
            self.store.clear();
            *session = Session::unauthenticated();
            true
        });

        if applied {
            warn!(request_id = %signal.request_id, "session token rejected, signing out");
            self.notifier.error(SESSION_EXPIRED);
        } else {
            debug!(request_id = %signal.request_id, "ignoring 401 for a superseded token");
        }
        applied
    }

    /// Bump the generation and publish `token` as the held token.
    fn replace_token(&self, token: Option<String>) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|session| {
            generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            match token.as_deref() {
                Some(token) => self.store.set(token),
                None => self.store.clear(),
            }
            *session = Session::initial(token);
        });
        generation
    }

    /// Apply `update` only if `generation` is still current and the session
    /// is live. Returns whether it was applied.
    fn commit(&self, generation: u64, update: impl FnOnce(&mut Session, &dyn TokenStore)) -> bool {
        self.state.send_if_modified(|session| {
            if self.shutdown.is_cancelled() || self.generation.load(Ordering::Acquire) != generation
            {
                return false;
            }
            update(session, self.store.as_ref());
            true
        })
    }

    async fn resolve_current(&self) {
        let pending = PendingResolve::begin(&self.resolving);
        let (generation, token) = {
            let session = self.state.borrow();
            (
                self.generation.load(Ordering::Acquire),
                session.token.clone(),
            )
        };
        self.resolve(generation, token, pending).await;
    }

    async fn resolve(&self, generation: u64, token: Option<String>, _pending: PendingResolve) {
        if token.is_none() {
            self.commit(generation, |session, _| *session = Session::unauthenticated());
            return;
        }

        let result = tokio::select! {
            () = self.shutdown.cancelled() => {
                debug!("bootstrap cancelled");
                return;
            }
            result = self.api.me() => result,
        };

        match result {
            Ok(user) => {
                let email = user.email.clone();
                if self.commit(generation, |session, _| {
                    session.user = Some(user);
                    session.status = SessionStatus::Authenticated;
                }) {
                    info!(%email, "session authenticated");
                } else {
                    debug!(generation, "discarding superseded profile");
                }
            }
            Err(err) => {
                // Dropping the token is a token change: later results for
                // this generation must not apply.
                if self.commit(generation, |session, store| {
                    self.generation.fetch_add(1, Ordering::AcqRel);
                    store.clear();
                    *session = Session::unauthenticated();
                }) {
                    warn!(error = %err, "session bootstrap failed");
                    self.notifier.error(SESSION_EXPIRED);
                } else {
                    debug!(generation, error = %err, "discarding superseded bootstrap failure");
                }
            }
        }
    }

    fn mark_loading(&self) {
        self.state.send_if_modified(|session| {
            if self.shutdown.is_cancelled() || session.status == SessionStatus::Loading {
                return false;
            }
            session.status = SessionStatus::Loading;
            true
        });
    }

    /// Restore the status the fields imply after a failed attempt. A held
    /// token with no profile and no fetch pending is resolved again.
    async fn settle(&self) {
        self.state.send_if_modified(|session| {
            let status = session.settled_status();
            if session.status == status {
                return false;
            }
            session.status = status;
            true
        });
        let unresolved = self.state.borrow().status == SessionStatus::Loading;
        if unresolved
            && self.resolving.load(Ordering::Acquire) == 0
            && !self.shutdown.is_cancelled()
        {
            self.resolve_current().await;
        }
    }
}

async fn listen_unauthorized(
    inner: Weak<Inner>,
    shutdown: CancellationToken,
    mut signals: mpsc::UnboundedReceiver<UnauthorizedSignal>,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            signal = signals.recv() => {
                let Some(signal) = signal else { break };
                let Some(inner) = inner.upgrade() else { break };
                inner.handle_unauthorized(&signal);
            }
        }
    }
    debug!("unauthorized listener stopped");
}
