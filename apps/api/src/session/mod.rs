//! Session State Machine — the single process-wide authentication record,
//! driven by the remote cookie-session API.
//!
//! `unchecked --check--> authenticated | anonymous`,
//! `anonymous --login/register--> authenticated`,
//! `authenticated --logout--> anonymous` (always, even when the remote call fails).
//! `error` is an overlay on top of either state, not a state of its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::notifications::{Level, NotificationCenter};
use crate::remote::TransportError;

pub mod guard;
pub mod handlers;
#[cfg(test)]
pub mod testing;

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whatever else the session API reports about the user.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body returned by every session endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SessionReply {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub authenticated: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SessionReply {
    /// An explicit `authenticated: false` wins over a stray `user` object.
    pub fn into_user(self) -> Option<User> {
        match self.authenticated {
            Some(false) => None,
            _ => self.user,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    NoUser(String),

    #[error("Session service unreachable: {0}")]
    Transport(#[from] TransportError),

    #[error("Session service did not respond within {}s", .0.as_secs())]
    TimedOut(Duration),

    /// A newer session operation (typically a logout) landed first.
    #[error("{0} was superseded by a newer session change")]
    Superseded(String),
}

#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn fetch_session(&self) -> Result<SessionReply, SessionError>;
    async fn login(&self, credentials: &Credentials) -> Result<SessionReply, SessionError>;
    async fn register(&self, registration: &Registration) -> Result<SessionReply, SessionError>;
    async fn logout(&self) -> Result<(), SessionError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Session record
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub session_checked: bool,
    in_flight: u32,
    /// Bumped by every operation; a check only commits its user if still current.
    generation: u64,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.in_flight += 1;
        self.is_loading = true;
        self.generation
    }

    fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.is_loading = self.in_flight > 0;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Service
// ────────────────────────────────────────────────────────────────────────────

/// Owns the Session record. The only way to change it is through these methods.
pub struct SessionService {
    api: Arc<dyn SessionApi>,
    state: watch::Sender<Session>,
    call_timeout: Duration,
    notifications: NotificationCenter,
}

impl SessionService {
    pub fn new(
        api: Arc<dyn SessionApi>,
        call_timeout: Duration,
        notifications: NotificationCenter,
    ) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            api,
            state,
            call_timeout,
            notifications,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Probes the remote session. Failures are never errors to the caller:
    /// they settle the record as anonymous.
    pub async fn check_session(&self) {
        let generation = self.begin();
        let user = match self.call(self.api.fetch_session()).await {
            Ok(reply) => reply.into_user(),
            Err(err) => {
                debug!("Session check failed, treating as anonymous: {err}");
                None
            }
        };

        let mut stale = false;
        self.state.send_modify(|session| {
            session.finish();
            session.session_checked = true;
            if session.generation != generation {
                stale = true;
                return;
            }
            if user.is_some() {
                session.error = None;
            }
            session.user = user;
        });

        if stale {
            debug!("Ignoring stale session check result");
        } else {
            let session = self.state.borrow();
            match &session.user {
                Some(user) => info!("Session check: authenticated as {}", user.email),
                None => info!("Session check: anonymous"),
            }
        }
    }

    pub async fn refresh_session(&self) {
        self.check_session().await;
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<User, SessionError> {
        let generation = self.begin();
        let outcome = self.call(self.api.login(credentials)).await;
        self.authenticate(generation, outcome, "Login")
    }

    pub async fn register(&self, registration: &Registration) -> Result<User, SessionError> {
        let generation = self.begin();
        let outcome = self.call(self.api.register(registration)).await;
        self.authenticate(generation, outcome, "Registration")
    }

    /// Best-effort remote, always-effective local: the user is cleared before
    /// the remote call and stays cleared whatever it returns.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let mut generation = 0;
        self.state.send_modify(|session| {
            generation = session.begin();
            session.user = None;
        });

        let outcome = self.call(self.api.logout()).await;

        self.state.send_modify(|session| {
            session.finish();
            if session.generation == generation {
                session.user = None;
            }
        });

        match &outcome {
            Ok(()) => info!("Logged out"),
            Err(err) => warn!("Remote logout failed, local session cleared anyway: {err}"),
        }
        outcome
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|session| session.error.take().is_some());
    }

    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|session| generation = session.begin());
        generation
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        tokio::time::timeout(self.call_timeout, request)
            .await
            .unwrap_or(Err(SessionError::TimedOut(self.call_timeout)))
    }

    /// Commits a login/register outcome. A failure sets `error` and leaves `user` untouched.
    /// A success only commits while `generation` is still the latest operation.
    fn authenticate(
        &self,
        generation: u64,
        outcome: Result<SessionReply, SessionError>,
        action: &str,
    ) -> Result<User, SessionError> {
        let outcome = outcome.and_then(|reply| {
            let message = reply.message.clone();
            reply.into_user().ok_or_else(|| {
                SessionError::NoUser(message.unwrap_or_else(|| format!("{action} failed")))
            })
        });

        match outcome {
            Ok(user) => {
                let mut current = false;
                self.state.send_modify(|session| {
                    session.finish();
                    if session.generation != generation {
                        return;
                    }
                    current = true;
                    session.user = Some(user.clone());
                    session.error = None;
                    session.session_checked = true;
                });
                if !current {
                    debug!("Ignoring stale {action} result for {}", user.email);
                    return Err(SessionError::Superseded(action.to_string()));
                }
                info!("{action} succeeded for {}", user.email);
                self.notifications
                    .push(Level::Success, format!("Welcome, {}", user.email));
                Ok(user)
            }
            Err(err) => {
                let message = err.to_string();
                self.state.send_modify(|session| {
                    session.finish();
                    session.error = Some(message.clone());
                });
                warn!("{action} failed: {message}");
                self.notifications.push(Level::Error, message);
                Err(err)
            }
        }
    }
}
