//! In-memory `SessionApi` with scripted replies per endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Map;

use super::{Credentials, Registration, SessionApi, SessionError, SessionReply, User};
use crate::remote::TransportError;

pub enum Outcome {
    User(&'static str),
    Anonymous,
    Message(&'static str),
    Status(u16, &'static str),
    Offline,
    Hang,
}

type Script = Mutex<VecDeque<(Duration, Outcome)>>;

/// Unscripted calls: checks answer anonymous, login/register answer 401,
/// logout succeeds.
#[derive(Default)]
pub struct FakeSessionApi {
    checks: Script,
    logins: Script,
    registers: Script,
    logouts: Script,
}

impl FakeSessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check(self, outcome: Outcome) -> Self {
        self.with_check_after(Duration::ZERO, outcome)
    }

    pub fn with_check_after(self, delay: Duration, outcome: Outcome) -> Self {
        self.checks.lock().unwrap().push_back((delay, outcome));
        self
    }

    pub fn with_login(self, outcome: Outcome) -> Self {
        self.with_login_after(Duration::ZERO, outcome)
    }

    pub fn with_login_after(self, delay: Duration, outcome: Outcome) -> Self {
        self.logins.lock().unwrap().push_back((delay, outcome));
        self
    }

    pub fn with_register(self, outcome: Outcome) -> Self {
        self.with_register_after(Duration::ZERO, outcome)
    }

    pub fn with_register_after(self, delay: Duration, outcome: Outcome) -> Self {
        self.registers.lock().unwrap().push_back((delay, outcome));
        self
    }

    pub fn with_logout(self, outcome: Outcome) -> Self {
        self.logouts.lock().unwrap().push_back((Duration::ZERO, outcome));
        self
    }
}

fn next(script: &Script, fallback: Outcome) -> (Duration, Outcome) {
    script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((Duration::ZERO, fallback))
}

async fn play((delay, outcome): (Duration, Outcome)) -> Result<SessionReply, SessionError> {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    match outcome {
        Outcome::User(email) => Ok(SessionReply {
            user: Some(User {
                email: email.to_string(),
                name: None,
                profile: Map::new(),
            }),
            authenticated: Some(true),
            message: None,
        }),
        Outcome::Anonymous => Ok(SessionReply {
            authenticated: Some(false),
            ..SessionReply::default()
        }),
        Outcome::Message(message) => Ok(SessionReply {
            message: Some(message.to_string()),
            ..SessionReply::default()
        }),
        Outcome::Status(status, message) => Err(SessionError::Rejected {
            status,
            message: message.to_string(),
        }),
        Outcome::Offline => Err(SessionError::Transport(TransportError::ContentType(
            "text/html".to_string(),
        ))),
        Outcome::Hang => std::future::pending().await,
    }
}

#[async_trait]
impl SessionApi for FakeSessionApi {
    async fn fetch_session(&self) -> Result<SessionReply, SessionError> {
        play(next(&self.checks, Outcome::Anonymous)).await
    }

    async fn login(&self, _credentials: &Credentials) -> Result<SessionReply, SessionError> {
        play(next(&self.logins, Outcome::Status(401, "Invalid credentials"))).await
    }

    async fn register(&self, _registration: &Registration) -> Result<SessionReply, SessionError> {
        play(next(&self.registers, Outcome::Status(401, "Registration closed"))).await
    }

    async fn logout(&self) -> Result<(), SessionError> {
        play(next(&self.logouts, Outcome::Anonymous)).await.map(|_| ())
    }
}
