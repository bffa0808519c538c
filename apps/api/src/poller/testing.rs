//! Scripted in-memory `JobTransport` for poller and route tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::JobTransport;
use crate::remote::TransportError;

/// What the next GET against the result endpoint returns.
pub enum Reply {
    NotReady,
    Ready(Value),
    Status(u16),
    Html,
    Hang,
}

#[derive(Default)]
pub struct ScriptedTransport {
    reject_with: Option<u16>,
    post_delays: Mutex<VecDeque<Duration>>,
    replies: Mutex<VecDeque<Reply>>,
    posts: Mutex<Vec<(String, Value)>>,
    polls: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    /// Accepts submissions; every poll answers "not ready".
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Every submission is answered with `status`.
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Self::default()
        }
    }

    /// The n-th submission takes `delays[n]` before the webhook answers.
    pub fn with_post_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.post_delays.lock().unwrap().extend(delays);
        self
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.polls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<(), TransportError> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));

        let delay = self.post_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.reject_with {
            Some(status) => Err(TransportError::Status {
                status,
                message: "webhook rejected the submission".to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn get_json(&self, _url: &str) -> Result<Value, TransportError> {
        self.polls.lock().unwrap().push(Instant::now());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::NotReady);

        match reply {
            Reply::NotReady => Ok(json!([])),
            Reply::Ready(body) => Ok(body),
            Reply::Status(status) => Err(TransportError::Status {
                status,
                message: "Bad Gateway".to_string(),
            }),
            Reply::Html => Err(TransportError::ContentType("text/html".to_string())),
            Reply::Hang => std::future::pending().await,
        }
    }
}
