//! Toast notifications: short-lived, user-visible messages that expire on
//! their own. The UI polls `GET /api/v1/notifications` and renders what is active.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::state::AppState;

const MAX_QUEUED: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: Level,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    expires_at: Instant,
}

#[derive(Clone)]
pub struct NotificationCenter {
    queue: Arc<Mutex<VecDeque<Notification>>>,
    ttl: Duration,
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            ttl,
        }
    }

    pub fn push(&self, level: Level, message: impl Into<String>) {
        let now = Instant::now();
        let mut queue = self.lock();
        prune(&mut queue, now);
        if queue.len() >= MAX_QUEUED {
            queue.pop_front();
        }
        queue.push_back(Notification {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            created_at: Utc::now(),
            expires_at: now + self.ttl,
        });
    }

    /// Notifications that have not yet expired, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        let mut queue = self.lock();
        prune(&mut queue, Instant::now());
        queue.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Every entry shares one ttl, so expiry order is insertion order.
fn prune(queue: &mut VecDeque<Notification>, now: Instant) {
    while queue.front().is_some_and(|n| n.expires_at <= now) {
        queue.pop_front();
    }
}

/// GET /api/v1/notifications
pub async fn handle_list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifications.active())
}
