//! Async Job Poller — submits a job to an agent webhook, then polls the agent's
//! result endpoint on a fixed interval until output appears or the attempt
//! ceiling is reached.
//!
//! Each polling job owns exactly one spawned task and one `CancellationToken`.
//! The task races every sleep and every in-flight request against the token,
//! so once `JobHandle::cancel` returns no further poll is issued. Job state is
//! published through a `watch` channel: readers always see a whole record.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AgentEndpoints;
use crate::notifications::{Level, NotificationCenter};
use crate::remote::TransportError;

pub mod probe;
#[cfg(test)]
pub mod testing;
pub mod validation;

pub use probe::ResultProbe;

// ────────────────────────────────────────────────────────────────────────────
// Job model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Submission,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum JobResult {
    Text(String),
    Structured(Value),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("Submission failed: {0}")]
    Submission(#[from] TransportError),

    #[error("No result after {attempts} attempts, please try again")]
    Timeout { attempts: u32 },
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Validation(_) => FailureKind::Validation,
            JobError::Submission(_) => FailureKind::Submission,
            JobError::Timeout { .. } => FailureKind::Timeout,
        }
    }
}

/// One submit-then-poll cycle for one agent view.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub agent: String,
    pub parameters: BTreeMap<String, String>,
    pub state: JobState,
    pub attempts: u32,
    pub result: Option<JobResult>,
    /// Last transient or terminal failure message.
    pub last_error: Option<String>,
    /// Set only when `state == Failed`.
    pub failure: Option<FailureKind>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(agent: &str, parameters: BTreeMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent: agent.to_string(),
            parameters,
            state: JobState::Idle,
            attempts: 0,
            result: None,
            last_error: None,
            failure: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    fn fail(&mut self, err: &JobError) {
        self.state = JobState::Failed;
        self.failure = Some(err.kind());
        self.last_error = Some(err.to_string());
        self.finished_at = Some(Utc::now());
    }

    fn complete(&mut self, result: JobResult) {
        self.state = JobState::Completed;
        self.result = Some(result);
        self.last_error = None;
        self.finished_at = Some(Utc::now());
    }

    /// Back to idle with the form cleared. `attempts` is left as it was.
    fn discard(&mut self) {
        self.state = JobState::Idle;
        self.parameters.clear();
        self.result = None;
        self.last_error = None;
        self.failure = None;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transport seam
// ────────────────────────────────────────────────────────────────────────────

/// Outbound calls the poller needs. `RemoteClient` is the production
/// implementation; tests plug in a scripted one.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// POSTs `body` as JSON. Any non-2xx status is an error.
    async fn post_json(&self, url: &str, body: &Value) -> Result<(), TransportError>;

    /// GETs a JSON document. Non-2xx or a non-JSON content type is an error.
    async fn get_json(&self, url: &str) -> Result<Value, TransportError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Poller
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            max_attempts: 15,
        }
    }
}

/// Everything the poller needs to know about one agent.
#[derive(Debug, Clone, Copy)]
pub struct JobSpec<'a> {
    pub agent: &'a str,
    pub endpoints: &'a AgentEndpoints,
    pub required_fields: &'a [&'a str],
    pub probe: ResultProbe,
}

#[derive(Clone)]
pub struct Poller {
    transport: Arc<dyn JobTransport>,
    settings: PollSettings,
    notifications: NotificationCenter,
}

impl Poller {
    pub fn new(
        transport: Arc<dyn JobTransport>,
        settings: PollSettings,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            transport,
            settings,
            notifications,
        }
    }

    /// Validates and submits a job, then starts polling on success.
    ///
    /// Returns once the submission outcome is known. Validation and submission
    /// failures leave the job `Failed` with no polling scheduled; neither is
    /// retried automatically.
    pub async fn submit(&self, spec: JobSpec<'_>, parameters: BTreeMap<String, String>) -> JobHandle {
        let handle = Self::prepare(spec, parameters);
        self.launch(spec, &handle).await;
        handle
    }

    /// Creates the job record in `Submitting` without touching the network, so
    /// an owner can publish (and cancel) the handle before the webhook answers.
    pub fn prepare(spec: JobSpec<'_>, parameters: BTreeMap<String, String>) -> JobHandle {
        let mut job = Job::new(spec.agent, parameters);
        job.state = JobState::Submitting;
        let (tx, _) = watch::channel(job);
        let cancel = CancellationToken::new();
        JobHandle {
            job: Arc::new(tx),
            _guard: Arc::new(cancel.clone().drop_guard()),
            cancel,
            task: Arc::new(OnceLock::new()),
        }
    }

    /// Validates, POSTs to the webhook and spawns the poll task. A handle
    /// cancelled at any point before the task starts never gets one.
    pub async fn launch(&self, spec: JobSpec<'_>, handle: &JobHandle) {
        let job_id = handle.id();
        let parameters = handle.job.borrow().parameters.clone();

        if let Err(err) = validation::validate_parameters(spec.required_fields, &parameters) {
            info!(%job_id, agent = spec.agent, "Submission rejected locally: {err}");
            handle.settle(|job| job.fail(&err));
            return;
        }

        let body = Value::Object(
            parameters
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        );

        let posted = tokio::select! {
            biased;
            _ = handle.cancel.cancelled() => {
                debug!(%job_id, "Submission abandoned, job cancelled");
                return;
            }
            posted = self.transport.post_json(&spec.endpoints.webhook_url, &body) => posted,
        };

        if let Err(err) = posted {
            let err = JobError::from(err);
            warn!(%job_id, agent = spec.agent, "{err}");
            if handle.settle(|job| job.fail(&err)) {
                self.notifications.push(Level::Error, err.to_string());
            }
            return;
        }

        let started = handle.settle(|job| {
            job.state = JobState::Polling;
            job.attempts = 0;
        });
        if !started {
            debug!(%job_id, "Webhook accepted a job that was cancelled meanwhile");
            return;
        }
        info!(
            %job_id,
            agent = spec.agent,
            "Job accepted, polling {} every {}s",
            spec.endpoints.poll_url,
            self.settings.interval.as_secs()
        );

        let run = PollRun {
            transport: Arc::clone(&self.transport),
            settings: self.settings,
            poll_url: spec.endpoints.poll_url.clone(),
            probe: spec.probe,
            job: Arc::clone(&handle.job),
            cancel: handle.cancel.clone(),
            notifications: self.notifications.clone(),
        };
        let _ = handle.task.set(tokio::spawn(run.run()));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Job handle
// ────────────────────────────────────────────────────────────────────────────

/// Owner's handle to a submitted job. Clones share the job; polling is
/// cancelled once the last clone is dropped.
#[derive(Clone)]
pub struct JobHandle {
    job: Arc<watch::Sender<Job>>,
    cancel: CancellationToken,
    _guard: Arc<DropGuard>,
    task: Arc<OnceLock<JoinHandle<()>>>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.job.borrow().id
    }

    pub fn snapshot(&self) -> Job {
        self.job.borrow().clone()
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.job.subscribe()
    }

    /// Stops polling and discards a job that has not reached a terminal state.
    /// Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
        let discarded = self.job.send_if_modified(|job| {
            if job.state.is_terminal() || job.state == JobState::Idle {
                return false;
            }
            job.discard();
            true
        });
        if discarded {
            info!(job_id = %self.id(), "Job cancelled");
        }
    }

    /// Applies a submission outcome unless the job was cancelled first.
    /// The check runs under the channel lock, so it cannot interleave with `cancel`.
    fn settle(&self, apply: impl FnOnce(&mut Job)) -> bool {
        self.job.send_if_modified(|job| {
            if self.cancel.is_cancelled() {
                return false;
            }
            apply(job);
            true
        })
    }

    /// True while the poll task is still alive.
    #[cfg(test)]
    pub fn is_polling(&self) -> bool {
        self.task.get().is_some_and(|task| !task.is_finished())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Poll loop
// ────────────────────────────────────────────────────────────────────────────

enum Step {
    Continue,
    Completed,
    TimedOut,
    Stopped,
}

struct PollRun {
    transport: Arc<dyn JobTransport>,
    settings: PollSettings,
    poll_url: String,
    probe: ResultProbe,
    job: Arc<watch::Sender<Job>>,
    cancel: CancellationToken,
    notifications: NotificationCenter,
}

impl PollRun {
    async fn run(self) {
        let job_id = self.job.borrow().id;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outcome = self.transport.get_json(&self.poll_url) => outcome,
            };

            match self.record(outcome) {
                Step::Continue => continue,
                Step::Completed => {
                    info!(%job_id, "Job completed");
                    self.notifications.push(Level::Success, "Your content is ready");
                    break;
                }
                Step::TimedOut => {
                    let message = self.job.borrow().last_error.clone().unwrap_or_default();
                    warn!(%job_id, "Job timed out: {message}");
                    self.notifications.push(Level::Error, message);
                    break;
                }
                Step::Stopped => break,
            }
        }

        debug!(%job_id, "Poll loop stopped");
    }

    /// Applies one poll outcome to the job in a single atomic update.
    fn record(&self, outcome: Result<Value, TransportError>) -> Step {
        let found = outcome
            .as_ref()
            .ok()
            .and_then(|body| self.probe.extract(body));
        let mut step = Step::Stopped;

        self.job.send_if_modified(|job| {
            if self.cancel.is_cancelled() || job.state != JobState::Polling {
                return false;
            }
            job.attempts += 1;

            if let Some(result) = found {
                job.complete(result);
                step = Step::Completed;
                return true;
            }

            match &outcome {
                Ok(_) => debug!(job_id = %job.id, attempt = job.attempts, "No output yet"),
                Err(err) => {
                    debug!(job_id = %job.id, attempt = job.attempts, "Transient poll error: {err}");
                    job.last_error = Some(err.to_string());
                }
            }

            step = if job.attempts >= self.settings.max_attempts {
                job.fail(&JobError::Timeout {
                    attempts: job.attempts,
                });
                Step::TimedOut
            } else {
                Step::Continue
            };
            true
        });

        step
    }
}
