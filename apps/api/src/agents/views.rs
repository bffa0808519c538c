//! Per-view job ownership. Each open agent view holds at most one job; a new
//! submit on the same view supersedes (cancels) the old one, and closing the
//! view cancels and discards whatever it holds.
//!
//! A job is registered before its webhook POST goes out, so the slot always
//! belongs to the most recently started submit and a close during submission
//! still cancels it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::poller::{Job, JobHandle, JobSpec, Poller};

/// Above this many open views, views whose job already finished are evicted.
const MAX_VIEWS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ViewKey {
    agent: String,
    view: String,
}

impl ViewKey {
    fn new(agent: &str, view: &str) -> Self {
        Self {
            agent: agent.to_string(),
            view: view.to_string(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ViewRegistry {
    views: Arc<Mutex<HashMap<ViewKey, JobHandle>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the view's current job (if any), then submits a new one.
    /// Returns the new job's state as of the end of submission; a job that was
    /// superseded or closed while its webhook call was in flight comes back `Idle`.
    pub async fn submit(
        &self,
        poller: &Poller,
        spec: JobSpec<'_>,
        view: &str,
        parameters: BTreeMap<String, String>,
    ) -> Job {
        let handle = Poller::prepare(spec, parameters);

        {
            let mut views = self.views.lock().await;
            if let Some(previous) = views.insert(ViewKey::new(spec.agent, view), handle.clone()) {
                info!(
                    job_id = %previous.id(),
                    agent = spec.agent,
                    view,
                    "Superseding in-flight job"
                );
                previous.cancel();
            }
            if views.len() > MAX_VIEWS {
                let before = views.len();
                views.retain(|_, held| !held.snapshot().state.is_terminal());
                info!("Evicted {} finished views", before - views.len());
            }
        }

        poller.launch(spec, &handle).await;
        handle.snapshot()
    }

    pub async fn snapshot(&self, agent: &str, view: &str) -> Option<Job> {
        self.views
            .lock()
            .await
            .get(&ViewKey::new(agent, view))
            .map(JobHandle::snapshot)
    }

    /// View teardown. Returns false when the view held no job.
    pub async fn close(&self, agent: &str, view: &str) -> bool {
        match self.views.lock().await.remove(&ViewKey::new(agent, view)) {
            Some(handle) => {
                handle.cancel();
                info!(job_id = %handle.id(), agent, view, "View closed");
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub async fn open_views(&self) -> usize {
        self.views.lock().await.len()
    }
}
