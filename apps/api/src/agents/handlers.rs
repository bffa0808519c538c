//! Axum route handlers for agent views. All of these sit behind the session guard.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::agents::{find_agent, AgentSpec, AGENTS};
use crate::errors::AppError;
use crate::poller::{FailureKind, Job, JobState};
use crate::state::AppState;

fn agent_or_404(slug: &str) -> Result<&'static AgentSpec, AppError> {
    find_agent(slug).ok_or_else(|| AppError::NotFound(format!("Agent '{slug}' not found")))
}

/// HTTP status that goes with a freshly submitted job.
fn submit_status(job: &Job) -> StatusCode {
    match (job.state, job.failure) {
        (JobState::Polling, _) => StatusCode::ACCEPTED,
        (JobState::Failed, Some(FailureKind::Validation)) => StatusCode::UNPROCESSABLE_ENTITY,
        (JobState::Failed, _) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    }
}

/// GET /api/v1/agents
pub async fn handle_list_agents() -> Json<&'static [AgentSpec]> {
    Json(AGENTS)
}

/// POST /api/v1/agents/:slug/views/:view/jobs
///
/// Body is the form: a flat JSON object of field name to string value.
/// Replaces whatever job the view was running.
pub async fn handle_submit_job(
    State(state): State<AppState>,
    Path((slug, view)): Path<(String, String)>,
    Json(parameters): Json<BTreeMap<String, String>>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let agent = agent_or_404(&slug)?;
    if view.trim().is_empty() {
        return Err(AppError::Validation("view id cannot be empty".to_string()));
    }

    let endpoints = state.config.endpoints_for(agent.slug);
    let job = state
        .views
        .submit(&state.poller, agent.job_spec(&endpoints), &view, parameters)
        .await;

    Ok((submit_status(&job), Json(job)))
}

/// GET /api/v1/agents/:slug/views/:view/job
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path((slug, view)): Path<(String, String)>,
) -> Result<Json<Job>, AppError> {
    let agent = agent_or_404(&slug)?;
    state
        .views
        .snapshot(agent.slug, &view)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No job for view '{view}'")))
}

/// DELETE /api/v1/agents/:slug/views/:view
///
/// View teardown: cancels polling and discards the job.
pub async fn handle_close_view(
    State(state): State<AppState>,
    Path((slug, view)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let agent = agent_or_404(&slug)?;
    if state.views.close(agent.slug, &view).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("No job for view '{view}'")))
    }
}
