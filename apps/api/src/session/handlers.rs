//! Axum route handlers for the Session API.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::session::{Credentials, Registration, Session, User};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub session_checked: bool,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            is_authenticated: session.is_authenticated(),
            user: session.user,
            is_loading: session.is_loading,
            error: session.error,
            session_checked: session.session_checked,
        }
    }
}

fn current(state: &AppState) -> Json<SessionResponse> {
    Json(state.session.snapshot().into())
}

fn require_credentials(email: &str, password: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/v1/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    current(&state)
}

/// POST /api/v1/session/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SessionResponse>, AppError> {
    require_credentials(&credentials.email, &credentials.password)?;
    state.session.login(&credentials).await?;
    Ok(current(&state))
}

/// POST /api/v1/session/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<Json<SessionResponse>, AppError> {
    require_credentials(&registration.email, &registration.password)?;
    state.session.register(&registration).await?;
    Ok(current(&state))
}

/// POST /api/v1/session/logout
///
/// Always answers with the (now anonymous) session; remote failures are only logged.
pub async fn handle_logout(State(state): State<AppState>) -> Json<SessionResponse> {
    let _ = state.session.logout().await;
    current(&state)
}

/// POST /api/v1/session/refresh
pub async fn handle_refresh(State(state): State<AppState>) -> Json<SessionResponse> {
    state.session.refresh_session().await;
    current(&state)
}

/// DELETE /api/v1/session/error
pub async fn handle_clear_error(State(state): State<AppState>) -> Json<SessionResponse> {
    state.session.clear_error();
    current(&state)
}
