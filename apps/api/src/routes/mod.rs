pub mod health;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::agents::handlers as agents;
use crate::notifications::handle_list_notifications;
use crate::session::{guard::require_session, handlers as session};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Agent views require a settled, authenticated session.
    let guarded = Router::new()
        .route("/api/v1/agents", get(agents::handle_list_agents))
        .route(
            "/api/v1/agents/:slug/views/:view/jobs",
            post(agents::handle_submit_job),
        )
        .route(
            "/api/v1/agents/:slug/views/:view/job",
            get(agents::handle_get_job),
        )
        .route(
            "/api/v1/agents/:slug/views/:view",
            delete(agents::handle_close_view),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        // Session API
        .route("/api/v1/session", get(session::handle_get_session))
        .route("/api/v1/session/login", post(session::handle_login))
        .route("/api/v1/session/register", post(session::handle_register))
        .route("/api/v1/session/logout", post(session::handle_logout))
        .route("/api/v1/session/refresh", post(session::handle_refresh))
        .route("/api/v1/session/error", delete(session::handle_clear_error))
        .route("/api/v1/notifications", get(handle_list_notifications))
        .merge(guarded)
        .with_state(state)
}
