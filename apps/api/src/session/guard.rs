//! Route guard for agent views. The service only decides; navigation is
//! left to the UI, which follows the 303 or waits out the 503.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use super::Session;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not settled yet: show a loading indicator.
    Loading,
    /// Settled and anonymous: go to login, then come back to `location`'s `next`.
    RedirectToLogin { location: String },
    Render,
}

pub fn decide(session: &Session, login_path: &str, requested: &str) -> GuardDecision {
    if session.is_loading || !session.session_checked {
        GuardDecision::Loading
    } else if !session.is_authenticated() {
        GuardDecision::RedirectToLogin {
            location: login_redirect(login_path, requested),
        }
    } else {
        GuardDecision::Render
    }
}

/// `/login` + `/api/v1/agents?x=1` → `/login?next=%2Fapi%2Fv1%2Fagents%3Fx%3D1`
pub fn login_redirect(login_path: &str, requested: &str) -> String {
    format!("{login_path}?next={}", urlencoding::encode(requested))
}

/// Axum middleware applied to every agent route.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let requested = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    match decide(&state.session.snapshot(), &state.config.login_path, &requested) {
        GuardDecision::Render => next.run(request).await,
        GuardDecision::Loading => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(json!({ "status": "loading" })),
        )
            .into_response(),
        GuardDecision::RedirectToLogin { location } => {
            debug!("Anonymous request to {requested}, redirecting to login");
            (
                StatusCode::SEE_OTHER,
                [(header::LOCATION, location.clone())],
                Json(json!({ "status": "unauthenticated", "location": location })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::User;

    fn settled(user: Option<&str>) -> Session {
        Session {
            user: user.map(|email| User {
                email: email.to_string(),
                name: None,
                profile: Default::default(),
            }),
            session_checked: true,
            ..Session::default()
        }
    }

    #[test]
    fn test_unchecked_session_is_loading() {
        assert_eq!(
            decide(&Session::default(), "/login", "/api/v1/agents"),
            GuardDecision::Loading
        );
    }

    #[test]
    fn test_in_flight_call_is_loading() {
        let mut session = settled(Some("a@b.com"));
        session.is_loading = true;
        assert_eq!(decide(&session, "/login", "/x"), GuardDecision::Loading);
    }

    #[test]
    fn test_anonymous_redirects_with_next() {
        assert_eq!(
            decide(&settled(None), "/login", "/api/v1/agents/blog-writer/views/main/job"),
            GuardDecision::RedirectToLogin {
                location: "/login?next=%2Fapi%2Fv1%2Fagents%2Fblog-writer%2Fviews%2Fmain%2Fjob"
                    .to_string()
            }
        );
    }

    #[test]
    fn test_redirect_keeps_query() {
        assert_eq!(
            login_redirect("/signin", "/a?b=1&c=2"),
            "/signin?next=%2Fa%3Fb%3D1%26c%3D2"
        );
    }

    #[test]
    fn test_authenticated_renders() {
        assert_eq!(
            decide(&settled(Some("a@b.com")), "/login", "/x"),
            GuardDecision::Render
        );
    }
}
