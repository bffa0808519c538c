use std::sync::Arc;

use crate::agents::views::ViewRegistry;
use crate::config::Config;
use crate::notifications::NotificationCenter;
use crate::poller::Poller;
use crate::session::SessionService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// The one Session for this process. Handlers and the route guard read it here.
    pub session: Arc<SessionService>,
    pub poller: Poller,
    /// Jobs keyed by agent view.
    pub views: ViewRegistry,
    pub notifications: NotificationCenter,
}

#[cfg(test)]
impl AppState {
    pub fn for_tests(
        jobs: Arc<dyn crate::poller::JobTransport>,
        session_api: Arc<dyn crate::session::SessionApi>,
    ) -> Self {
        let config = Config::for_tests();
        let notifications = NotificationCenter::new(config.notification_ttl);
        let session = SessionService::new(session_api, config.http_timeout, notifications.clone());
        let poller = Poller::new(
            jobs,
            crate::poller::PollSettings {
                interval: config.poll_interval,
                max_attempts: config.poll_max_attempts,
            },
            notifications.clone(),
        );

        AppState {
            config,
            session: Arc::new(session),
            poller,
            views: ViewRegistry::new(),
            notifications,
        }
    }
}
