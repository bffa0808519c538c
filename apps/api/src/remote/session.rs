//! Cookie-session API calls. Credentials travel in the shared client's cookie jar.

use async_trait::async_trait;
use serde::Serialize;

use super::{RemoteClient, TransportError};
use crate::session::{Credentials, Registration, SessionApi, SessionError, SessionReply};

impl RemoteClient {
    async fn post_session<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<SessionReply, SessionError> {
        let response = self
            .client
            .post(self.session_url(path))
            .json(body)
            .send()
            .await
            .map_err(TransportError::from)?;

        if !response.status().is_success() {
            return Err(rejected(Self::status_error(response).await));
        }

        let body = Self::read_json(response).await?;
        Ok(serde_json::from_value(body).map_err(TransportError::from)?)
    }
}

/// A non-2xx reply from the session API is a rejection, not a transport failure.
fn rejected(err: TransportError) -> SessionError {
    match err {
        TransportError::Status { status, message } => SessionError::Rejected { status, message },
        other => SessionError::Transport(other),
    }
}

#[async_trait]
impl SessionApi for RemoteClient {
    async fn fetch_session(&self) -> Result<SessionReply, SessionError> {
        let response = self
            .client
            .get(self.session_url("session"))
            .send()
            .await
            .map_err(TransportError::from)?;

        if !response.status().is_success() {
            return Err(rejected(Self::status_error(response).await));
        }

        let body = Self::read_json(response).await?;
        Ok(serde_json::from_value(body).map_err(TransportError::from)?)
    }

    async fn login(&self, credentials: &Credentials) -> Result<SessionReply, SessionError> {
        self.post_session("login", credentials).await
    }

    async fn register(&self, registration: &Registration) -> Result<SessionReply, SessionError> {
        self.post_session("register", registration).await
    }

    async fn logout(&self) -> Result<(), SessionError> {
        let response = self
            .client
            .post(self.session_url("logout"))
            .send()
            .await
            .map_err(TransportError::from)?;

        if !response.status().is_success() {
            return Err(rejected(Self::status_error(response).await));
        }
        Ok(())
    }
}
