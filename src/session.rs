use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::logger::MessageLogger;
use crate::protocol::{parse_login_response, status_url};
use crate::transport::Transport;
use crate::types::Credentials;
use crate::{Error, Result};

pub const DEFAULT_AUTH_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub transport_url: String,
    pub user_id: String,
    access_token: String,
    issued_at: Instant,
}

impl Session {
    pub fn authorization(&self) -> String {
        format!("Basic {}", self.access_token)
    }

    pub fn status_url(&self) -> String {
        status_url(&self.transport_url, &self.user_id)
    }

    pub fn age(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

/// Owns the credentials and the current session. Holds no thermostat data.
#[derive(Debug)]
pub(crate) struct SessionManager {
    credentials: Credentials,
    login_url: String,
    auth_ttl: Duration,
    session: Option<Session>,
}

impl SessionManager {
    pub fn new(credentials: Credentials, login_url: impl Into<String>, auth_ttl: Duration) -> Self {
        Self {
            credentials,
            login_url: login_url.into(),
            auth_ttl,
            session: None,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn invalidate(&mut self) {
        self.session = None;
    }

    fn is_fresh(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.age() < self.auth_ttl)
    }

    /// Logs in when there is no session or it has reached the auth TTL.
    /// Returns `true` when a new session was installed; anything derived
    /// from the previous one is then invalid.
    pub async fn ensure_fresh<T: Transport>(
        &mut self,
        transport: &T,
        logger: Option<&mut MessageLogger>,
    ) -> Result<bool> {
        if self.is_fresh() {
            return Ok(false);
        }
        if self.session.is_some() {
            debug!(ttl = ?self.auth_ttl, "auth token expired, logging in again");
        }
        self.session = None;
        self.session = Some(self.login(transport, logger).await?);
        Ok(true)
    }

    async fn login<T: Transport>(
        &self,
        transport: &T,
        logger: Option<&mut MessageLogger>,
    ) -> Result<Session> {
        debug!(url = %self.login_url, user = self.credentials.username(), "logging in");
        if let Some(logger) = logger {
            logger.log_login(&self.login_url, self.credentials.username());
        }

        let form = [
            ("username", self.credentials.username()),
            ("password", self.credentials.password()),
        ];
        let body = transport
            .post_form(&self.login_url, &form)
            .await
            .map_err(|e| Error::Authentication(format!("login request failed: {e}")))?;
        let resp = parse_login_response(body)?;

        info!(user_id = %resp.userid, "logged in");
        Ok(Session {
            transport_url: resp.transport_url().to_string(),
            user_id: resp.userid,
            access_token: resp.access_token,
            issued_at: Instant::now(),
        })
    }
}
