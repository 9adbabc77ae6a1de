use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{self, Endpoint, Identifiers, StatusDocument, DEFAULT_LOGIN_URL};
use crate::session::{SessionManager, DEFAULT_AUTH_TTL};
use crate::transport::{HttpTransport, Transport};
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_millis(100);

pub struct NestClientBuilder {
    credentials: Credentials,
    login_url: String,
    cache_ttl: Duration,
    auth_ttl: Duration,
    max_retries: u32,
    retry_wait: Duration,
    request_timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl NestClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            auth_ttl: DEFAULT_AUTH_TTL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait: DEFAULT_RETRY_WAIT,
            request_timeout: HttpTransport::DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn auth_ttl(mut self, ttl: Duration) -> Self {
        self.auth_ttl = ttl;
        self
    }

    /// Send/verify cycles per write. Values below 1 are treated as 1.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    /// Per-request timeout for the default HTTP transport.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    /// Logs in and resolves the configured names over HTTP. Fails if the
    /// credentials are rejected or either name is unknown.
    pub async fn connect(self) -> Result<NestClient<HttpTransport>> {
        let transport = HttpTransport::new(self.request_timeout)?;
        self.connect_with(transport).await
    }

    pub async fn connect_with<T: Transport>(self, transport: T) -> Result<NestClient<T>> {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        let mut client = NestClient {
            transport,
            session: SessionManager::new(self.credentials, self.login_url, self.auth_ttl),
            snapshot: None,
            ids: None,
            cache_ttl: self.cache_ttl,
            max_retries: self.max_retries,
            retry_wait: self.retry_wait,
            logger,
        };
        client.ensure_fresh_status().await?;
        Ok(client)
    }
}

struct Snapshot {
    doc: StatusDocument,
    fetched_at: Instant,
}

/// What a write must observe before it counts as confirmed.
#[derive(Debug, Clone, Copy)]
enum Expectation {
    Fan(FanMode),
    Mode(HvacMode),
    Away(bool),
    Target(f64),
    Range { low: f64, high: f64 },
}

pub struct NestClient<T: Transport = HttpTransport> {
    transport: T,
    session: SessionManager,
    snapshot: Option<Snapshot>,
    ids: Option<Identifiers>,
    cache_ttl: Duration,
    max_retries: u32,
    retry_wait: Duration,
    logger: Option<MessageLogger>,
}

impl NestClient<HttpTransport> {
    pub fn builder(credentials: Credentials) -> NestClientBuilder {
        NestClientBuilder::new(credentials)
    }
}

impl<T: Transport> NestClient<T> {
    pub fn credentials(&self) -> &Credentials {
        self.session.credentials()
    }

    pub fn identifiers(&self) -> Option<&Identifiers> {
        self.ids.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drops the session and logs in again immediately, re-resolving the
    /// configured names.
    pub async fn relogin(&mut self) -> Result<()> {
        self.session.invalidate();
        self.ensure_fresh_status().await
    }

    /// Forces the next read to fetch status from the backend.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }

    async fn ensure_session(&mut self) -> Result<()> {
        if self
            .session
            .ensure_fresh(&self.transport, self.logger.as_mut())
            .await?
        {
            self.snapshot = None;
            self.ids = None;
        }
        Ok(())
    }

    pub async fn ensure_fresh_status(&mut self) -> Result<()> {
        self.ensure_session().await?;
        if let Some(snapshot) = &self.snapshot
            && snapshot.fetched_at.elapsed() < self.cache_ttl
        {
            trace!("status cache hit");
            return Ok(());
        }
        self.fetch_status().await
    }

    async fn fetch_status(&mut self) -> Result<()> {
        let session = self
            .session
            .session()
            .ok_or_else(|| Error::Authentication("no active session".to_string()))?;
        let url = session.status_url();
        let authorization = session.authorization();

        debug!(url = %url, "fetching status");
        let fetched_at = Instant::now();
        let body = self.transport.get_json(&url, &authorization).await?;
        if let Some(ref mut logger) = self.logger {
            logger.log_status(&body);
        }
        let doc = StatusDocument::parse(body)?;

        if self.ids.is_none() {
            let creds = self.session.credentials();
            let ids = doc.resolve(creds.device_name(), creds.location_name())?;
            debug!(serial = %ids.serial, structure = %ids.structure_id, "resolved identifiers");
            self.ids = Some(ids);
        }

        self.snapshot = Some(Snapshot { doc, fetched_at });
        Ok(())
    }

    /// Looks `name` up in the device, shared and structure sections, in
    /// that order, refreshing status first if it is stale.
    pub async fn get_attribute(&mut self, name: &str) -> Result<Value> {
        self.ensure_fresh_status().await?;
        self.cached_attribute(name).cloned()
    }

    // -- Snapshot accessors (no refresh) --

    fn cached_attribute(&self, name: &str) -> Result<&Value> {
        let (Some(snapshot), Some(ids)) = (&self.snapshot, &self.ids) else {
            return Err(Error::Protocol("status not loaded".to_string()));
        };
        snapshot
            .doc
            .lookup(ids, name)
            .ok_or_else(|| Error::AttributeNotFound(name.to_string()))
    }

    fn cached_f64(&self, name: &str) -> Result<f64> {
        let value = self.cached_attribute(name)?;
        value.as_f64().ok_or_else(|| invalid_value(name, value))
    }

    fn cached_bool(&self, name: &str) -> Result<bool> {
        let value = self.cached_attribute(name)?;
        value.as_bool().ok_or_else(|| invalid_value(name, value))
    }

    fn cached_str(&self, name: &str) -> Result<&str> {
        let value = self.cached_attribute(name)?;
        value.as_str().ok_or_else(|| invalid_value(name, value))
    }

    fn cached_scale(&self) -> Result<TemperatureScale> {
        let raw = self.cached_str(protocol::TEMPERATURE_SCALE)?;
        TemperatureScale::from_nest_str(raw).ok_or_else(|| Error::InvalidValue {
            attribute: protocol::TEMPERATURE_SCALE.to_string(),
            value: raw.to_string(),
        })
    }

    fn cached_temperature(&self, name: &str) -> Result<f64> {
        let scale = self.cached_scale()?;
        Ok(scale.to_caller(self.cached_f64(name)?))
    }

    // -- Reads --

    pub async fn temperature(&mut self) -> Result<f64> {
        self.ensure_fresh_status().await?;
        self.cached_temperature(protocol::CURRENT_TEMPERATURE)
    }

    pub async fn humidity(&mut self) -> Result<u8> {
        self.ensure_fresh_status().await?;
        let humidity = self.cached_f64(protocol::CURRENT_HUMIDITY)?;
        Ok(humidity.round().clamp(0.0, 100.0) as u8)
    }

    pub async fn fan_mode(&mut self) -> Result<FanMode> {
        self.ensure_fresh_status().await?;
        let raw = self.cached_str(protocol::FAN_MODE)?;
        FanMode::from_nest_str(raw).ok_or_else(|| Error::InvalidValue {
            attribute: protocol::FAN_MODE.to_string(),
            value: raw.to_string(),
        })
    }

    pub async fn mode(&mut self) -> Result<HvacMode> {
        self.ensure_fresh_status().await?;
        let raw = self.cached_str(protocol::HVAC_MODE)?;
        HvacMode::from_nest_str(raw).ok_or_else(|| Error::InvalidValue {
            attribute: protocol::HVAC_MODE.to_string(),
            value: raw.to_string(),
        })
    }

    pub async fn target_temperature(&mut self) -> Result<f64> {
        self.ensure_fresh_status().await?;
        self.cached_temperature(protocol::TARGET_TEMPERATURE)
    }

    pub async fn range_temperatures(&mut self) -> Result<RangeTemperatures> {
        self.ensure_fresh_status().await?;
        Ok(RangeTemperatures {
            low: self.cached_temperature(protocol::RANGE_LOW)?,
            high: self.cached_temperature(protocol::RANGE_HIGH)?,
        })
    }

    pub async fn is_heating(&mut self) -> Result<bool> {
        self.ensure_fresh_status().await?;
        self.cached_bool(protocol::HEATER_ON)
    }

    pub async fn is_cooling(&mut self) -> Result<bool> {
        self.ensure_fresh_status().await?;
        self.cached_bool(protocol::COOLER_ON)
    }

    pub async fn is_fan_running(&mut self) -> Result<bool> {
        self.ensure_fresh_status().await?;
        self.cached_bool(protocol::FAN_ON)
    }

    pub async fn is_away(&mut self) -> Result<bool> {
        self.ensure_fresh_status().await?;
        self.cached_bool(protocol::AWAY)
    }

    /// Always fetches: the pending flag changes faster than the cache TTL.
    pub async fn is_pending_change(&mut self) -> Result<bool> {
        self.invalidate();
        self.ensure_fresh_status().await?;
        self.cached_bool(protocol::TARGET_CHANGE_PENDING)
    }

    pub async fn temperature_scale(&mut self) -> Result<TemperatureScale> {
        self.ensure_fresh_status().await?;
        self.cached_scale()
    }

    // -- Writes --

    pub async fn set_fan_mode(&mut self, mode: FanMode) -> Result<bool> {
        let data = protocol::set_fan_mode_data(mode.as_nest_str());
        self.write_confirmed("set_fan_mode", Endpoint::Shared, data, Expectation::Fan(mode))
            .await
    }

    pub async fn set_away(&mut self, away: bool) -> Result<bool> {
        let data = protocol::set_away_data(away);
        self.write_confirmed("set_away", Endpoint::Structure, data, Expectation::Away(away))
            .await
    }

    pub async fn set_mode(&mut self, mode: HvacMode) -> Result<bool> {
        let data = protocol::set_hvac_mode_data(mode.as_nest_str());
        self.write_confirmed("set_mode", Endpoint::Shared, data, Expectation::Mode(mode))
            .await
    }

    /// Sets the single setpoint used in heat or cool mode. Bounded by the
    /// retry budget even while the backend keeps reporting a pending change.
    pub async fn set_target_temperature(&mut self, value: f64) -> Result<bool> {
        self.ensure_fresh_status().await?;
        let scale = self.cached_scale()?;
        let data = protocol::set_target_data(scale.to_backend(value));
        let confirmed = self
            .write_confirmed(
                "set_target_temperature",
                Endpoint::Shared,
                data,
                Expectation::Target(value),
            )
            .await?;
        if !confirmed {
            match self.is_pending_change().await {
                Ok(true) => warn!(setpoint = value, "backend still reports a pending target change"),
                Ok(false) => {}
                Err(e) => debug!(setpoint = value, error = %e, "pending-change check failed"),
            }
        }
        Ok(confirmed)
    }

    pub async fn set_range_temperatures(&mut self, low: f64, high: f64) -> Result<bool> {
        self.ensure_fresh_status().await?;
        let scale = self.cached_scale()?;
        let data = protocol::set_range_data(scale.to_backend(low), scale.to_backend(high));
        self.write_confirmed(
            "set_range_temperatures",
            Endpoint::Shared,
            data,
            Expectation::Range { low, high },
        )
        .await
    }

    // -- Write protocol --

    /// Sends `data` and re-reads status until the expectation holds or the
    /// retry budget runs out. Send failures are ignored; only the observed
    /// state decides the outcome. Verification reads that fail at the
    /// transport level count as unconfirmed, so a run of them ends in
    /// `Ok(false)` rather than an error.
    async fn write_confirmed(
        &mut self,
        action: &'static str,
        endpoint: Endpoint,
        data: Value,
        expected: Expectation,
    ) -> Result<bool> {
        self.ensure_fresh_status().await?;

        for attempt in 1..=self.max_retries {
            let url = self.command_url(endpoint).await?;
            self.invalidate();
            self.send_command(action, attempt, &url, &data).await;

            match self.observed_matches(expected).await {
                Ok(true) => {
                    info!(action, attempt, "command confirmed");
                    return Ok(true);
                }
                Ok(false) => debug!(action, attempt, "command not reflected yet"),
                Err(e) if e.is_transport() => {
                    debug!(action, attempt, error = %e, "verification read failed");
                }
                Err(e) => return Err(e),
            }

            if attempt < self.max_retries {
                sleep(self.retry_wait).await;
            }
        }

        warn!(action, attempts = self.max_retries, "command not confirmed");
        Ok(false)
    }

    async fn command_url(&mut self, endpoint: Endpoint) -> Result<String> {
        self.ensure_session().await?;
        if self.ids.is_none() {
            self.fetch_status().await?;
        }
        let (Some(session), Some(ids)) = (self.session.session(), &self.ids) else {
            return Err(Error::Protocol("no resolved identifiers".to_string()));
        };
        let id = match endpoint {
            Endpoint::Structure => &ids.structure_id,
            Endpoint::Shared | Endpoint::Device => &ids.serial,
        };
        Ok(protocol::command_url(&session.transport_url, endpoint, id))
    }

    async fn send_command(&mut self, action: &str, attempt: u32, url: &str, data: &Value) {
        let Some(authorization) = self.session.session().map(|s| s.authorization()) else {
            return;
        };
        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, attempt, url, data);
        }
        debug!(action, attempt, url, "sending command");
        if let Err(e) = self.transport.post_json(url, &authorization, data).await {
            debug!(action, attempt, error = %e, "command send failed");
        }
    }

    async fn observed_matches(&mut self, expected: Expectation) -> Result<bool> {
        Ok(match expected {
            Expectation::Fan(mode) => self.fan_mode().await? == mode,
            Expectation::Mode(mode) => self.mode().await? == mode,
            Expectation::Away(away) => self.is_away().await? == away,
            Expectation::Target(value) => self.target_temperature().await? == value.round(),
            Expectation::Range { low, high } => {
                let observed = self.range_temperatures().await?;
                observed.low == low.round() && observed.high == high.round()
            }
        })
    }
}

fn invalid_value(attribute: &str, value: &Value) -> Error {
    Error::InvalidValue {
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}
