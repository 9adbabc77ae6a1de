use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use crate::{Error, Result};

const PROTOCOL_VERSION_HEADER: &str = "X-nl-protocol-version";

/// HTTP capability the client depends on. `authorization` is the full
/// header value produced by the session.
pub trait Transport: Send + Sync {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> impl Future<Output = Result<Value>> + Send;

    fn get_json(&self, url: &str, authorization: &str) -> impl Future<Output = Result<Value>> + Send;

    /// Response bodies are not interpreted; only the HTTP status is checked.
    fn post_json(
        &self,
        url: &str,
        authorization: &str,
        body: &Value,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

fn check_status(url: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

impl Transport for HttpTransport {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value> {
        trace!(url, "POST form");
        let resp = self.http.post(url).form(form).send().await?;
        Ok(check_status(url, resp)?.json().await?)
    }

    async fn get_json(&self, url: &str, authorization: &str) -> Result<Value> {
        trace!(url, "GET");
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(PROTOCOL_VERSION_HEADER, "1")
            .send()
            .await?;
        Ok(check_status(url, resp)?.json().await?)
    }

    async fn post_json(&self, url: &str, authorization: &str, body: &Value) -> Result<()> {
        trace!(url, "POST json");
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(PROTOCOL_VERSION_HEADER, "1")
            .json(body)
            .send()
            .await?;
        check_status(url, resp)?;
        Ok(())
    }
}
