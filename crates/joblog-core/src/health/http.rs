//! HTTP status probe.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};

use super::Checker;
use crate::config::HealthComponentConfig;
use crate::error::{CheckResult, HealthError, LogError, LogResult};

/// Bytes of the response body quoted in a failure.
const BODY_PREFIX_LEN: usize = 256;

/// Requests a URL and expects a given status code.
///
/// The [`Client`] is injected, so TLS and proxy settings stay with the
/// caller.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    method: Method,
    url: String,
    headers: HeaderMap,
    timeout: Duration,
    expected_status: u16,
}

impl HttpProbe {
    /// `GET url` expecting 200 within ten seconds.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            timeout: Duration::from_secs(10),
            expected_status: 200,
        }
    }

    pub fn from_config(client: Client, config: &HealthComponentConfig) -> LogResult<Self> {
        let method = Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|e| LogError::InvalidConfig(format!("bad method {}: {}", config.method, e)))?;
        let mut probe = Self::new(client, config.url.clone())
            .with_method(method)
            .with_timeout(Duration::from_secs(config.timeout))
            .with_expected_status(config.expected_status);
        for (name, value) in &config.headers {
            probe = probe.with_header(name, value)?;
        }
        Ok(probe)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> LogResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| LogError::InvalidConfig(format!("bad header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| LogError::InvalidConfig(format!("bad header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue the request once.
    pub async fn probe(&self) -> CheckResult {
        let response = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HealthError::Failed(format!("failed to request {}: {}", self.url, e)))?;

        let status = response.status().as_u16();
        if status == self.expected_status {
            return Ok(());
        }

        let body = response.bytes().await.unwrap_or_default();
        let prefix = String::from_utf8_lossy(&body[..body.len().min(BODY_PREFIX_LEN)]);
        Err(HealthError::Failed(format!(
            "unexpected status code: {} != {}, response: {}",
            status, self.expected_status, prefix
        )))
    }
}

impl Checker for HttpProbe {
    fn check(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(self.probe())
    }
}
