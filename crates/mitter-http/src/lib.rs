//! HTTP transport for the Mitter messaging SDK.
//!
//! Typed clients over the platform's REST API plus [`HttpFetchGateway`], the
//! page source `mitter-core` pagination managers run against.

use std::{sync::Arc, time::Duration};

use mitter_core::{MitterError, MitterErrorCategory, classify_http_status};
use reqwest::{
    RequestBuilder, Response, Url,
    header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

mod channels;
mod gateway;
mod messages;
#[cfg(test)]
mod test_server;

pub use channels::{ChannelHandle, ChannelsClient};
pub use gateway::HttpFetchGateway;
pub use messages::{FileUpload, MessagesClient};

pub const DEFAULT_API_BASE_URL: &str = "https://api.mitter.io";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const API_VERSION: &str = "v1";

/// Connection settings. Authentication headers are supplied by the caller.
#[derive(Debug, Clone)]
pub struct MitterApiConfig {
    pub base_url: String,
    pub default_headers: Vec<(String, String)>,
    pub request_timeout: Duration,
}

impl MitterApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_headers: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for MitterApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

/// Shared HTTP client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MitterHttpClient {
    http: reqwest::Client,
    base_url: Arc<Url>,
}

impl MitterHttpClient {
    pub fn new(config: &MitterApiConfig) -> Result<Self, MitterError> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            MitterError::new(
                MitterErrorCategory::Config,
                "invalid_base_url",
                format!("invalid API base URL '{}': {err}", config.base_url),
            )
        })?;
        if base_url.cannot_be_a_base() {
            return Err(MitterError::new(
                MitterErrorCategory::Config,
                "invalid_base_url",
                format!("API base URL '{}' cannot carry paths", config.base_url),
            ));
        }

        let http = reqwest::Client::builder()
            .default_headers(header_map(&config.default_headers)?)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                MitterError::new(
                    MitterErrorCategory::Config,
                    "client_build_error",
                    err.to_string(),
                )
            })?;

        debug!(base_url = %base_url, timeout_ms = config.request_timeout.as_millis() as u64, "built Mitter HTTP client");
        Ok(Self {
            http,
            base_url: Arc::new(base_url),
        })
    }

    pub fn messages(&self) -> MessagesClient {
        MessagesClient::new(self.clone())
    }

    pub fn channels(&self) -> ChannelsClient {
        ChannelsClient::new(self.clone())
    }

    /// `{base}/v1/{segments...}` with each segment percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, MitterError> {
        let mut url = (*self.base_url).clone();
        url.path_segments_mut()
            .map_err(|()| {
                MitterError::new(
                    MitterErrorCategory::Config,
                    "invalid_base_url",
                    "API base URL cannot carry paths",
                )
            })?
            .pop_if_empty()
            .push(API_VERSION)
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<T, MitterError> {
        let response = self.send(request, operation).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| map_reqwest_error(operation, err))?;
        serde_json::from_slice(&body).map_err(|err| {
            MitterError::new(
                MitterErrorCategory::Serialization,
                "invalid_response_body",
                format!("{operation}: {err}"),
            )
        })
    }

    pub(crate) async fn send_empty(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<(), MitterError> {
        self.send(request, operation).await.map(|_| ())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<Response, MitterError> {
        trace!(operation, "sending request");
        let response = request
            .send()
            .await
            .map_err(|err| map_reqwest_error(operation, err))?;
        check_status(response, operation).await
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, MitterError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            MitterError::new(
                MitterErrorCategory::Config,
                "invalid_header",
                format!("invalid header name '{name}': {err}"),
            )
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            MitterError::new(
                MitterErrorCategory::Config,
                "invalid_header",
                format!("invalid value for header '{name}': {err}"),
            )
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

async fn check_status(response: Response, operation: &'static str) -> Result<Response, MitterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();

    let mut mapped = MitterError::new(
        classify_http_status(status.as_u16()),
        "http_status",
        format!("{operation} returned {status}: {body}"),
    );
    if let Some(delay) = retry_after {
        mapped = mapped.with_retry_after(delay);
    }
    debug!(operation, status = status.as_u16(), category = ?mapped.category, "request rejected");
    Err(mapped)
}

/// `Retry-After` in its delta-seconds form. HTTP dates are not honoured.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn map_reqwest_error(operation: &'static str, err: reqwest::Error) -> MitterError {
    if let Some(status) = err.status() {
        return MitterError::new(
            classify_http_status(status.as_u16()),
            "http_status",
            format!("{operation}: {err}"),
        );
    }

    let (category, code) = if err.is_decode() {
        (MitterErrorCategory::Serialization, "invalid_response_body")
    } else if err.is_builder() {
        (MitterErrorCategory::Config, "invalid_request")
    } else if err.is_timeout() {
        (MitterErrorCategory::Transport, "timeout")
    } else {
        (MitterErrorCategory::Transport, "transport_failure")
    };
    MitterError::new(category, code, format!("{operation}: {err}"))
}
