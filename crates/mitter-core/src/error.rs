use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for caller-side handling and retry decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MitterErrorCategory {
    /// Network or HTTP failure reported by a fetch gateway. Retryable.
    Transport,
    /// Authentication/authorization failure.
    Auth,
    /// Rate-limited by the platform. Retryable.
    RateLimited,
    /// Invalid input or unsupported request.
    Config,
    /// Serialization/deserialization failure, including malformed pages.
    Serialization,
    /// A lazy proxy could not refresh its remote value; any cached value is intact.
    StaleProxyFetch,
    /// Internal SDK bug or invariant break.
    Internal,
}

/// Stable SDK error payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct MitterError {
    /// High-level error category.
    pub category: MitterErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional retry hint in milliseconds.
    pub retry_after_ms: Option<u64>,
}

impl MitterError {
    /// Construct a new error.
    pub fn new(
        category: MitterErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Attach a retry hint to the error.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(retry_after.as_millis() as u64);
        self
    }

    /// Transport failure raised by a fetch gateway.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(MitterErrorCategory::Transport, "transport_failure", message)
    }

    /// Re-file an arbitrary fetch failure as a stale proxy fetch, keeping code and hint.
    pub fn into_stale_proxy_fetch(self) -> Self {
        Self {
            category: MitterErrorCategory::StaleProxyFetch,
            message: format!("{:?}: {}", self.category, self.message),
            ..self
        }
    }

    /// Whether re-issuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category,
            MitterErrorCategory::Transport | MitterErrorCategory::RateLimited
        )
    }
}

/// Map HTTP status codes to error categories.
pub fn classify_http_status(status: u16) -> MitterErrorCategory {
    match status {
        401 | 403 => MitterErrorCategory::Auth,
        408 | 429 => MitterErrorCategory::RateLimited,
        400..=499 => MitterErrorCategory::Config,
        500..=599 => MitterErrorCategory::Transport,
        _ => MitterErrorCategory::Internal,
    }
}
