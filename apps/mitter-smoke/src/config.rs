//! Environment-backed configuration for `mitter-smoke`.

use std::{env, error::Error, fmt, time::Duration};

use mitter_core::MAX_MESSAGE_LIST_LENGTH;
use mitter_http::{DEFAULT_API_BASE_URL, MitterApiConfig};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_PAGES: u32 = 20;

/// Settings for one smoke run against a live API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    pub api_base_url: String,
    /// Channel whose history is walked.
    pub channel_id: String,
    pub page_limit: u16,
    pub request_timeout_ms: u64,
    /// Extra header sent with every request, typically an access token.
    pub auth_header: Option<(String, String)>,
    /// Upper bound on pages fetched before giving up on exhausting history.
    pub max_pages: u32,
}

impl SmokeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let api_base_url = optional_trimmed_env("MITTER_API_BASE_URL", &mut lookup)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        let channel_id = optional_trimmed_env("MITTER_CHANNEL_ID", &mut lookup).ok_or(
            ConfigError::Missing {
                key: "MITTER_CHANNEL_ID",
            },
        )?;

        let page_limit = parse_or_default::<u16, _>(
            "MITTER_PAGE_LIMIT",
            MAX_MESSAGE_LIST_LENGTH,
            &mut lookup,
        )?;
        if !(1..=MAX_MESSAGE_LIST_LENGTH).contains(&page_limit) {
            return Err(ConfigError::InvalidValue {
                key: "MITTER_PAGE_LIMIT",
                value: page_limit.to_string(),
                reason: format!("must be between 1 and {MAX_MESSAGE_LIST_LENGTH}"),
            });
        }

        let request_timeout_ms = parse_or_default::<u64, _>(
            "MITTER_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
            &mut lookup,
        )?;
        if request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MITTER_REQUEST_TIMEOUT_MS",
                value: "0".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }

        let auth_header = optional_trimmed_env("MITTER_AUTH_HEADER", &mut lookup)
            .map(|raw| parse_header("MITTER_AUTH_HEADER", raw))
            .transpose()?;
        let max_pages = parse_or_default::<u32, _>("MITTER_MAX_PAGES", DEFAULT_MAX_PAGES, &mut lookup)?;

        Ok(Self {
            api_base_url,
            channel_id,
            page_limit,
            request_timeout_ms,
            auth_header,
            max_pages,
        })
    }

    pub fn api_config(&self) -> MitterApiConfig {
        let config = MitterApiConfig::new(self.api_base_url.clone())
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms));
        match &self.auth_header {
            Some((name, value)) => config.with_header(name.clone(), value.clone()),
            None => config,
        }
    }
}

/// Errors produced while parsing smoke configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    Missing { key: &'static str },
    /// A variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { key } => write!(f, "{key} must be set"),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_or_default<T, F>(key: &'static str, default: T, lookup: &mut F) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value
        .parse::<T>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

/// `Name: value` header syntax.
fn parse_header(key: &'static str, raw: String) -> Result<(String, String), ConfigError> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
            Ok((name.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw,
            reason: "expected 'Header-Name: value'".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<SmokeConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        SmokeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn applies_defaults_around_required_channel() {
        let cfg = config_from_pairs(&[("MITTER_CHANNEL_ID", " chan-1 ")])
            .expect("config should parse");

        assert_eq!(cfg.channel_id, "chan-1");
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.page_limit, MAX_MESSAGE_LIST_LENGTH);
        assert_eq!(cfg.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert_eq!(cfg.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(cfg.auth_header, None);
    }

    #[test]
    fn channel_is_required() {
        let err = config_from_pairs(&[("MITTER_CHANNEL_ID", "   ")])
            .expect_err("blank channel should fail");
        assert_eq!(
            err,
            ConfigError::Missing {
                key: "MITTER_CHANNEL_ID"
            }
        );
    }

    #[test]
    fn parses_overrides_and_auth_header() {
        let cfg = config_from_pairs(&[
            ("MITTER_CHANNEL_ID", "chan-1"),
            ("MITTER_API_BASE_URL", "http://localhost:8080"),
            ("MITTER_PAGE_LIMIT", "10"),
            ("MITTER_REQUEST_TIMEOUT_MS", "1500"),
            ("MITTER_AUTH_HEADER", "X-Issued-Mitter-User-Authorization: tok:en"),
            ("MITTER_MAX_PAGES", "3"),
        ])
        .expect("config should parse");

        assert_eq!(cfg.page_limit, 10);
        assert_eq!(cfg.max_pages, 3);
        assert_eq!(
            cfg.auth_header,
            Some((
                "X-Issued-Mitter-User-Authorization".to_owned(),
                "tok:en".to_owned()
            ))
        );

        let api = cfg.api_config();
        assert_eq!(api.base_url, "http://localhost:8080");
        assert_eq!(api.request_timeout, Duration::from_millis(1_500));
        assert_eq!(api.default_headers.len(), 1);
    }

    #[test]
    fn rejects_out_of_range_page_limit() {
        for raw in ["0", "51"] {
            let err = config_from_pairs(&[("MITTER_CHANNEL_ID", "c"), ("MITTER_PAGE_LIMIT", raw)])
                .expect_err("limit outside platform range should fail");
            assert!(matches!(
                err,
                ConfigError::InvalidValue {
                    key: "MITTER_PAGE_LIMIT",
                    ..
                }
            ));
        }
    }

    #[test]
    fn rejects_invalid_numeric_and_header_values() {
        let err = config_from_pairs(&[
            ("MITTER_CHANNEL_ID", "c"),
            ("MITTER_REQUEST_TIMEOUT_MS", "soon"),
        ])
        .expect_err("non-numeric timeout should fail");
        assert!(err.to_string().starts_with("invalid MITTER_REQUEST_TIMEOUT_MS='soon'"));

        let err = config_from_pairs(&[("MITTER_CHANNEL_ID", "c"), ("MITTER_AUTH_HEADER", "token")])
            .expect_err("header without a name should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "MITTER_AUTH_HEADER",
                ..
            }
        ));
    }
}
