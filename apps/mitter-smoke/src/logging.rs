//! Tracing bootstrap for the smoke binary.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,mitter_smoke=debug,mitter_core=debug,mitter_http=debug";

/// Filter variables consulted after `RUST_LOG`, most specific first.
const FALLBACK_FILTER_VARS: [&str; 2] = ["MITTER_SMOKE_LOG", "MITTER_LOG"];

/// Install the global subscriber.
///
/// Precedence: `RUST_LOG`, then `MITTER_SMOKE_LOG`, then `MITTER_LOG`, then
/// the built-in default. Unparseable values fall through to the next source.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter_from_lookup(|key| env::var(key).ok()));
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_env_filter(env_filter)
        .try_init();
}

fn filter_from_lookup<F>(mut lookup: F) -> EnvFilter
where
    F: FnMut(&str) -> Option<String>,
{
    FALLBACK_FILTER_VARS
        .iter()
        .filter_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        .find_map(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
