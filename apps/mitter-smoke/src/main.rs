//! Walks one channel's history against a live Mitter API and prints it.

mod config;
mod logging;

use std::process::ExitCode;

use mitter_core::{Direction, FetchMode, MitterError, PaginationState, RequestOutcome};
use mitter_http::MitterHttpClient;
use tracing::{error, info, warn};

use crate::config::SmokeConfig;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            eprintln!("Required: MITTER_CHANNEL_ID. Optional: MITTER_API_BASE_URL, MITTER_AUTH_HEADER.");
            return ExitCode::from(2);
        }
    };

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, channel_id = %config.channel_id, "smoke run failed");
            eprintln!("Smoke run failed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &SmokeConfig) -> Result<(), MitterError> {
    let http = MitterHttpClient::new(&config.api_config())?;
    let channel = http
        .channels()
        .channel_handle(config.channel_id.clone(), FetchMode::Eager);
    let manager = channel.messages(config.page_limit);

    let mut pages = 0;
    while pages < config.max_pages {
        match manager.request_more(Direction::Backward).await? {
            RequestOutcome::Fetched { report, exhausted } => {
                pages += 1;
                info!(
                    page = pages,
                    inserted = report.inserted,
                    total = manager.len(),
                    exhausted,
                    "loaded page"
                );
                if exhausted {
                    break;
                }
            }
            RequestOutcome::Skipped(reason) => {
                warn!(?reason, "page request skipped");
                break;
            }
            RequestOutcome::Discarded => break,
        }
    }
    if manager.state(Direction::Backward) != PaginationState::Exhausted {
        warn!(max_pages = config.max_pages, "stopped before reaching the start of history");
    }

    match channel.default_rule_set().await {
        Ok(rule_set) => info!(%rule_set, "channel rule set"),
        Err(err) => warn!(%err, "could not read channel aggregate"),
    }

    for message in manager.current_view() {
        println!(
            "{:>15} {} {}: {}",
            message.sent_time_ms(),
            message.message_id,
            message.sender_id,
            message.text_payload
        );
    }
    println!("{} messages in {} pages", manager.len(), pages);
    Ok(())
}
