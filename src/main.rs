use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

mod clock;
mod config;
mod datadog;
mod endpoint;
mod error;
mod metrics;
mod redis_client;
mod shipper;
mod slowlog;

use crate::config::Config;
use crate::datadog::DatadogClient;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::shipper::Shipper;

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::parse();
    info!(?config, "starting slowlog shipper");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "slowlog shipping failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    // ── 1. Resolve the cache endpoint ────────────────────────────
    let endpoint = Endpoint::resolve(
        &config.redis_host,
        config.endpoint_overrides(),
        config.environment_defaults(),
    )?;
    info!(
        endpoint = %endpoint,
        tls = endpoint.tls,
        cluster = endpoint.cluster,
        "resolved cache endpoint"
    );

    // ── 2. Metrics backend ───────────────────────────────────────
    let backend = DatadogClient::new(
        config.datadog_api_url.as_str(),
        config.datadog_api_key.as_str(),
        config.datadog_app_key.as_str(),
        config.datadog_timeout(),
    )?;

    // ── 3. Connect to the cache ──────────────────────────────────
    let mut cache = redis_client::connect(
        &endpoint,
        config.redis_connect_timeout(),
        config.redis_command_timeout(),
    )
    .await?;

    // ── 4. Ship ──────────────────────────────────────────────────
    let mut shipper = Shipper::new(
        backend,
        endpoint.replication_group.clone(),
        config.shipper_settings(),
        Arc::new(clock::SystemClock),
    );

    let Some(period) = config.repeat_every() else {
        shipper.ship(&mut cache).await?;
        return Ok(());
    };

    info!(?period, "shipping on a schedule");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // The next tick resumes from whatever the backend confirmed.
                if let Err(e) = shipper.ship(&mut cache).await {
                    warn!(error = %e, "slowlog shipping failed, retrying next tick");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}
