//! Kidroute Worker - route capacity and assignment engine
//!
//! This worker connects to NATS and handles planner messages from the dispatch frontend.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kidroute_worker::config::Config;
use kidroute_worker::handlers;
use kidroute_worker::services::auto_match::suggest_for_pool;
use kidroute_worker::services::backend::create_backend_with_fallback;
use kidroute_worker::services::session::load_day;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // LOG_FORMAT=json switches stdout to one JSON object per line
    let json_stdout = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,kidroute_worker=debug".into()),
        ))
        .with((!json_stdout).then(|| tracing_subscriber::fmt::layer())) // stdout
        .with(json_stdout.then(|| tracing_subscriber::fmt::layer().json())) // stdout, json
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    info!("Starting Kidroute Worker...");

    let config = Config::from_env()?;
    info!("Configuration loaded");

    match cli.command {
        Some(Command::Suggest { date }) => suggest(&config, date).await,
        Some(Command::Serve) | None => serve(&config).await,
    }
}

async fn serve(config: &Config) -> Result<()> {
    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth)
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    if let Err(e) = handlers::start_handlers(nats_client, config).await {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// One-shot auto-match over a day's pool, logged and then exit
async fn suggest(config: &Config, date: chrono::NaiveDate) -> Result<()> {
    let backend = create_backend_with_fallback(config.backend());
    let snapshot = load_day(backend.as_ref(), date).await?;
    info!(
        "Loaded {} unassigned schedules and {} routes for {} from {}",
        snapshot.pool.len(),
        snapshot.routes.len(),
        date,
        backend.name()
    );

    let match_config = config.match_config();
    for entry in suggest_for_pool(&snapshot.pool, &snapshot.routes, &match_config) {
        match entry.suggestion {
            Some(s) => info!(
                "{}: {} ({:.0} points, {:?}) - {}",
                entry.child_name,
                s.route_name,
                s.score,
                s.confidence,
                s.reasons.join("; ")
            ),
            None => warn!("{}: no route above the acceptance floor", entry.child_name),
        }
    }

    Ok(())
}
