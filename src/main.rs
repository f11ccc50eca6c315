//! schoolbus-planner - plan school bus routes from the command line
//!
//! Reads requests as JSON, writes responses as JSON on stdout. Logs go to
//! stderr and, when LOGS_DIR is set, to a daily-rotated file.

mod cli;

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schoolbus_planner::types::OptimizeRequest;
use schoolbus_planner::{Config, PlanError, Planner};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if present, before LOGS_DIR is read
    dotenvy::dotenv().ok();
    let guard = init_logging(std::env::var("LOGS_DIR").ok().as_deref());

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let planner = Planner::from_config(&config)?;

    let outcome = match cli.command {
        Command::Optimize { input, pretty } => {
            let body = match input {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut body = String::new();
                    std::io::stdin()
                        .read_to_string(&mut body)
                        .context("Failed to read request from stdin")?;
                    body
                }
            };
            match serde_json::from_str::<OptimizeRequest>(&body) {
                Ok(request) => planner
                    .optimize(request)
                    .await
                    .map(|response| render(&response, pretty)),
                Err(e) => Err(PlanError::Validation(format!("Invalid request JSON: {}", e))),
            }
        }
        Command::Resolve { text } => planner
            .resolve(&text)
            .await
            .map(|coords| render(&json!({"lat": coords.lat, "lng": coords.lng}), false)),
        Command::Expand { url } => planner
            .expand(&url)
            .await
            .map(|long_url| render(&json!({"url": long_url}), false)),
    };

    match outcome {
        Ok(output) => {
            println!("{}", output?);
            Ok(())
        }
        Err(e) => {
            error!("Request failed ({}): {}", e.status_code(), e);
            println!("{}", json!({"error": e.to_string()}));
            drop(guard);
            std::process::exit(if e.status_code() >= 500 { 2 } else { 1 });
        }
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

/// stderr always; a daily-rotated file too when `logs_dir` is set
fn init_logging(logs_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,schoolbus_planner=debug".into()),
    );
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match logs_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "planner.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}
