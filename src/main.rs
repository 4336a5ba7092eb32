//! httpprobe - synthetic HTTP probing tool
//!
//! Drives a single check against the in-process engine: prepare, start, poll
//! status once per second while printing metrics, then stop and render the
//! verdict. Exit code 1 signals a failed verdict.

use anyhow::Result;
use clap::Parser;
use uuid::Uuid;

use httpprobe_core::prelude::*;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .init();

    let (kind, config) = args.into_check()?;
    let duration = std::time::Duration::from_millis(config.duration);

    let service = ProbeService::new();
    let execution_id = Uuid::new_v4();

    if let Err(e) = service.prepare(execution_id, kind, &config) {
        anyhow::bail!("prepare failed: {e}");
    }
    service.start(execution_id)?;
    tracing::info!(%execution_id, "check started");

    let deadline = tokio::time::Instant::now() + duration;
    let mut poll = tokio::time::interval(std::time::Duration::from_secs(1));
    poll.tick().await;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = poll.tick() => {
                let report = service.status(execution_id).await?;
                print_metrics(&report.metrics)?;
                if report.completed {
                    break;
                }
            }
        }
    }

    let report = service.stop(execution_id).await?;
    print_metrics(&report.metrics)?;

    match report.error {
        None => {
            tracing::info!("check passed");
            Ok(())
        }
        Some(failure) => {
            eprintln!("{}", failure.title);
            std::process::exit(1);
        }
    }
}

fn print_metrics(metrics: &[Metric]) -> Result<()> {
    for metric in metrics {
        println!("{}", serde_json::to_string(metric)?);
    }
    Ok(())
}
