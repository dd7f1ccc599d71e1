#![forbid(unsafe_code)]

//! printdash daemon entry point.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use printdash_daemon::{aggregator::spawn_aggregator, config::Config, Dashboard};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "printdash", version, about = "Printer, weather and host dashboard backend")]
struct Args {
    /// Path to a printdash.toml. Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8100. Overrides the config file.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,

    /// Print the effective configuration as TOML and exit.
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&args.log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut cfg = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        cfg.listen = listen;
    }

    if args.print_config {
        print!("{}", cfg.to_toml()?);
        return Ok(());
    }

    if cfg.weather.api_key.is_empty() {
        tracing::warn!("weather.api_key is empty; weather will report errors");
    }

    let dashboard = Dashboard::from_config(&cfg)?;
    let loop_handle = spawn_aggregator(dashboard.aggregator.clone());
    let app = dashboard.router();

    tracing::info!(
        listen = %cfg.listen,
        printers = cfg.printers.len(),
        tick_ms = cfg.tick_interval_ms,
        "printdash starting"
    );
    axum::serve(tokio::net::TcpListener::bind(cfg.listen).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    loop_handle.abort();
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown requested");
}
