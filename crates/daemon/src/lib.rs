#![forbid(unsafe_code)]

//! printdash daemon: polls printers, weather and host metrics and pushes a
//! combined snapshot to every connected viewer.

pub mod aggregator;
pub mod config;
pub mod gateway;
pub mod http;
pub mod hub;
pub mod sources;
pub mod weather_cache;

use std::sync::Arc;

use anyhow::Context;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::gateway::CommandGateway;
use crate::hub::Hub;
use crate::sources::{OpenWeatherFetcher, PrinterClient, SystemMetrics};
use crate::weather_cache::WeatherCache;

/// Fully wired daemon components.
pub struct Dashboard {
    pub aggregator: Arc<Aggregator>,
    pub hub: Arc<Hub>,
    pub gateway: CommandGateway,
}

impl Dashboard {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        cfg.validate().context("invalid configuration")?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("printdash/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;

        let printers: Vec<PrinterClient> = cfg
            .printers
            .iter()
            .map(|p| PrinterClient::new(http.clone(), p))
            .collect();
        let weather = Arc::new(WeatherCache::new(
            Arc::new(OpenWeatherFetcher::new(http, &cfg.weather)),
            cfg.weather.ttl(),
        ));
        let hub = Arc::new(Hub::new(cfg.hub.subscriber_buffer));
        let aggregator = Arc::new(Aggregator::new(
            printers.clone(),
            weather,
            Arc::new(SystemMetrics::new(&cfg.system)),
            Arc::clone(&hub),
            cfg.tick_interval(),
            cfg.cycle_timeout(),
        ));
        let gateway = CommandGateway::new(printers, &cfg.commands);

        Ok(Self {
            aggregator,
            hub,
            gateway,
        })
    }

    pub fn router(&self) -> axum::Router {
        http::router(Arc::clone(&self.hub), self.gateway.clone())
    }
}
