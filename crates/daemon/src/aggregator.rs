use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use printdash_core::{CombinedPayload, Snapshot, SourceKey};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, warn};

use crate::hub::{BroadcastReport, Hub};
use crate::sources::{
    MetricsError, MetricsSource, PrinterClient, PrinterStatus, SourceError, SourceResult,
};
use crate::weather_cache::WeatherCache;

/// The periodic fetch → merge → broadcast cycle.
pub struct Aggregator {
    printers: Vec<PrinterClient>,
    weather: Arc<WeatherCache>,
    system: Arc<dyn MetricsSource>,
    hub: Arc<Hub>,
    layout: Vec<SourceKey>,
    interval: Duration,
    source_deadline: Duration,
}

impl Aggregator {
    pub fn new(
        printers: Vec<PrinterClient>,
        weather: Arc<WeatherCache>,
        system: Arc<dyn MetricsSource>,
        hub: Arc<Hub>,
        interval: Duration,
        source_deadline: Duration,
    ) -> Self {
        let layout = SourceKey::layout(printers.iter().map(PrinterClient::name));
        Self {
            printers,
            weather,
            system,
            hub,
            layout,
            interval,
            source_deadline,
        }
    }

    /// Keys every payload from this aggregator carries.
    pub fn layout(&self) -> &[SourceKey] {
        &self.layout
    }

    /// Polls every source concurrently and merges the results.
    ///
    /// Remote failures degrade to their fallback snapshot. Only a local
    /// metrics failure fails the whole collection.
    pub async fn collect(&self) -> Result<CombinedPayload, MetricsError> {
        let printers = join_all(self.printers.iter().map(|p| self.poll_printer(p)));
        let weather = async {
            match timeout(self.source_deadline, self.weather.get()).await {
                Ok(snapshot) => snapshot,
                Err(_) => {
                    warn!(source = SourceKey::WEATHER, deadline = ?self.source_deadline, "source deadline exceeded");
                    Snapshot::error_marker()
                }
            }
        };

        let (printer_entries, weather, system) =
            tokio::join!(printers, weather, self.system.read());
        let system = system?;

        let mut entries: Vec<(SourceKey, Snapshot)> =
            printer_entries.into_iter().flatten().collect();
        entries.push((SourceKey::weather(), weather));
        entries.push((SourceKey::system(), system));

        Ok(CombinedPayload::assemble(&self.layout, entries))
    }

    async fn poll_printer(&self, printer: &PrinterClient) -> [(SourceKey, Snapshot); 2] {
        let status = match timeout(self.source_deadline, printer.fetch_status()).await {
            Ok(status) => status,
            Err(_) => PrinterStatus {
                state: Err(SourceError::Timeout(self.source_deadline)),
                job: Err(SourceError::Timeout(self.source_deadline)),
            },
        };

        let state_key = SourceKey::printer_state(printer.name());
        let job_key = SourceKey::printer_job(printer.name());
        let state = or_empty(&state_key, status.state);
        let job = or_empty(&job_key, status.job);
        [(state_key, state), (job_key, job)]
    }

    /// One full cycle without the trailing sleep.
    pub async fn tick(&self) -> Result<BroadcastReport, MetricsError> {
        let payload = self.collect().await?;
        Ok(self.hub.broadcast(payload).await)
    }

    /// Runs cycles forever, sleeping `interval` after each one.
    pub async fn run(&self) {
        loop {
            let started = Instant::now();
            match self.tick().await {
                Ok(report) => debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    delivered = report.delivered,
                    skipped = report.skipped,
                    dropped = report.dropped,
                    "cycle complete"
                ),
                Err(e) => error!(error = %e, "cycle skipped: host metrics unavailable"),
            }
            sleep(self.interval).await;
        }
    }
}

fn or_empty(key: &SourceKey, result: SourceResult<Snapshot>) -> Snapshot {
    match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(source = %key, error = %e, "source fetch failed");
            Snapshot::new()
        }
    }
}

/// Starts the aggregation loop on its own task.
pub fn spawn_aggregator(aggregator: Arc<Aggregator>) -> JoinHandle<()> {
    tokio::spawn(async move { aggregator.run().await })
}
