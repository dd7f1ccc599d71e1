use std::sync::Arc;
use std::time::Duration;

use printdash_core::Snapshot;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::sources::WeatherFetcher;

struct CacheEntry {
    snapshot: Snapshot,
    fetched_at: Instant,
}

/// TTL cache in front of the rate-limited weather service.
///
/// The entry lock is held across a refresh, so concurrent callers wait for
/// the in-flight fetch instead of issuing their own (single-flight). A
/// refresh either replaces the whole entry or leaves it as it was.
pub struct WeatherCache {
    fetcher: Arc<dyn WeatherFetcher>,
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
}

impl WeatherCache {
    pub fn new(fetcher: Arc<dyn WeatherFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached snapshot while it is younger than the TTL,
    /// otherwise attempts exactly one refresh.
    ///
    /// A failed refresh returns the previous entry when there is one and the
    /// error marker when there is not.
    pub async fn get(&self) -> Snapshot {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.snapshot.clone();
            }
        }

        match self.fetcher.fetch().await {
            Ok(snapshot) => {
                tracing::debug!(fields = snapshot.len(), "weather refreshed");
                *entry = Some(CacheEntry {
                    snapshot: snapshot.clone(),
                    fetched_at: Instant::now(),
                });
                snapshot
            }
            Err(e) => match entry.as_ref() {
                Some(stale) => {
                    tracing::warn!(error = %e, "weather refresh failed; serving previous entry");
                    stale.snapshot.clone()
                }
                None => {
                    tracing::warn!(error = %e, "weather refresh failed; no cached entry");
                    Snapshot::error_marker()
                }
            },
        }
    }
}
