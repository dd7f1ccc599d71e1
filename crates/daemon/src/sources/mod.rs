//! Upstream adapters. Each one turns a remote or local reading into a
//! [`Snapshot`](printdash_core::Snapshot) or a typed failure.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod printer;
pub mod system;
pub mod weather;

pub use printer::{PrinterClient, PrinterStatus};
pub use system::{MetricsError, MetricsSource, SystemMetrics};
pub use weather::{OpenWeatherFetcher, WeatherFetcher};

/// Why an upstream read produced no snapshot.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream unreachable: {0}")]
    Transport(String),
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
    #[error("upstream returned status {0}")]
    Status(StatusCode),
    #[error("malformed upstream response: {0}")]
    Decode(String),
}

impl SourceError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status)
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Sends `req` with `timeout` and decodes a JSON body on a success status.
pub(crate) async fn get_json<T: DeserializeOwned>(
    req: RequestBuilder,
    timeout: Duration,
) -> SourceResult<T> {
    let resp = req
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| SourceError::from_reqwest(e, timeout))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status(status));
    }
    resp.json::<T>()
        .await
        .map_err(|e| SourceError::from_reqwest(e, timeout))
}
