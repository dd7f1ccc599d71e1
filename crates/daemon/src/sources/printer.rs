use std::time::Duration;

use printdash_core::Snapshot;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::PrinterConfig;

use super::{get_json, SourceError, SourceResult};

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const STATE_PATH: &str = "/api/printer";
pub const JOB_PATH: &str = "/api/job";
pub const PRINTHEAD_PATH: &str = "/api/printer/printhead";

/// Both reads of one printer for one tick. Each side fails independently.
#[derive(Debug)]
pub struct PrinterStatus {
    pub state: SourceResult<Snapshot>,
    pub job: SourceResult<Snapshot>,
}

/// HTTP client bound to one OctoPrint-compatible printer controller.
#[derive(Clone, Debug)]
pub struct PrinterClient {
    name: String,
    base_url: String,
    api_key: String,
    timeout: Duration,
    http: Client,
}

impl PrinterClient {
    pub fn new(http: Client, cfg: &PrinterConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout(),
            http,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads machine state and job state concurrently.
    pub async fn fetch_status(&self) -> PrinterStatus {
        let (state, job) = tokio::join!(self.read(STATE_PATH), self.read(JOB_PATH));
        PrinterStatus { state, job }
    }

    async fn read(&self, path: &str) -> SourceResult<Snapshot> {
        let req = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(API_KEY_HEADER, &self.api_key);
        let body: Value = get_json(req, self.timeout).await?;
        if !body.is_object() {
            return Err(SourceError::Decode(format!(
                "{path}: expected a JSON object"
            )));
        }
        Ok(Snapshot::from_json(&body))
    }

    /// Posts a JSON command body and returns the upstream status.
    pub async fn post_command<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<StatusCode, reqwest::Error> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        Ok(resp.status())
    }
}
