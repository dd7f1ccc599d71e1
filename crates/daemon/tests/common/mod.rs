//! In-process fakes for the upstream services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use printdash_core::Snapshot;
use printdash_daemon::config::PrinterConfig;
use printdash_daemon::sources::{MetricsError, MetricsSource, PrinterClient};
use serde_json::{json, Value};

pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone, Copy)]
pub enum JobBehaviour {
    Ok,
    Hang,
    Fail,
}

#[derive(Clone)]
struct PrinterState {
    job: JobBehaviour,
    head_status: StatusCode,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// A fake OctoPrint controller.
pub struct MockPrinter {
    pub url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockPrinter {
    pub async fn start(job: JobBehaviour, head_status: StatusCode) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = PrinterState {
            job,
            head_status,
            calls: Arc::clone(&calls),
        };
        let app = Router::new()
            .route("/api/printer", get(printer_state))
            .route("/api/job", get(job_state).post(job_command))
            .route("/api/printer/printhead", axum::routing::post(head_command))
            .with_state(state);
        let addr = serve(app).await;
        Self {
            url: format!("http://{addr}"),
            calls,
        }
    }

    pub fn commands(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn client(&self, name: &str, key: &str, timeout_ms: u64) -> PrinterClient {
        printer_client(name, &self.url, key, timeout_ms)
    }
}

pub fn printer_client(name: &str, url: &str, key: &str, timeout_ms: u64) -> PrinterClient {
    PrinterClient::new(
        reqwest::Client::new(),
        &PrinterConfig {
            name: name.into(),
            url: url.into(),
            api_key: key.into(),
            timeout_ms,
        },
    )
}

async fn printer_state() -> Json<Value> {
    Json(json!({
        "state": { "text": "Printing", "flags": { "printing": true, "paused": false } },
        "temperature": {
            "bed": { "actual": 59.8, "target": 60 },
            "tool0": { "actual": 214.6, "target": 215 }
        }
    }))
}

async fn job_state(State(st): State<PrinterState>) -> Response {
    match st.job {
        JobBehaviour::Ok => Json(json!({
            "job": { "file": { "name": "benchy.gcode" } },
            "progress": { "completion": 42.5, "printTimeLeft": 3600 },
            "state": "Printing"
        }))
        .into_response(),
        JobBehaviour::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::OK.into_response()
        }
        JobBehaviour::Fail => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn record(st: &PrinterState, path: &str, headers: &HeaderMap, body: Value) {
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    st.calls.lock().unwrap().push(RecordedCall {
        path: path.to_string(),
        api_key,
        body,
    });
}

async fn job_command(
    State(st): State<PrinterState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    record(&st, "/api/job", &headers, body);
    StatusCode::NO_CONTENT
}

async fn head_command(
    State(st): State<PrinterState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    record(&st, "/api/printer/printhead", &headers, body);
    st.head_status
}

/// A fake OpenWeatherMap with per-endpoint hit counters.
pub struct MockWeather {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    last_query: Arc<Mutex<HashMap<String, String>>>,
}

#[derive(Clone)]
struct WeatherState {
    hits: Arc<AtomicUsize>,
    last_query: Arc<Mutex<HashMap<String, String>>>,
}

impl MockWeather {
    pub async fn start() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let last_query = Arc::new(Mutex::new(HashMap::new()));
        let state = WeatherState {
            hits: Arc::clone(&hits),
            last_query: Arc::clone(&last_query),
        };
        let app = Router::new()
            .route("/weather", get(current))
            .route("/forecast", get(forecast))
            .route("/air_pollution", get(air))
            .with_state(state);
        let addr = serve(app).await;
        Self {
            base_url: format!("http://{addr}"),
            hits,
            last_query,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> HashMap<String, String> {
        self.last_query.lock().unwrap().clone()
    }
}

fn note(st: &WeatherState, q: HashMap<String, String>) {
    st.hits.fetch_add(1, Ordering::SeqCst);
    *st.last_query.lock().unwrap() = q;
}

async fn current(
    State(st): State<WeatherState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    note(&st, q);
    Json(json!({
        "main": {
            "temp": 18.2, "feels_like": 17.9, "humidity": 64, "pressure": 1016,
            "temp_max": 19.0, "temp_min": 16.4
        },
        "wind": { "speed": 3.1 },
        "clouds": { "all": 20 },
        "visibility": 8000,
        "sys": { "sunrise": 1718000000, "sunset": 1718050000 }
    }))
}

async fn forecast(
    State(st): State<WeatherState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    note(&st, q);
    Json(json!({ "list": [ { "pop": 0.2 } ] }))
}

async fn air(
    State(st): State<WeatherState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    note(&st, q);
    Json(json!({ "list": [ { "main": { "aqi": 1 }, "components": { "pm2_5": 2.5 } } ] }))
}

/// Host metrics with a fixed reading.
pub struct FixedMetrics;

#[async_trait]
impl MetricsSource for FixedMetrics {
    async fn read(&self) -> Result<Snapshot, MetricsError> {
        Ok(Snapshot::new().with("cpu", 12.5).with("uptime", 3600u64))
    }
}

/// Host metrics that always fail.
pub struct BrokenMetrics;

#[async_trait]
impl MetricsSource for BrokenMetrics {
    async fn read(&self) -> Result<Snapshot, MetricsError> {
        Err(MetricsError::MountNotFound("/missing".into()))
    }
}

/// An address nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
