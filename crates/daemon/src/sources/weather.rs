use std::time::Duration;

use async_trait::async_trait;
use printdash_core::Snapshot;
use reqwest::Client;
use serde::Deserialize;

use crate::config::WeatherConfig;

use super::{get_json, SourceError, SourceResult};

/// Fetches one fresh weather snapshot, all or nothing.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    async fn fetch(&self) -> SourceResult<Snapshot>;
}

/// OpenWeatherMap client: current conditions, forecast and air quality.
#[derive(Clone, Debug)]
pub struct OpenWeatherFetcher {
    http: Client,
    base_url: String,
    api_key: String,
    latitude: f64,
    longitude: f64,
    units: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Current {
    main: CurrentMain,
    wind: Wind,
    clouds: Clouds,
    #[serde(default)]
    visibility: Option<f64>,
    sys: Sun,
}

#[derive(Debug, Deserialize)]
struct CurrentMain {
    temp: f64,
    feels_like: f64,
    humidity: i64,
    pressure: i64,
    temp_max: f64,
    temp_min: f64,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct Clouds {
    all: i64,
}

#[derive(Debug, Deserialize)]
struct Sun {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Forecast {
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AirQuality {
    list: Vec<AirEntry>,
}

#[derive(Debug, Deserialize)]
struct AirEntry {
    main: AirMain,
    components: AirComponents,
}

#[derive(Debug, Deserialize)]
struct AirMain {
    aqi: i64,
}

#[derive(Debug, Deserialize)]
struct AirComponents {
    pm2_5: f64,
}

impl OpenWeatherFetcher {
    pub fn new(http: Client, cfg: &WeatherConfig) -> Self {
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            latitude: cfg.latitude,
            longitude: cfg.longitude,
            units: cfg.units.clone(),
            timeout: cfg.timeout(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        with_units: bool,
    ) -> SourceResult<T> {
        let mut query: Vec<(&str, String)> = vec![
            ("lat", self.latitude.to_string()),
            ("lon", self.longitude.to_string()),
            ("appid", self.api_key.clone()),
        ];
        if with_units {
            query.push(("units", self.units.clone()));
        }
        let req = self
            .http
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(&query);
        get_json(req, self.timeout).await
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherFetcher {
    async fn fetch(&self) -> SourceResult<Snapshot> {
        let (current, forecast, air) = tokio::try_join!(
            self.call::<Current>("weather", true),
            self.call::<Forecast>("forecast", true),
            self.call::<AirQuality>("air_pollution", false),
        )?;
        build_snapshot(&current, &forecast, &air)
    }
}

/// Flattens the three responses into the dashboard's weather fields.
pub(crate) fn build_snapshot(
    current: &Current,
    forecast: &Forecast,
    air: &AirQuality,
) -> SourceResult<Snapshot> {
    let next_hour = forecast
        .list
        .first()
        .ok_or_else(|| SourceError::Decode("forecast list is empty".into()))?;
    let aq = air
        .list
        .first()
        .ok_or_else(|| SourceError::Decode("air quality list is empty".into()))?;

    Ok(Snapshot::new()
        .with("temp", current.main.temp)
        .with("feels", current.main.feels_like)
        .with("humidity", current.main.humidity)
        .with("pressure", current.main.pressure)
        .with("wind", current.wind.speed)
        .with("clouds", current.clouds.all)
        .with("visibility", current.visibility.unwrap_or(0.0) / 1000.0)
        .with("temp_max", current.main.temp_max)
        .with("temp_min", current.main.temp_min)
        .with("rain_prob", next_hour.pop.unwrap_or(0.0) * 100.0)
        .with("sunrise", current.sys.sunrise)
        .with("sunset", current.sys.sunset)
        .with("aqi", aq.main.aqi)
        .with("pm25", aq.components.pm2_5))
}
