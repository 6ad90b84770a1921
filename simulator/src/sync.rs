use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, warn};

use crate::telemetry::{MinMaxRecord, SystemStatus, WeatherRecord};

#[derive(Debug, Deserialize)]
struct Watermark {
    ts: String,
}

#[derive(Debug, Deserialize)]
struct History<T> {
    #[serde(default = "Vec::new")]
    history: Vec<T>,
}

#[derive(Debug, Serialize)]
struct BatchUpload<'a, T> {
    id: &'a str,
    data: &'a [T],
}

#[derive(Debug, Serialize)]
struct StatusUpload<'a> {
    id: &'a str,
    ts: &'a str,
    #[serde(flatten)]
    status: SystemStatus,
}

/// HTTP client for the station API. No retries: a failed call is logged
/// and reported to the caller.
#[derive(Debug, Clone)]
pub struct ServerClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Timestamp of the newest sample the server holds for `station_id`
    pub async fn last_update(&self, station_id: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url(&format!("lastupdate/{}/", station_id)))
            .send()
            .await
            .context("requesting last update")?;
        if response.status() != StatusCode::OK {
            bail!("last update request failed: HTTP {}", response.status());
        }
        Ok(response.json::<Watermark>().await?.ts)
    }

    /// Fetches a `{history: [...]}` listing; failures yield an empty list.
    async fn fetch_history<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        station_id: &str,
    ) -> Vec<T> {
        let url = self.url(&format!("{}/{}/", endpoint, station_id));
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Error fetching {}: {}", endpoint, e);
                return Vec::new();
            }
        };
        if response.status() != StatusCode::OK {
            warn!(
                "Failed to fetch {} for {}: HTTP {}",
                endpoint,
                station_id,
                response.status()
            );
            return Vec::new();
        }
        match response.json::<History<T>>().await {
            Ok(body) => body.history,
            Err(e) => {
                warn!("Unexpected {} payload: {}", endpoint, e);
                Vec::new()
            }
        }
    }

    pub async fn weather_history(&self, station_id: &str) -> Vec<WeatherRecord> {
        self.fetch_history("history", station_id).await
    }

    pub async fn minmax_history(&self, station_id: &str) -> Vec<MinMaxRecord> {
        self.fetch_history("minmax/history", station_id).await
    }

    async fn put<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<StatusCode> {
        let response = self
            .http
            .put(self.url(endpoint))
            .json(payload)
            .send()
            .await
            .with_context(|| format!("uploading {}", endpoint))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        info!("{} upload response: HTTP {} {}", endpoint, status, body);
        Ok(status)
    }

    pub async fn upload_weather(
        &self,
        station_id: &str,
        data: &[WeatherRecord],
    ) -> Result<StatusCode> {
        self.put("weather/upload/", &BatchUpload { id: station_id, data })
            .await
    }

    pub async fn upload_minmax(
        &self,
        station_id: &str,
        data: &[MinMaxRecord],
    ) -> Result<StatusCode> {
        self.put("minmax/upload/", &BatchUpload { id: station_id, data })
            .await
    }

    pub async fn upload_status(
        &self,
        station_id: &str,
        ts: &str,
        status: SystemStatus,
    ) -> Result<StatusCode> {
        self.put(
            "status/upload/",
            &StatusUpload {
                id: station_id,
                ts,
                status,
            },
        )
        .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub watermark: String,
    pub weather_records: usize,
    pub minmax_records: usize,
    pub status_uploaded: bool,
}

impl SyncReport {
    pub fn synced_anything(&self) -> bool {
        self.weather_records > 0 || self.minmax_records > 0
    }
}

/// Pulls the station's recent history from the server and pushes it back,
/// followed by the current status (when one is known for the station).
pub async fn sync_station(
    client: &ServerClient,
    station_id: &str,
    status: Option<(String, SystemStatus)>,
) -> Result<SyncReport> {
    let watermark = client.last_update(station_id).await?;
    info!("Server watermark for {}: {}", station_id, watermark);

    let weather: Vec<WeatherRecord> = client.weather_history(station_id).await;
    let minmax: Vec<MinMaxRecord> = client.minmax_history(station_id).await;

    if !weather.is_empty() {
        accepted(client.upload_weather(station_id, &weather).await, "weather");
    }
    if !minmax.is_empty() {
        accepted(client.upload_minmax(station_id, &minmax).await, "minmax");
    }

    let status_uploaded = match status {
        Some((ts, status)) => accepted(
            client.upload_status(station_id, &ts, status).await,
            "status",
        ),
        None => false,
    };

    Ok(SyncReport {
        watermark,
        weather_records: weather.len(),
        minmax_records: minmax.len(),
        status_uploaded,
    })
}

fn accepted(result: Result<StatusCode>, what: &str) -> bool {
    match result {
        Ok(code) if code.is_success() => true,
        Ok(code) => {
            warn!("{} upload rejected: HTTP {}", what, code);
            false
        }
        Err(e) => {
            warn!("Error uploading {}: {:#}", what, e);
            false
        }
    }
}
