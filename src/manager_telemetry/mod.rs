pub mod errors;
pub mod models;

use std::time::Duration;
use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;
use reqwest::Client;
use crate::initialization::TelemetryApi;
use crate::manager_telemetry::errors::TelemetryError;
use crate::manager_telemetry::models::{RawSeries, Signal};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Retry policy for a single upstream fetch: extra attempts after the
/// first failure, with a fixed delay between attempts
#[derive(Clone, Copy)]
pub struct Retry {
    pub attempts: u32,
    pub delay_ms: u64,
}

/// Policy used by the dashboard fetch fan-out
pub const DASHBOARD_RETRY: Retry = Retry { attempts: 2, delay_ms: 500 };
/// Policy used by the per-turbine risk fetches
pub const RISK_RETRY: Retry = Retry { attempts: 3, delay_ms: 1000 };

#[derive(Clone, Copy)]
pub enum Aggregate {
    Device,
    Site,
}

impl Aggregate {
    fn query_param(&self) -> &'static str {
        match self {
            Aggregate::Device => "device",
            Aggregate::Site => "site",
        }
    }
}

/// Client for the upstream device telemetry API
pub struct Telemetry {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Telemetry {
    /// Returns a new instance of the Telemetry client
    ///
    /// # Arguments
    ///
    /// * 'config' - telemetry API configuration struct
    pub fn new(config: &TelemetryApi) -> Result<Self, TelemetryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.to_string(),
        })
    }

    /// Fetches time indexed readings for the given devices and signals
    ///
    /// # Arguments
    ///
    /// * 'device_ids' - devices to query
    /// * 'signals' - signal kinds to query
    /// * 'start' - window start instant
    /// * 'end' - window end instant
    /// * 'resolution' - upstream resolution code, "0" for raw readings
    /// * 'aggregate' - per device or site wide aggregation
    /// * 'retry' - retry policy for transient failures
    pub async fn series(
        &self,
        device_ids: &[i64],
        signals: &[Signal],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resolution: &str,
        aggregate: Aggregate,
        retry: Retry,
    ) -> Result<Vec<RawSeries>, TelemetryError> {
        let url = format!("{}/data", self.base_url);
        let query = [
            ("deviceIds", join_ids(device_ids)),
            ("dataSignalIds", join_signals(signals)),
            ("timestampStart", iso_millis(start)),
            ("timestampEnd", iso_millis(end)),
            ("useUtc", "true".to_string()),
            ("resolution", resolution.to_string()),
            ("aggregate", aggregate.query_param().to_string()),
            ("aggregateLevel", "0".to_string()),
            ("calculation", "sum".to_string()),
        ];

        self.get_with_retry(&url, &query, retry).await
    }

    /// Fetches the single latest actual power reading per device or site
    ///
    /// # Arguments
    ///
    /// * 'device_ids' - devices to query
    /// * 'aggregate' - per device or site wide aggregation
    /// * 'retry' - retry policy for transient failures
    pub async fn realtime(
        &self,
        device_ids: &[i64],
        aggregate: Aggregate,
        retry: Retry,
    ) -> Result<Vec<RawSeries>, TelemetryError> {
        let url = format!("{}/realtimedata", self.base_url);
        let query = [
            ("deviceIds", join_ids(device_ids)),
            ("dataSignalIds", Signal::Actual.id().to_string()),
            ("aggregate", aggregate.query_param().to_string()),
            ("aggregateLevel", "0".to_string()),
            ("calculation", "sum".to_string()),
        ];

        self.get_with_retry(&url, &query, retry).await
    }

    /// Runs a GET with bounded retries and a fixed delay between attempts
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
        retry: Retry,
    ) -> Result<Vec<RawSeries>, TelemetryError> {
        let mut attempt = 0;
        loop {
            match self.get_request(url, query).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < retry.attempts => {
                    warn!("upstream fetch failed, retrying in {}ms: {}", retry.delay_ms, e);
                    tokio::time::sleep(Duration::from_millis(retry.delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_request(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<RawSeries>, TelemetryError> {
        let req = self.client.get(url)
            .query(query)
            .header("Accept", "application/json")
            .header("X-Api-Key", &self.api_key)
            .send().await?;

        let status = req.status();
        if !status.is_success() {
            return Err(TelemetryError::Upstream(format!("{:?}", status)));
        }

        let json = req.text().await?;
        let series: Vec<RawSeries> = serde_json::from_str(&json)?;

        Ok(series)
    }
}

/// Degrades a fetch result to an empty response, logging the failure.
/// A data source lost to upstream trouble must never fail the request.
pub fn or_empty(result: Result<Vec<RawSeries>, TelemetryError>, source: &str) -> Vec<RawSeries> {
    match result {
        Ok(series) => series,
        Err(e) => {
            warn!("{} fetch degraded to empty: {}", source, e);
            Vec::new()
        }
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<String>>()
        .join(",")
}

fn join_signals(signals: &[Signal]) -> String {
    signals.iter()
        .map(|s| s.id().to_string())
        .collect::<Vec<String>>()
        .join(",")
}

fn iso_millis(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
