use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::manager_telemetry::models::RawSeries;

/// Current state of one turbine as shown in the dashboard sidebar and map
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TurbineSnapshot {
    pub aggregate_id: i64,
    pub measurement: f64,
    pub timestamp: Option<DateTime<Utc>>,
    pub online: bool,
    pub excluded: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub location: String,
    #[serde(rename = "forecastNext10Min")]
    pub forecast_next_10_min: Option<f64>,
    pub forecast_timestamp: Option<DateTime<Utc>>,
}

/// Site aggregated chart series; live buckets past the last observed
/// reading stay null to distinguish "no telemetry yet" from zero output
#[derive(Serialize, Clone, Default)]
pub struct LineChart {
    pub labels: Vec<DateTime<Utc>>,
    pub live: Vec<Option<f64>>,
    pub forecast: Vec<f64>,
}

#[derive(Serialize, Clone, Default)]
pub struct DeviceSeries {
    pub live: Vec<Option<f64>>,
    pub forecast: Vec<f64>,
}

#[derive(Serialize, Clone, Default)]
pub struct PerDeviceChart {
    pub labels: Vec<DateTime<Utc>>,
    pub turbines: BTreeMap<i64, DeviceSeries>,
}

#[derive(Serialize, Clone)]
pub struct RealtimeTotal {
    pub timestamp: Option<DateTime<Utc>>,
    pub value: f64,
}

/// The worst performing turbine for the requested window, annotated with
/// the ranking input that produced it and the window bounds
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LowestTurbine {
    #[serde(flatten)]
    pub turbine: TurbineSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_ratio: Option<f64>,
    #[serde(rename = "totalMWh", skip_serializing_if = "Option::is_none")]
    pub total_mwh: Option<f64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub mapped_data: Vec<TurbineSnapshot>,
    #[serde(rename = "forecastDayMWh")]
    pub forecast_day_mwh: f64,
    #[serde(rename = "forecastNightMWh")]
    pub forecast_night_mwh: f64,
    pub line_chart: LineChart,
    pub line_chart_per_turbine: PerDeviceChart,
    pub realtime: RealtimeTotal,
    #[serde(rename = "totalMWh")]
    pub total_mwh: f64,
    pub lowest_turbine: Option<LowestTurbine>,
    pub timestamp_start: DateTime<Utc>,
    pub timestamp_end: DateTime<Utc>,
}

/// Realtime snapshot envelope enriched with the turbine position
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeTurbine {
    #[serde(flatten)]
    pub series: RawSeries,
    pub latitude: f64,
    pub longitude: f64,
}

/// One reading in the per-turbine detail series
#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DetailPoint {
    pub timestamp: DateTime<Utc>,
    pub measurement: Option<f64>,
    pub unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_night: Option<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurbineDetails {
    pub device_id: i64,
    pub forecast: Vec<DetailPoint>,
    pub realtime: Vec<DetailPoint>,
    pub latitude: f64,
    pub longitude: f64,
    pub is_today_local: bool,
    #[serde(rename = "startUTC")]
    pub start_utc: DateTime<Utc>,
    #[serde(rename = "endUTC")]
    pub end_utc: DateTime<Utc>,
}
