use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use log::warn;
use serde::Serialize;
use crate::manager_telemetry::{Aggregate, Telemetry, RISK_RETRY};
use crate::manager_telemetry::errors::TelemetryError;
use crate::manager_telemetry::models::Signal;
use crate::registry::TurbineRegistry;

const LAST_DEVIATION_THRESHOLD: f64 = -200.0;
const SLOPE_THRESHOLD: f64 = -5.0;
const VOLATILITY_THRESHOLD: f64 = 200.0;
const MIN_POINTS: usize = 5;
/// Number of hourly deviation points extrapolated ahead
const FORECAST_HOURS: usize = 3;
/// Output at or below this many kW counts as not generating
const STOPPED_THRESHOLD: f64 = 1.0;
const STOPPED_CHECK_POINTS: usize = 3;
/// Length of the trailing window the analysis runs over
const WINDOW_HOURS: i64 = 24;

/// One merged hourly observation for a turbine; ordering follows the
/// upstream bucket timestamps, which the analysis itself never needs
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct RiskPoint {
    pub forecast: f64,
    pub measurement: f64,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Stopped,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Stopped => "stopped",
        };
        write!(f, "{}", label)
    }
}

/// Outcome of the deviation analysis for one turbine
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub last_deviation: f64,
    pub slope: f64,
    pub volatility: f64,
    pub severity: Severity,
    pub reasoning: String,
    pub deviation_trend: Vec<f64>,
    pub forecast_trend: Vec<f64>,
    pub stopped: bool,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TurbineRisk {
    pub turbine_id: i64,
    pub name: String,
    #[serde(flatten)]
    pub assessment: RiskAssessment,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResponse {
    pub turbines_at_risk: Vec<TurbineRisk>,
}

/// Closed form least squares slope of the values against their indices,
/// zero for the degenerate single point case
fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean_x = (values.len() - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }

    if den == 0.0 { 0.0 } else { num / den }
}

fn population_std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Continues the fitted trend from the last value, one step per hour
fn extrapolate(values: &[f64], hours: usize) -> Vec<f64> {
    let slope = ols_slope(values);
    let last = values[values.len() - 1];
    (1..=hours).map(|k| last + slope * k as f64).collect()
}

/// Classifies a turbine's trailing deviation series.
///
/// The analysis clamps deviations at zero (overproduction is never a risk
/// signal), fits a linear trend to the clamped series and extrapolates it
/// three hours ahead. Returns None when the series is too short, the
/// turbine currently meets its forecast, or no risk rule fires.
pub fn analyze(points: &[RiskPoint]) -> Option<RiskAssessment> {
    if points.len() < MIN_POINTS {
        return None;
    }

    let deviations: Vec<f64> = points.iter()
        .map(|p| p.measurement - p.forecast)
        .collect();
    let negative_devs: Vec<f64> = deviations.iter()
        .map(|d| d.min(0.0))
        .collect();
    let last_deviation = negative_devs[negative_devs.len() - 1];

    if last_deviation >= 0.0 {
        return None;
    }

    let slope = ols_slope(&negative_devs);
    let volatility = population_std_dev(&negative_devs);
    let future_devs = extrapolate(&negative_devs, FORECAST_HOURS);

    let future_risk = future_devs.iter().any(|d| *d < LAST_DEVIATION_THRESHOLD);
    let last3_negative = negative_devs[negative_devs.len() - STOPPED_CHECK_POINTS..]
        .iter()
        .all(|d| *d < 0.0);
    let stopped = points[points.len() - STOPPED_CHECK_POINTS..]
        .iter()
        .all(|p| p.measurement <= STOPPED_THRESHOLD);

    let at_risk = future_risk
        || (last_deviation < LAST_DEVIATION_THRESHOLD && slope < SLOPE_THRESHOLD && last3_negative)
        || (volatility > VOLATILITY_THRESHOLD && slope < 0.0)
        || stopped;

    if !at_risk {
        return None;
    }

    let severity = if stopped {
        Severity::Stopped
    } else if last_deviation < LAST_DEVIATION_THRESHOLD * 2.0
        || slope < SLOPE_THRESHOLD * 2.0
        || future_devs.iter().any(|d| *d < LAST_DEVIATION_THRESHOLD * 1.5)
    {
        Severity::High
    } else if last_deviation < LAST_DEVIATION_THRESHOLD * 1.5 {
        Severity::Medium
    } else {
        Severity::Low
    };

    let reasoning = if stopped {
        "Turbine has stopped generating.".to_string()
    } else {
        let forecasted = future_devs.iter()
            .map(|d| format!("{:.1}", d))
            .collect::<Vec<String>>()
            .join(", ");
        format!(
            "Detected underperformance: last deviation {:.1}, slope {:.2}, volatility {:.1}, forecasted deviations {}. Severity: {}.",
            last_deviation, slope, volatility, forecasted, severity
        )
    };

    Some(RiskAssessment {
        last_deviation,
        slope,
        volatility,
        severity,
        reasoning,
        deviation_trend: deviations,
        forecast_trend: future_devs,
        stopped,
    })
}

/// Fetches and merges the trailing hourly window for one turbine.
///
/// The forecast series supplies the bucket timestamps; buckets without an
/// actual reading are dropped and a missing forecast value counts as zero.
async fn turbine_window(
    telemetry: &Telemetry,
    turbine_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<RiskPoint>, TelemetryError> {
    let raw = telemetry.series(
        &[turbine_id],
        &[Signal::Forecast, Signal::Actual],
        start,
        end,
        "hourly",
        Aggregate::Site,
        RISK_RETRY,
    ).await?;

    let forecast = raw.iter().find(|r| {
        r.data_signal.as_ref().map(|s| s.data_signal_id) == Some(Signal::Forecast.id())
    });
    let actual = raw.iter().find(|r| {
        r.data_signal.as_ref().map(|s| s.data_signal_id) == Some(Signal::Actual.id())
    });
    let (forecast, actual) = match (forecast, actual) {
        (Some(f), Some(a)) => (f, a),
        _ => return Ok(Vec::new()),
    };

    let points = forecast.data.iter()
        .filter_map(|(ts, forecast_val)| {
            let measurement = actual.data.get(ts).copied().flatten()?;
            Some(RiskPoint {
                forecast: forecast_val.unwrap_or(0.0),
                measurement,
            })
        })
        .collect();

    Ok(points)
}

/// Evaluates every turbine's trailing 24 hour window and returns those
/// flagged at risk. Turbine evaluations run concurrently and a failed
/// fetch only drops that turbine from the result.
pub async fn turbines_at_risk(telemetry: &Telemetry, registry: &TurbineRegistry) -> RiskResponse {
    let now = Utc::now();
    let start = now - TimeDelta::hours(WINDOW_HOURS);

    let evaluations = registry.device_ids().iter().map(|&turbine_id| async move {
        match turbine_window(telemetry, turbine_id, start, now).await {
            Ok(points) => analyze(&points).map(|assessment| TurbineRisk {
                turbine_id,
                name: registry.display_name(turbine_id),
                assessment,
            }),
            Err(e) => {
                warn!("risk evaluation failed for turbine {}: {}", turbine_id, e);
                None
            }
        }
    });

    let turbines_at_risk = join_all(evaluations).await
        .into_iter()
        .flatten()
        .collect();

    RiskResponse { turbines_at_risk }
}
