use std::collections::{BTreeMap, HashMap};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracked upstream signal kinds
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Signal {
    /// Actual generated power in kW, upstream signal id 5
    Actual,
    /// Forecast power in kW, upstream signal id 838
    Forecast,
}

impl Signal {
    pub fn id(&self) -> u32 {
        match self {
            Signal::Actual => 5,
            Signal::Forecast => 838,
        }
    }

    pub fn from_id(id: u32) -> Option<Signal> {
        match id {
            5 => Some(Signal::Actual),
            838 => Some(Signal::Forecast),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct RawSignal {
    #[serde(rename = "dataSignalId")]
    pub data_signal_id: u32,
}

/// One per-device (or per-site) envelope as returned by the upstream API
#[derive(Serialize, Deserialize, Clone)]
pub struct RawSeries {
    #[serde(rename = "aggregateId")]
    pub aggregate_id: i64,
    #[serde(rename = "dataSignal", default, skip_serializing_if = "Option::is_none")]
    pub data_signal: Option<RawSignal>,
    #[serde(default)]
    pub data: BTreeMap<String, Option<f64>>,
}

impl RawSeries {
    /// The first reading of the envelope, used for realtime responses which
    /// carry a single latest reading per device or site
    pub fn first_reading(&self) -> Option<(DateTime<Utc>, Option<f64>)> {
        self.data.iter()
            .find_map(|(ts, val)| parse_timestamp(ts).map(|t| (t, *val)))
    }
}

/// Ordered readings for one (aggregate, signal) pair
pub type Series = BTreeMap<DateTime<Utc>, Option<f64>>;

/// Typed lookup over a raw upstream response, decoded once so downstream
/// computations never re-scan heterogeneous arrays
pub struct SeriesSet {
    by_signal: HashMap<Signal, HashMap<i64, Series>>,
}

impl SeriesSet {
    /// Decodes a raw response array into a signal -> (aggregate -> series)
    /// map, dropping envelopes without a known signal and readings whose
    /// timestamp does not parse
    pub fn from_raw(raw: &[RawSeries]) -> Self {
        let mut by_signal: HashMap<Signal, HashMap<i64, Series>> = HashMap::new();

        for envelope in raw {
            let signal = match envelope.data_signal.as_ref().and_then(|s| Signal::from_id(s.data_signal_id)) {
                Some(signal) => signal,
                None => continue,
            };
            let series = by_signal
                .entry(signal)
                .or_default()
                .entry(envelope.aggregate_id)
                .or_default();
            for (ts, val) in &envelope.data {
                if let Some(instant) = parse_timestamp(ts) {
                    series.insert(instant, *val);
                }
            }
        }

        Self { by_signal }
    }

    pub fn series(&self, signal: Signal, aggregate_id: i64) -> Option<&Series> {
        self.by_signal.get(&signal).and_then(|m| m.get(&aggregate_id))
    }

    /// All series for one signal, keyed by aggregate id
    pub fn signal_series(&self, signal: Signal) -> impl Iterator<Item = (i64, &Series)> {
        self.by_signal.get(&signal)
            .into_iter()
            .flat_map(|m| m.iter().map(|(id, series)| (*id, series)))
    }

    /// Sorted, deduplicated timestamps present across all series
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut all: Vec<DateTime<Utc>> = self.by_signal.values()
            .flat_map(|m| m.values())
            .flat_map(|series| series.keys().copied())
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

/// Parses an upstream timestamp, accepting RFC 3339 as well as the
/// offset-less variant some resolutions return
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}
