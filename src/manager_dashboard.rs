use std::collections::{BTreeMap, HashMap, HashSet};
use chrono::{DateTime, Days, NaiveDate, TimeDelta, Timelike, Utc};
use futures::join;
use crate::cache::ResultCache;
use crate::manager_telemetry::{or_empty, Aggregate, Telemetry, DASHBOARD_RETRY};
use crate::manager_telemetry::models::{RawSeries, SeriesSet, Signal};
use crate::models::{
    DashboardResponse, DetailPoint, DeviceSeries, LineChart, LowestTurbine, PerDeviceChart,
    RealtimeTotal, TurbineDetails, TurbineSnapshot,
};
use crate::registry::TurbineRegistry;

const TEN_MINUTES_MS: i64 = 1000 * 60 * 10;
/// Raw readings arrive every 10 minutes, so one reading covers 1/6 h
const INTERVAL_HOURS: f64 = 10.0 / 60.0;
/// Fixed site offset from UTC; a dashboard day runs 04:00 UTC to 03:59:59.999 UTC
const SITE_UTC_OFFSET_HOURS: i64 = -4;
const DAY_START_HOUR_UTC: u32 = 4;

/// Sampling resolution for a chart window, selected from the range length
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Resolution {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Resolution {
    /// Picks the resolution from the elapsed whole days of the window
    pub fn select(start: DateTime<Utc>, end: DateTime<Utc>) -> Resolution {
        let days = (end - start).num_days();
        if days <= 7 {
            Resolution::Hourly
        } else if days <= 30 {
            Resolution::Daily
        } else if days <= 180 {
            Resolution::Weekly
        } else if days <= 730 {
            Resolution::Monthly
        } else {
            Resolution::Yearly
        }
    }

    /// Whether queries at this resolution may ask for sub hour precision
    pub fn sub_hour_capable(&self) -> bool {
        matches!(self, Resolution::Hourly)
    }

    pub fn query_param(&self) -> &'static str {
        match self {
            Resolution::Hourly => "hourly",
            Resolution::Daily => "daily",
            Resolution::Weekly => "weekly",
            Resolution::Monthly => "monthly",
            Resolution::Yearly => "yearly",
        }
    }

    /// Bucket increment for resolutions whose timeline is generated locally.
    /// Coarser resolutions take their bucket alignment from the upstream
    /// response instead.
    fn step(&self) -> Option<TimeDelta> {
        match self {
            Resolution::Hourly => Some(TimeDelta::hours(1)),
            Resolution::Daily => Some(TimeDelta::days(1)),
            _ => None,
        }
    }
}

/// A day aligned request window
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Aligns arbitrary bounds to dashboard day boundaries: swapped bounds are
/// reordered, the start snaps to 04:00 UTC of its day and the end to
/// 03:59:59.999 UTC of its day, extended to a full day when that puts the
/// end before the start
pub fn align_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Window {
    let (s, e) = if start <= end { (start, end) } else { (end, start) };

    let start = s.date_naive()
        .and_hms_opt(DAY_START_HOUR_UTC, 0, 0).unwrap()
        .and_utc();
    let mut end = e.date_naive()
        .and_hms_milli_opt(DAY_START_HOUR_UTC - 1, 59, 59, 999).unwrap()
        .and_utc();
    if end < start {
        end = start + TimeDelta::hours(24) - TimeDelta::milliseconds(1);
    }

    Window { start, end }
}

fn site_local_date(instant: DateTime<Utc>) -> NaiveDate {
    (instant + TimeDelta::hours(SITE_UTC_OFFSET_HOURS)).date_naive()
}

pub fn includes_today(window: &Window, now: DateTime<Utc>) -> bool {
    now >= window.start && now <= window.end
}

/// True when both window bounds fall on the current site local calendar day
pub fn is_exact_today(window: &Window, now: DateTime<Utc>) -> bool {
    let today = site_local_date(now);
    site_local_date(window.start) == today && site_local_date(window.end) == today
}

pub fn cache_key(window: &Window, location: &str, devices: &[i64]) -> String {
    let devices = devices.iter()
        .map(|id| id.to_string())
        .collect::<Vec<String>>()
        .join(",");
    format!("{}-{}-{}-{}", window.start.to_rfc3339(), window.end.to_rfc3339(), location, devices)
}

/// Start of the 10 minute interval following the given instant
fn next_10_minute_interval(instant: DateTime<Utc>) -> DateTime<Utc> {
    let ms = instant.timestamp_millis();
    let rounded = (ms + TEN_MINUTES_MS - 1).div_euclid(TEN_MINUTES_MS) * TEN_MINUTES_MS;
    DateTime::from_timestamp_millis(rounded).unwrap_or(instant)
}

/// Start of the 10 minute interval containing the given instant
fn current_10_minute_interval(instant: DateTime<Utc>) -> DateTime<Utc> {
    let ms = instant.timestamp_millis();
    DateTime::from_timestamp_millis(ms.div_euclid(TEN_MINUTES_MS) * TEN_MINUTES_MS)
        .unwrap_or(instant)
}

pub fn kwh_to_mwh(kwh: f64) -> f64 {
    kwh / 1000.0
}

/// Returns the ordered bucket starts for the window.
///
/// Hourly and daily timelines are generated by fixed increments from the
/// window start; coarser timelines are the sorted distinct timestamps
/// actually present in the upstream responses.
///
/// # Arguments
///
/// * 'window' - aligned request window
/// * 'resolution' - selected sampling resolution
/// * 'sets' - decoded upstream responses for the window
pub fn build_timeline(window: &Window, resolution: Resolution, sets: &[&SeriesSet]) -> Vec<DateTime<Utc>> {
    match resolution.step() {
        Some(step) => {
            let mut buckets = Vec::new();
            let mut bucket = window.start;
            while bucket <= window.end {
                buckets.push(bucket);
                bucket += step;
            }
            buckets
        }
        None => {
            let mut buckets: Vec<DateTime<Utc>> = sets.iter()
                .flat_map(|set| set.timestamps())
                .collect();
            buckets.sort();
            buckets.dedup();
            buckets
        }
    }
}

/// One chart bucket; live stays null until an actual reading lands in it
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct AggregatedPoint {
    pub live: Option<f64>,
    pub forecast: f64,
}

/// Merges all actual and forecast series of a decoded response onto the
/// timeline, summing contributions per bucket. Readings that match no
/// bucket start are dropped, null readings contribute nothing. After the
/// merge, every bucket past the last one with a live contribution is
/// forced back to null so missing telemetry is not mistaken for zero output.
pub fn merge_site_series(timeline: &[DateTime<Utc>], set: &SeriesSet) -> Vec<AggregatedPoint> {
    let index: HashMap<DateTime<Utc>, usize> = timeline.iter()
        .enumerate()
        .map(|(i, ts)| (*ts, i))
        .collect();

    let mut points = vec![AggregatedPoint { live: None, forecast: 0.0 }; timeline.len()];
    let mut last_live: Option<usize> = None;

    for (_, series) in set.signal_series(Signal::Actual) {
        for (ts, val) in series {
            if let (Some(&i), Some(v)) = (index.get(ts), val) {
                points[i].live = Some(points[i].live.unwrap_or(0.0) + v);
                last_live = Some(last_live.map_or(i, |prev| prev.max(i)));
            }
        }
    }
    for (_, series) in set.signal_series(Signal::Forecast) {
        for (ts, val) in series {
            if let (Some(&i), Some(v)) = (index.get(ts), val) {
                points[i].forecast += v;
            }
        }
    }

    let cutoff = last_live.map_or(0, |i| i + 1);
    for point in points.iter_mut().skip(cutoff) {
        point.live = None;
    }

    points
}

/// Per device variant of the merge; each device carries its own
/// last-contribution index and is truncated independently
pub fn merge_device_series(timeline: &[DateTime<Utc>], set: &SeriesSet) -> BTreeMap<i64, DeviceSeries> {
    let index: HashMap<DateTime<Utc>, usize> = timeline.iter()
        .enumerate()
        .map(|(i, ts)| (*ts, i))
        .collect();

    let device_ids: HashSet<i64> = set.signal_series(Signal::Actual)
        .map(|(id, _)| id)
        .chain(set.signal_series(Signal::Forecast).map(|(id, _)| id))
        .collect();

    let mut result = BTreeMap::new();
    for id in device_ids {
        let mut live: Vec<Option<f64>> = vec![None; timeline.len()];
        let mut forecast: Vec<f64> = vec![0.0; timeline.len()];
        let mut last_live: Option<usize> = None;

        if let Some(series) = set.series(Signal::Actual, id) {
            for (ts, val) in series {
                if let (Some(&i), Some(v)) = (index.get(ts), val) {
                    live[i] = Some(live[i].unwrap_or(0.0) + v);
                    last_live = Some(last_live.map_or(i, |prev| prev.max(i)));
                }
            }
        }
        if let Some(series) = set.series(Signal::Forecast, id) {
            for (ts, val) in series {
                if let (Some(&i), Some(v)) = (index.get(ts), val) {
                    forecast[i] += v;
                }
            }
        }

        let cutoff = last_live.map_or(0, |i| i + 1);
        for slot in live.iter_mut().skip(cutoff) {
            *slot = None;
        }

        result.insert(id, DeviceSeries { live, forecast });
    }

    result
}

/// Splits the hourly forecast into day and night energy totals in MWh.
/// Day hours are 10:00-22:00 UTC, which is 06:00-18:00 site local time.
pub fn day_night_split(forecast: &SeriesSet) -> (f64, f64) {
    let mut day_kwh = 0.0;
    let mut night_kwh = 0.0;

    for (_, series) in forecast.signal_series(Signal::Forecast) {
        for (ts, val) in series {
            let kwh = val.unwrap_or(0.0);
            let hour = ts.hour();
            if (10..22).contains(&hour) {
                day_kwh += kwh;
            } else {
                night_kwh += kwh;
            }
        }
    }

    (kwh_to_mwh(day_kwh), kwh_to_mwh(night_kwh))
}

/// Energy per device in MWh from raw 10 minute actual power readings
pub fn per_device_energy_mwh(set: &SeriesSet) -> HashMap<i64, f64> {
    let mut result = HashMap::new();

    for (id, series) in set.signal_series(Signal::Actual) {
        let kwh: f64 = series.values()
            .map(|val| val.unwrap_or(0.0) * INTERVAL_HOURS)
            .sum();
        result.insert(id, kwh_to_mwh(kwh));
    }

    result
}

/// Picks the worst performing turbine.
///
/// For a window covering exactly today the ranking is the realtime output
/// against the next 10 minute forecast, restricted to turbines currently
/// online. For any other window it is the total energy produced over the
/// window, regardless of online state. Ties keep the first candidate.
pub fn lowest_performing(
    snapshots: &[TurbineSnapshot],
    energy: &HashMap<i64, f64>,
    exact_today: bool,
    window: &Window,
) -> Option<LowestTurbine> {
    if exact_today {
        let mut best: Option<(f64, &TurbineSnapshot)> = None;
        for snapshot in snapshots.iter().filter(|s| s.online) {
            let forecast = snapshot.forecast_next_10_min.unwrap_or(0.0);
            let ratio = if forecast > 0.0 { snapshot.measurement / forecast } else { 0.0 };
            if best.map_or(true, |(lowest, _)| ratio < lowest) {
                best = Some((ratio, snapshot));
            }
        }
        best.map(|(ratio, snapshot)| LowestTurbine {
            turbine: snapshot.clone(),
            performance_ratio: Some(ratio),
            total_mwh: None,
            start: window.start,
            end: window.end,
        })
    } else {
        let mut best: Option<(f64, &TurbineSnapshot)> = None;
        for snapshot in snapshots {
            let total = energy.get(&snapshot.aggregate_id).copied().unwrap_or(0.0);
            if best.map_or(true, |(lowest, _)| total < lowest) {
                best = Some((total, snapshot));
            }
        }
        best.map(|(total, snapshot)| LowestTurbine {
            turbine: snapshot.clone(),
            performance_ratio: None,
            total_mwh: Some(total),
            start: window.start,
            end: window.end,
        })
    }
}

/// Dashboard request filters as received from the routing layer
pub struct DashboardQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub devices: Vec<i64>,
}

/// Computes the full dashboard summary for one request.
///
/// The realtime site total is fetched first since its newest timestamp
/// seeds the next 10 minute forecast window; the remaining upstream
/// fetches run concurrently and each degrades to empty on failure, so a
/// response is always produced. Windows that exclude the current day are
/// answered from and stored into the result cache.
pub async fn dashboard_summary(
    telemetry: &Telemetry,
    registry: &TurbineRegistry,
    cache: &ResultCache,
    query: DashboardQuery,
) -> DashboardResponse {
    let now = Utc::now();
    let window = align_window(query.start.unwrap_or(now), query.end.unwrap_or(now));

    let location = query.location.as_deref().unwrap_or("");
    let key = cache_key(&window, location, &query.devices);
    let today_in_view = includes_today(&window, now);

    if !today_in_view {
        if let Some(hit) = cache.get(&key) {
            return hit;
        }
    }

    let sidebar: Vec<i64> = registry.location_ids(location)
        .map(|ids| ids.to_vec())
        .unwrap_or_else(|| registry.device_ids().to_vec());

    let active: Vec<i64> = if query.devices.is_empty() {
        sidebar.clone()
    } else {
        sidebar.iter().copied().filter(|id| query.devices.contains(id)).collect()
    };

    if active.is_empty() {
        return empty_response(&window);
    }

    // Realtime site total first, its timestamp anchors the forecast window
    let realtime_raw = or_empty(
        telemetry.realtime(&active, Aggregate::Site, DASHBOARD_RETRY).await,
        "realtime total",
    );
    let realtime_ts = realtime_raw.first()
        .and_then(|r| r.first_reading())
        .map(|(ts, _)| ts);

    let forecast_start = realtime_ts
        .map(next_10_minute_interval)
        .unwrap_or_else(|| current_10_minute_interval(now));
    let forecast_end = forecast_start + TimeDelta::milliseconds(TEN_MINUTES_MS);

    let resolution = Resolution::select(window.start, window.end);
    let both = [Signal::Actual, Signal::Forecast];

    let (live_raw, next10_raw, full_forecast_raw, chart_site_raw, chart_device_raw, energy_raw) = join!(
        async {
            or_empty(
                telemetry.realtime(&active, Aggregate::Device, DASHBOARD_RETRY).await,
                "live snapshot",
            )
        },
        async {
            or_empty(
                telemetry.series(&active, &[Signal::Forecast], forecast_start, forecast_end,
                                 "10minute", Aggregate::Device, DASHBOARD_RETRY).await,
                "next 10 minute forecast",
            )
        },
        async {
            or_empty(
                telemetry.series(&active, &[Signal::Forecast], window.start, window.end,
                                 "hourly", Aggregate::Device, DASHBOARD_RETRY).await,
                "full day forecast",
            )
        },
        async {
            or_empty(
                telemetry.series(&active, &both, window.start, window.end,
                                 resolution.query_param(), Aggregate::Site, DASHBOARD_RETRY).await,
                "chart series",
            )
        },
        async {
            or_empty(
                telemetry.series(&active, &both, window.start, window.end,
                                 resolution.query_param(), Aggregate::Device, DASHBOARD_RETRY).await,
                "per device chart series",
            )
        },
        async {
            or_empty(
                telemetry.series(&active, &[Signal::Actual], window.start, window.end,
                                 "0", Aggregate::Device, DASHBOARD_RETRY).await,
                "total energy",
            )
        },
    );

    // Per turbine snapshot list
    let live_by_device: HashMap<i64, (DateTime<Utc>, Option<f64>)> = live_raw.iter()
        .filter_map(|r| r.first_reading().map(|reading| (r.aggregate_id, reading)))
        .collect();
    let next10 = SeriesSet::from_raw(&next10_raw);
    let selected: HashSet<i64> = active.iter().copied().collect();
    let mapped_data = build_snapshots(registry, &sidebar, &selected, &live_by_device, &next10);

    // Day/night forecast split over the independently fetched hourly series
    let (forecast_day_mwh, forecast_night_mwh) = day_night_split(&SeriesSet::from_raw(&full_forecast_raw));

    // Chart series
    let chart_site = SeriesSet::from_raw(&chart_site_raw);
    let chart_device = SeriesSet::from_raw(&chart_device_raw);
    let timeline = build_timeline(&window, resolution, &[&chart_site, &chart_device]);

    let points = merge_site_series(&timeline, &chart_site);
    let line_chart = LineChart {
        labels: timeline.clone(),
        live: points.iter().map(|p| p.live).collect(),
        forecast: points.iter().map(|p| p.forecast).collect(),
    };
    let line_chart_per_turbine = PerDeviceChart {
        labels: timeline,
        turbines: merge_device_series(&line_chart.labels, &chart_device),
    };

    // Realtime site total
    let mut realtime_value = 0.0;
    let mut realtime_timestamp: Option<DateTime<Utc>> = None;
    for envelope in &realtime_raw {
        if let Some((ts, val)) = envelope.first_reading() {
            realtime_value += val.unwrap_or(0.0);
            if realtime_timestamp.map_or(true, |newest| ts > newest) {
                realtime_timestamp = Some(ts);
            }
        }
    }

    // Total energy and worst performer
    let energy = per_device_energy_mwh(&SeriesSet::from_raw(&energy_raw));
    let total_mwh = energy.values().sum();
    let lowest_turbine = lowest_performing(&mapped_data, &energy, is_exact_today(&window, now), &window);

    let response = DashboardResponse {
        mapped_data,
        forecast_day_mwh,
        forecast_night_mwh,
        line_chart,
        line_chart_per_turbine,
        realtime: RealtimeTotal { timestamp: realtime_timestamp, value: realtime_value },
        total_mwh,
        lowest_turbine,
        timestamp_start: window.start,
        timestamp_end: window.end,
    };

    if !today_in_view {
        cache.put(key, response.clone());
    }

    response
}

fn build_snapshots(
    registry: &TurbineRegistry,
    sidebar: &[i64],
    selected: &HashSet<i64>,
    live_by_device: &HashMap<i64, (DateTime<Utc>, Option<f64>)>,
    next10: &SeriesSet,
) -> Vec<TurbineSnapshot> {
    sidebar.iter().map(|&id| {
        let is_selected = selected.contains(&id);
        let live = if is_selected { live_by_device.get(&id) } else { None };
        let forecast = if is_selected {
            next10.series(Signal::Forecast, id)
                .and_then(|series| series.iter().next())
                .map(|(ts, val)| (*ts, val.unwrap_or(0.0)))
        } else {
            None
        };
        let coordinates = registry.coordinates(id);
        let online = is_selected && live.is_some();

        TurbineSnapshot {
            aggregate_id: id,
            measurement: if online {
                live.and_then(|(_, val)| *val).unwrap_or(0.0)
            } else {
                0.0
            },
            timestamp: live.map(|(ts, _)| *ts),
            online,
            excluded: !is_selected,
            latitude: coordinates.map_or(0.0, |c| c.latitude),
            longitude: coordinates.map_or(0.0, |c| c.longitude),
            location: registry.location_of(id).to_string(),
            forecast_next_10_min: forecast.map(|(_, val)| val),
            forecast_timestamp: forecast.map(|(ts, _)| ts),
        }
    }).collect()
}

fn empty_response(window: &Window) -> DashboardResponse {
    DashboardResponse {
        mapped_data: Vec::new(),
        forecast_day_mwh: 0.0,
        forecast_night_mwh: 0.0,
        line_chart: LineChart::default(),
        line_chart_per_turbine: PerDeviceChart::default(),
        realtime: RealtimeTotal { timestamp: None, value: 0.0 },
        total_mwh: 0.0,
        lowest_turbine: None,
        timestamp_start: window.start,
        timestamp_end: window.end,
    }
}

fn day_night_tag(instant: DateTime<Utc>) -> &'static str {
    let local_hour = (instant + TimeDelta::hours(SITE_UTC_OFFSET_HOURS)).hour();
    if (6..18).contains(&local_hour) { "Day" } else { "Night" }
}

fn detail_window(date: Option<NaiveDate>, now: DateTime<Utc>) -> Window {
    let base = date.unwrap_or_else(|| site_local_date(now));
    let start = base.and_hms_opt(DAY_START_HOUR_UTC, 0, 0).unwrap().and_utc();
    let end = (base + Days::new(1))
        .and_hms_opt(DAY_START_HOUR_UTC - 1, 59, 59).unwrap()
        .and_utc();

    Window { start, end }
}

fn collect_points(raw: &[RawSeries], day_night: bool) -> Vec<DetailPoint> {
    let mut points = Vec::new();
    for envelope in raw {
        for (ts, val) in &envelope.data {
            if let Some(instant) = crate::manager_telemetry::models::parse_timestamp(ts) {
                points.push(DetailPoint {
                    timestamp: instant,
                    measurement: *val,
                    unit: "kW",
                    day_night: day_night.then(|| day_night_tag(instant)),
                });
            }
        }
    }
    points
}

/// Detail series for one turbine over the day window of the given date,
/// at 10 minute resolution. For the current day the realtime snapshot is
/// appended and readings past the current instant are dropped.
pub async fn turbine_details(
    telemetry: &Telemetry,
    registry: &TurbineRegistry,
    device_id: i64,
    date: Option<NaiveDate>,
) -> TurbineDetails {
    let now = Utc::now();
    let window = detail_window(date, now);
    let is_today = date.map_or(true, |d| d == site_local_date(now));
    let devices = [device_id];

    // a single day window selects hourly, which permits 10 minute detail
    let resolution = Resolution::select(window.start, window.end);
    let step = if resolution.sub_hour_capable() { "10minute" } else { resolution.query_param() };

    let (forecast_raw, actual_raw) = join!(
        async {
            or_empty(
                telemetry.series(&devices, &[Signal::Forecast], window.start, window.end,
                                 step, Aggregate::Site, DASHBOARD_RETRY).await,
                "detail forecast",
            )
        },
        async {
            or_empty(
                telemetry.series(&devices, &[Signal::Actual], window.start, window.end,
                                 step, Aggregate::Site, DASHBOARD_RETRY).await,
                "detail readings",
            )
        },
    );

    let forecast = collect_points(&forecast_raw, true);
    let mut realtime = collect_points(&actual_raw, false);

    if is_today {
        let snapshot_raw = or_empty(
            telemetry.realtime(&devices, Aggregate::Device, DASHBOARD_RETRY).await,
            "detail realtime snapshot",
        );
        realtime.extend(collect_points(&snapshot_raw, false));
        realtime.retain(|point| point.timestamp <= now);
    }

    let coordinates = registry.coordinates(device_id);

    TurbineDetails {
        device_id,
        forecast,
        realtime,
        latitude: coordinates.map_or(0.0, |c| c.latitude),
        longitude: coordinates.map_or(0.0, |c| c.longitude),
        is_today_local: is_today,
        start_utc: window.start,
        end_utc: window.end,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use crate::manager_telemetry::models::RawSignal;
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn raw(signal: Signal, aggregate_id: i64, readings: &[(&str, Option<f64>)]) -> RawSeries {
        RawSeries {
            aggregate_id,
            data_signal: Some(RawSignal { data_signal_id: signal.id() }),
            data: readings.iter().map(|(ts, val)| (ts.to_string(), *val)).collect(),
        }
    }

    fn snapshot(id: i64, online: bool, measurement: f64, forecast: Option<f64>) -> TurbineSnapshot {
        TurbineSnapshot {
            aggregate_id: id,
            measurement,
            timestamp: online.then(|| utc(2026, 8, 29, 12, 0, 0)),
            online,
            excluded: false,
            latitude: 0.0,
            longitude: 0.0,
            location: String::new(),
            forecast_next_10_min: forecast,
            forecast_timestamp: None,
        }
    }

    #[test]
    fn resolution_ladder_boundaries() {
        let start = utc(2026, 1, 1, 4, 0, 0);
        let pick = |days: i64| Resolution::select(start, start + TimeDelta::days(days));

        assert_eq!(pick(1), Resolution::Hourly);
        assert_eq!(pick(7), Resolution::Hourly);
        assert_eq!(pick(8), Resolution::Daily);
        assert_eq!(pick(30), Resolution::Daily);
        assert_eq!(pick(31), Resolution::Weekly);
        assert_eq!(pick(180), Resolution::Weekly);
        assert_eq!(pick(181), Resolution::Monthly);
        assert_eq!(pick(730), Resolution::Monthly);
        assert_eq!(pick(731), Resolution::Yearly);
    }

    #[test]
    fn resolution_never_gets_finer_for_longer_ranges() {
        let start = utc(2026, 1, 1, 4, 0, 0);
        let mut previous = Resolution::Hourly;
        for days in 1..800 {
            let current = Resolution::select(start, start + TimeDelta::days(days));
            assert!(current >= previous, "coarseness regressed at {} days", days);
            previous = current;
        }
    }

    #[test]
    fn only_hourly_is_sub_hour_capable() {
        assert!(Resolution::Hourly.sub_hour_capable());
        assert!(!Resolution::Daily.sub_hour_capable());
        assert!(!Resolution::Weekly.sub_hour_capable());
        assert!(!Resolution::Monthly.sub_hour_capable());
        assert!(!Resolution::Yearly.sub_hour_capable());
    }

    #[test]
    fn hourly_timeline_covers_the_window() {
        let window = align_window(utc(2026, 8, 1, 12, 0, 0), utc(2026, 8, 1, 12, 0, 0));
        let timeline = build_timeline(&window, Resolution::Hourly, &[]);

        assert_eq!(timeline.len(), 24);
        assert_eq!(timeline[0], window.start);
        assert!(timeline.iter().all(|ts| *ts <= window.end));
        assert!(timeline.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn daily_timeline_covers_the_window() {
        // the aligned end is 03:59:59.999 of the end date itself, so the
        // end date contributes no daily bucket of its own
        let window = align_window(utc(2026, 8, 1, 12, 0, 0), utc(2026, 8, 15, 12, 0, 0));
        let timeline = build_timeline(&window, Resolution::Daily, &[]);

        assert_eq!(window.end, utc(2026, 8, 15, 4, 0, 0) - TimeDelta::milliseconds(1));
        assert_eq!(timeline.len(), 14);
        assert_eq!(timeline[0], window.start);
        assert!(timeline.last().unwrap() <= &window.end);
    }

    #[test]
    fn coarse_timeline_comes_from_response_timestamps() {
        let set = SeriesSet::from_raw(&[
            raw(Signal::Actual, 152, &[
                ("2026-03-01T04:00:00Z", Some(1.0)),
                ("2026-01-01T04:00:00Z", Some(1.0)),
            ]),
            raw(Signal::Forecast, 153, &[
                ("2026-02-01T04:00:00Z", Some(1.0)),
                ("2026-03-01T04:00:00Z", Some(2.0)),
            ]),
        ]);
        let window = align_window(utc(2026, 1, 1, 0, 0, 0), utc(2026, 12, 31, 0, 0, 0));
        let timeline = build_timeline(&window, Resolution::Monthly, &[&set]);

        assert_eq!(timeline, vec![
            utc(2026, 1, 1, 4, 0, 0),
            utc(2026, 2, 1, 4, 0, 0),
            utc(2026, 3, 1, 4, 0, 0),
        ]);
    }

    #[test]
    fn merge_sums_and_nulls_after_last_live_bucket() {
        let window = align_window(utc(2026, 8, 1, 12, 0, 0), utc(2026, 8, 1, 12, 0, 0));
        let timeline = build_timeline(&window, Resolution::Hourly, &[]);
        let set = SeriesSet::from_raw(&[
            raw(Signal::Actual, 152, &[
                ("2026-08-01T04:00:00Z", Some(10.0)),
                ("2026-08-01T06:00:00Z", Some(30.0)),
                ("2026-08-01T07:00:00Z", None),
            ]),
            raw(Signal::Actual, 153, &[
                ("2026-08-01T04:00:00Z", Some(5.0)),
            ]),
            raw(Signal::Forecast, 152, &[
                ("2026-08-01T04:00:00Z", Some(12.0)),
                ("2026-08-01T23:00:00Z", Some(7.0)),
            ]),
            raw(Signal::Forecast, 153, &[
                ("2026-08-01T04:00:00Z", Some(3.0)),
            ]),
        ]);

        let points = merge_site_series(&timeline, &set);

        assert_eq!(points[0].live, Some(15.0));
        assert_eq!(points[1].live, None);
        assert_eq!(points[2].live, Some(30.0));
        // the null reading at 07:00 neither fills the bucket nor extends live
        assert!(points[3..].iter().all(|p| p.live.is_none()));
        assert_eq!(points[0].forecast, 15.0);
        assert_eq!(points[19].forecast, 7.0);
        assert_eq!(points[1].forecast, 0.0);
    }

    #[test]
    fn merge_drops_readings_off_the_timeline() {
        let window = align_window(utc(2026, 8, 1, 12, 0, 0), utc(2026, 8, 1, 12, 0, 0));
        let timeline = build_timeline(&window, Resolution::Hourly, &[]);
        let set = SeriesSet::from_raw(&[
            raw(Signal::Actual, 152, &[
                ("2026-08-01T04:30:00Z", Some(99.0)),
                ("2026-07-31T04:00:00Z", Some(99.0)),
                ("2026-08-01T05:00:00Z", Some(20.0)),
            ]),
        ]);

        let points = merge_site_series(&timeline, &set);

        assert_eq!(points[0].live, None);
        assert_eq!(points[1].live, Some(20.0));
    }

    #[test]
    fn device_merge_truncates_each_device_independently() {
        let window = align_window(utc(2026, 8, 1, 12, 0, 0), utc(2026, 8, 1, 12, 0, 0));
        let timeline = build_timeline(&window, Resolution::Hourly, &[]);
        let set = SeriesSet::from_raw(&[
            raw(Signal::Actual, 152, &[
                ("2026-08-01T04:00:00Z", Some(10.0)),
            ]),
            raw(Signal::Actual, 153, &[
                ("2026-08-01T04:00:00Z", Some(1.0)),
                ("2026-08-01T08:00:00Z", Some(2.0)),
            ]),
            raw(Signal::Forecast, 152, &[
                ("2026-08-01T05:00:00Z", Some(11.0)),
            ]),
        ]);

        let turbines = merge_device_series(&timeline, &set);

        let first = &turbines[&152];
        assert_eq!(first.live[0], Some(10.0));
        assert!(first.live[1..].iter().all(|v| v.is_none()));
        assert_eq!(first.forecast[1], 11.0);

        let second = &turbines[&153];
        assert_eq!(second.live[0], Some(1.0));
        assert_eq!(second.live[4], Some(2.0));
        assert_eq!(second.live[1], None);
        assert!(second.live[5..].iter().all(|v| v.is_none()));
    }

    #[test]
    fn day_night_split_uses_utc_day_hours() {
        let set = SeriesSet::from_raw(&[
            raw(Signal::Forecast, 152, &[
                ("2026-08-01T09:00:00Z", Some(500.0)),
                ("2026-08-01T10:00:00Z", Some(1000.0)),
                ("2026-08-01T21:00:00Z", Some(2000.0)),
                ("2026-08-01T22:00:00Z", Some(250.0)),
                ("2026-08-01T23:00:00Z", None),
            ]),
        ]);

        let (day, night) = day_night_split(&set);

        assert_eq!(day, 3.0);
        assert_eq!(night, 0.75);
    }

    #[test]
    fn energy_conversion_round_trips() {
        let kwh = 1234.567;
        let back = kwh_to_mwh(kwh) * 1000.0;
        assert!((back - kwh).abs() < 1e-9);
    }

    #[test]
    fn per_device_energy_integrates_ten_minute_readings() {
        let set = SeriesSet::from_raw(&[
            raw(Signal::Actual, 152, &[
                ("2026-08-01T04:00:00Z", Some(600.0)),
                ("2026-08-01T04:10:00Z", Some(600.0)),
                ("2026-08-01T04:20:00Z", Some(600.0)),
                ("2026-08-01T04:30:00Z", None),
            ]),
        ]);

        let energy = per_device_energy_mwh(&set);

        assert!((energy[&152] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn window_alignment_snaps_to_day_boundaries() {
        let window = align_window(utc(2026, 8, 29, 12, 0, 0), utc(2026, 8, 29, 12, 0, 0));

        assert_eq!(window.start, utc(2026, 8, 29, 4, 0, 0));
        assert_eq!(window.end, utc(2026, 8, 29, 4, 0, 0) + TimeDelta::hours(24) - TimeDelta::milliseconds(1));
    }

    #[test]
    fn window_alignment_reorders_swapped_bounds() {
        let window = align_window(utc(2026, 8, 20, 12, 0, 0), utc(2026, 8, 10, 12, 0, 0));

        assert_eq!(window.start, utc(2026, 8, 10, 4, 0, 0));
        assert_eq!(window.end.date_naive(), utc(2026, 8, 20, 0, 0, 0).date_naive());
    }

    #[test]
    fn today_checks_follow_the_site_day_boundary() {
        let now = utc(2026, 8, 29, 12, 0, 0);
        let today = align_window(now, now);
        let yesterday = align_window(now - TimeDelta::days(1), now - TimeDelta::days(1));
        // a week ending on today's date closes at 03:59:59.999 this morning,
        // which is before the current instant
        let week_to_today = align_window(now - TimeDelta::days(6), now);
        let week_through_today = align_window(now - TimeDelta::days(6), now + TimeDelta::days(1));

        assert!(is_exact_today(&today, now));
        assert!(includes_today(&today, now));
        assert!(!is_exact_today(&yesterday, now));
        assert!(!includes_today(&yesterday, now));
        assert!(!is_exact_today(&week_to_today, now));
        assert!(!includes_today(&week_to_today, now));
        assert!(!is_exact_today(&week_through_today, now));
        assert!(includes_today(&week_through_today, now));
    }

    #[test]
    fn ten_minute_interval_rounding() {
        assert_eq!(next_10_minute_interval(utc(2026, 8, 29, 12, 3, 20)), utc(2026, 8, 29, 12, 10, 0));
        assert_eq!(next_10_minute_interval(utc(2026, 8, 29, 12, 10, 0)), utc(2026, 8, 29, 12, 10, 0));
        assert_eq!(current_10_minute_interval(utc(2026, 8, 29, 12, 3, 20)), utc(2026, 8, 29, 12, 0, 0));
    }

    #[test]
    fn todays_worst_performer_is_the_lowest_ratio_online_turbine() {
        let window = align_window(utc(2026, 8, 29, 12, 0, 0), utc(2026, 8, 29, 12, 0, 0));
        let snapshots = vec![
            snapshot(152, true, 450.0, Some(500.0)),
            snapshot(153, true, 100.0, Some(500.0)),
            snapshot(154, false, 0.0, Some(500.0)),
        ];

        let lowest = lowest_performing(&snapshots, &HashMap::new(), true, &window).unwrap();

        assert_eq!(lowest.turbine.aggregate_id, 153);
        assert!((lowest.performance_ratio.unwrap() - 0.2).abs() < 1e-9);
        assert_eq!(lowest.start, window.start);
        assert_eq!(lowest.end, window.end);
    }

    #[test]
    fn zero_forecast_counts_as_zero_ratio() {
        let window = align_window(utc(2026, 8, 29, 12, 0, 0), utc(2026, 8, 29, 12, 0, 0));
        let snapshots = vec![
            snapshot(152, true, 450.0, Some(500.0)),
            snapshot(153, true, 300.0, None),
        ];

        let lowest = lowest_performing(&snapshots, &HashMap::new(), true, &window).unwrap();

        assert_eq!(lowest.turbine.aggregate_id, 153);
        assert_eq!(lowest.performance_ratio, Some(0.0));
    }

    #[test]
    fn ratio_ties_keep_the_first_candidate() {
        let window = align_window(utc(2026, 8, 29, 12, 0, 0), utc(2026, 8, 29, 12, 0, 0));
        let snapshots = vec![
            snapshot(152, true, 100.0, Some(500.0)),
            snapshot(153, true, 100.0, Some(500.0)),
        ];

        let lowest = lowest_performing(&snapshots, &HashMap::new(), true, &window).unwrap();

        assert_eq!(lowest.turbine.aggregate_id, 152);
    }

    #[test]
    fn historical_worst_performer_ranks_by_energy() {
        let window = align_window(utc(2026, 8, 10, 12, 0, 0), utc(2026, 8, 12, 12, 0, 0));
        let snapshots = vec![
            snapshot(152, false, 0.0, None),
            snapshot(153, false, 0.0, None),
        ];
        let energy = HashMap::from([(152, 4.5), (153, 1.25)]);

        let lowest = lowest_performing(&snapshots, &energy, false, &window).unwrap();

        assert_eq!(lowest.turbine.aggregate_id, 153);
        assert_eq!(lowest.total_mwh, Some(1.25));
        assert!(lowest.performance_ratio.is_none());
    }

    #[test]
    fn no_online_turbines_means_no_ranking_today() {
        let window = align_window(utc(2026, 8, 29, 12, 0, 0), utc(2026, 8, 29, 12, 0, 0));
        let snapshots = vec![snapshot(152, false, 0.0, None)];

        assert!(lowest_performing(&snapshots, &HashMap::new(), true, &window).is_none());
    }

    #[test]
    fn detail_day_night_tag_uses_site_local_hours() {
        assert_eq!(day_night_tag(utc(2026, 8, 1, 10, 0, 0)), "Day");
        assert_eq!(day_night_tag(utc(2026, 8, 1, 21, 59, 0)), "Day");
        assert_eq!(day_night_tag(utc(2026, 8, 1, 22, 0, 0)), "Night");
        assert_eq!(day_night_tag(utc(2026, 8, 1, 9, 59, 0)), "Night");
    }

    #[test]
    fn cache_key_separates_filters() {
        let window = align_window(utc(2026, 8, 10, 12, 0, 0), utc(2026, 8, 12, 12, 0, 0));
        let all = cache_key(&window, "", &[]);
        let location = cache_key(&window, "Tera Cora", &[]);
        let subset = cache_key(&window, "Tera Cora", &[157, 158]);

        assert_ne!(all, location);
        assert_ne!(location, subset);
        assert_eq!(subset, cache_key(&window, "Tera Cora", &[157, 158]));
    }
}
