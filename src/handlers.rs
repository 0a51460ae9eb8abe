use std::collections::BTreeMap;
use actix_web::{get, web, HttpResponse, Responder};
use chrono::{DateTime, NaiveDate, Utc};
use log::error;
use serde::Deserialize;
use serde_json::json;
use crate::AppState;
use crate::manager_dashboard::{self, DashboardQuery};
use crate::manager_risk;
use crate::manager_telemetry::{Aggregate, DASHBOARD_RETRY};
use crate::models::RealtimeTurbine;
use crate::registry::{DEFAULT_LATITUDE, DEFAULT_LONGITUDE};

#[derive(Deserialize)]
struct DashboardParams {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub devices: Option<String>,
}

#[derive(Deserialize)]
struct DetailParams {
    pub date: Option<String>,
}

/// Latest reading per turbine, enriched with map positions
#[get("/api/turbines")]
pub async fn turbines(data: web::Data<AppState>) -> impl Responder {
    let result = data.telemetry
        .realtime(data.registry.device_ids(), Aggregate::Device, DASHBOARD_RETRY)
        .await;

    match result {
        Ok(series) => {
            let enriched: Vec<RealtimeTurbine> = series.into_iter().map(|s| {
                let coordinates = data.registry.coordinates(s.aggregate_id);
                RealtimeTurbine {
                    latitude: coordinates.map_or(DEFAULT_LATITUDE, |c| c.latitude),
                    longitude: coordinates.map_or(DEFAULT_LONGITUDE, |c| c.longitude),
                    series: s,
                }
            }).collect();

            HttpResponse::Ok().json(enriched)
        }
        Err(e) => {
            error!("realtime turbine fetch failed: {}", e);
            HttpResponse::InternalServerError().json(json!({"error": "Failed to fetch turbine data"}))
        }
    }
}

/// Turbine id to display name map
#[get("/api/turbines/devices")]
pub async fn turbine_devices(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.registry.device_map())
}

/// Location group name to turbine id list map
#[get("/api/location-groups")]
pub async fn location_groups(data: web::Data<AppState>) -> impl Responder {
    let groups: BTreeMap<&str, &[i64]> = data.registry.location_groups().into_iter().collect();

    HttpResponse::Ok().json(groups)
}

/// Full dashboard summary for a window with optional location and device
/// filters; missing bounds default to the current day
#[get("/api/turbines/all")]
pub async fn dashboard(data: web::Data<AppState>, params: web::Query<DashboardParams>) -> impl Responder {
    let params = params.into_inner();
    let devices = params.devices.as_deref().map(parse_device_list).unwrap_or_default();

    let query = DashboardQuery {
        start: params.start,
        end: params.end,
        location: params.location,
        devices,
    };
    let response = manager_dashboard::dashboard_summary(
        &data.telemetry,
        &data.registry,
        &data.cache,
        query,
    ).await;

    HttpResponse::Ok().json(response)
}

/// Risk classification over the whole fleet
#[get("/api/turbines-risk")]
pub async fn turbines_risk(data: web::Data<AppState>) -> impl Responder {
    let response = manager_risk::turbines_at_risk(&data.telemetry, &data.registry).await;

    HttpResponse::Ok().json(response)
}

/// Ten minute detail series for one turbine; an unparsable or missing
/// date falls back to the current site local day
#[get("/api/turbines/{id}/details")]
pub async fn turbine_details(
    data: web::Data<AppState>,
    path: web::Path<i64>,
    params: web::Query<DetailParams>,
) -> impl Responder {
    let date = params.date.as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    let details = manager_dashboard::turbine_details(
        &data.telemetry,
        &data.registry,
        path.into_inner(),
        date,
    ).await;

    HttpResponse::Ok().json(details)
}

fn parse_device_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
