mod errors;
mod logging;
mod initialization;
mod handlers;
mod cache;
mod models;
mod registry;
mod manager_telemetry;
mod manager_dashboard;
mod manager_risk;

use actix_web::{middleware, web, App, HttpServer};
use actix_files::Files;
use log::info;
use crate::cache::ResultCache;
use crate::errors::UnrecoverableError;
use crate::handlers::{dashboard, location_groups, turbine_details, turbine_devices, turbines, turbines_risk};
use crate::initialization::config;
use crate::manager_telemetry::Telemetry;
use crate::registry::TurbineRegistry;

struct AppState {
    telemetry: Telemetry,
    registry: TurbineRegistry,
    cache: ResultCache,
}

#[actix_web::main]
async fn main() -> Result<(), UnrecoverableError> {
    logging::setup();
    let config = config()?;

    let telemetry = Telemetry::new(&config.telemetry).map_err(|e| e.to_string())?;
    let web_data = web::Data::new(AppState {
        telemetry,
        registry: TurbineRegistry::new(),
        cache: ResultCache::new(),
    });

    info!("starting web server");
    HttpServer::new(move || {
        App::new()
            .app_data(web_data.clone())
            .service(turbines)
            .service(turbine_devices)
            .service(location_groups)
            .service(dashboard)
            .service(turbines_risk)
            .service(turbine_details)
            .service(
                web::scope("")
                    .wrap(middleware::DefaultHeaders::new().add(("Cache-Control", "no-cache")))
                    .service(Files::new("/", "./static").index_file("index.html"))
            )
    })
        .bind((config.web_server.bind_address.as_str(), config.web_server.bind_port))?
        .disable_signals()
        .run()
        .await?;

    Ok(())
}
