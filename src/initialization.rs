use std::env;
use std::fs::read_to_string;
use serde::Deserialize;
use crate::errors::UnrecoverableError;

const CONFIG_FILE_ENV: &str = "CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Clone)]
pub struct WebServer {
    pub bind_address: String,
    pub bind_port: u16,
}

#[derive(Deserialize, Clone)]
pub struct TelemetryApi {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Deserialize, Clone)]
pub struct Config {
    pub web_server: WebServer,
    pub telemetry: TelemetryApi,
}

/// Loads the configuration from file
///
/// The file path is taken from the CONFIG_FILE environment variable with
/// a fallback to config.toml in the working directory
pub fn config() -> Result<Config, UnrecoverableError> {
    let path = env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    let text = read_to_string(&path)
        .map_err(|e| UnrecoverableError::Config(format!("{}: {}", path, e)))?;
    let config: Config = toml::from_str(&text)?;

    Ok(config)
}
