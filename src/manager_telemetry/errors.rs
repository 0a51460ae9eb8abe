use std::fmt;
use std::fmt::Formatter;

#[derive(Debug)]
pub enum TelemetryError {
    Upstream(String),
    Document(String),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TelemetryError::Upstream(e) => write!(f, "TelemetryError::Upstream: {}", e),
            TelemetryError::Document(e) => write!(f, "TelemetryError::Document: {}", e),
        }
    }
}
impl From<reqwest::Error> for TelemetryError {
    fn from(e: reqwest::Error) -> TelemetryError {
        TelemetryError::Upstream(e.to_string())
    }
}
impl From<serde_json::Error> for TelemetryError {
    fn from(e: serde_json::Error) -> TelemetryError {
        TelemetryError::Document(e.to_string())
    }
}
