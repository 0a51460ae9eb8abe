use std::fmt;
use std::fmt::Formatter;

/// Errors that prevent the server from starting at all
#[derive(Debug)]
pub enum UnrecoverableError {
    Config(String),
    Io(String),
}

impl fmt::Display for UnrecoverableError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            UnrecoverableError::Config(e) => write!(f, "UnrecoverableError::Config: {}", e),
            UnrecoverableError::Io(e)     => write!(f, "UnrecoverableError::Io: {}", e),
        }
    }
}
impl From<String> for UnrecoverableError {
    fn from(e: String) -> Self {
        UnrecoverableError::Config(e)
    }
}
impl From<&str> for UnrecoverableError {
    fn from(e: &str) -> Self {
        UnrecoverableError::Config(e.to_string())
    }
}
impl From<toml::de::Error> for UnrecoverableError {
    fn from(e: toml::de::Error) -> UnrecoverableError {
        UnrecoverableError::Config(e.to_string())
    }
}
impl From<std::io::Error> for UnrecoverableError {
    fn from(e: std::io::Error) -> UnrecoverableError {
        UnrecoverableError::Io(e.to_string())
    }
}
