//! Error types
use std::{fmt, io, result};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error reading the configuration: {0}")]
    IO(#[from] io::Error),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),
    #[error("Could not parse the YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Could not parse the JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Error connecting to the device: {0}")]
    Http(#[from] ureq::Error),
    #[error("{url} returned HTTP status {status}")]
    Status { url: String, status: u16 },
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// A configuration value rejected by the schema.
///
/// `path` points at the offending value, e.g. `enigma.devices[1].port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{} @ {}", self.message, self.path)
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_mentions_path() {
        let err = Error::from(ValidationError::new(
            "enigma.devices[0].host",
            "required key not provided",
        ));

        assert_eq!(
            "Invalid configuration: required key not provided @ enigma.devices[0].host",
            err.to_string()
        );
    }

    #[test]
    fn status_error_display() {
        let err = Error::Status {
            url: String::from("http://box:80/web/about"),
            status: 401,
        };

        assert_eq!("http://box:80/web/about returned HTTP status 401", err.to_string());
    }
}
