use std::fmt::{self, Debug, Display};
use std::io;

use seir_fips::FIPSParserError;

/// Provides `ForecastError` and maps to other errors to
/// convert to a `ForecastError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum ForecastError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    DateError(chrono::ParseError),
    /// A region code that does not name a known state or territory.
    RegionError(FIPSParserError),
    /// An unrecognized target, time unit, uncertainty policy, measure or measure unit, or an
    /// otherwise unusable run configuration. Never retried.
    ConfigurationError(String),
    /// No fitted model, fit result, or required trajectory is available for a region. Fatal for
    /// that region only; batch runs record it and continue.
    DataUnavailable { region: String, reason: String },
    ForecastError(String),
}

impl ForecastError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ForecastError::ConfigurationError(message.into())
    }

    pub fn data_unavailable(region: impl Display, reason: impl Into<String>) -> Self {
        ForecastError::DataUnavailable {
            region: region.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error is confined to a single region, so a batch run may continue past it.
    pub fn is_region_local(&self) -> bool {
        !matches!(self, ForecastError::ConfigurationError(_))
    }
}

impl From<io::Error> for ForecastError {
    fn from(error: io::Error) -> Self {
        ForecastError::IoError(error)
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(error: serde_json::Error) -> Self {
        ForecastError::JsonError(error)
    }
}

impl From<csv::Error> for ForecastError {
    fn from(error: csv::Error) -> Self {
        ForecastError::CSVError(error)
    }
}

impl From<chrono::ParseError> for ForecastError {
    fn from(error: chrono::ParseError) -> Self {
        ForecastError::DateError(error)
    }
}

impl From<FIPSParserError> for ForecastError {
    fn from(error: FIPSParserError) -> Self {
        ForecastError::RegionError(error)
    }
}

impl From<strum::ParseError> for ForecastError {
    fn from(error: strum::ParseError) -> Self {
        ForecastError::ConfigurationError(error.to_string())
    }
}

impl From<String> for ForecastError {
    fn from(error: String) -> Self {
        ForecastError::ForecastError(error)
    }
}

impl From<&str> for ForecastError {
    fn from(error: &str) -> Self {
        ForecastError::ForecastError(error.to_string())
    }
}

impl std::error::Error for ForecastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForecastError::IoError(error) => Some(error),
            ForecastError::JsonError(error) => Some(error),
            ForecastError::CSVError(error) => Some(error),
            ForecastError::DateError(error) => Some(error),
            ForecastError::RegionError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for ForecastError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ForecastError::ConfigurationError(message) => {
                write!(f, "Configuration error: {message}")
            }
            ForecastError::DataUnavailable { region, reason } => {
                write!(f, "Data unavailable for region {region}: {reason}")
            }
            ForecastError::RegionError(error) => write!(f, "Invalid region code: {error}"),
            _ => write!(f, "Error: {self:?}"),
        }
    }
}
