//! Run configuration for forecast submissions.
//!
//! Every process-wide default of a submission run (the forecast date, the team and model names,
//! the quantile grid) lives in [`ForecastConfig`] and is passed explicitly to the entry points.
//! Configurations are usually loaded from a JSON file in which every field is optional:
//!
//! ```json
//! {
//!     "forecast_date": "2020-06-03",
//!     "targets": ["inc death", "cum death"],
//!     "units": ["wk"],
//!     "uncertainty": "naive",
//!     "n_samples": 1000
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::error::ForecastError;
use crate::forecast::target::{ForecastTimeUnit, ForecastUncertainty, Target};

pub const DEFAULT_TEAM: &str = "CovidActNow";
pub const DEFAULT_MODEL: &str = "SEIR_CAN";
pub const DEFAULT_HORIZON_WEEKS: u32 = 4;
pub const DEFAULT_SAMPLES: usize = 5000;

/// Model time is measured in days since this date.
#[must_use]
pub fn default_reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}

/// 0.01, 0.025, 0.05 through 0.90 in steps of 0.05, 0.975 and 0.99.
#[must_use]
pub fn default_quantiles() -> Vec<f64> {
    let mut quantiles = vec![0.01, 0.025];
    quantiles.extend((1..=18).map(|step| f64::from(step * 5) / 100.0));
    quantiles.extend([0.975, 0.99]);
    quantiles
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// The date the submission is made. Defaults to today.
    pub forecast_date: NaiveDate,
    pub reference_date: NaiveDate,
    pub team: String,
    pub model: String,
    pub horizon_weeks: u32,
    pub quantiles: Vec<f64>,
    /// Number of perturbed models added to the MLE model.
    pub n_samples: usize,
    pub targets: Vec<Target>,
    pub units: Vec<ForecastTimeUnit>,
    pub uncertainty: ForecastUncertainty,
    /// Also emit `point` rows carrying the weighted median.
    pub emit_point_estimates: bool,
    pub seed: u64,
    /// Worker threads for batch runs. `None` uses one per core.
    pub num_threads: Option<usize>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            forecast_date: Local::now().date_naive(),
            reference_date: default_reference_date(),
            team: DEFAULT_TEAM.to_string(),
            model: DEFAULT_MODEL.to_string(),
            horizon_weeks: DEFAULT_HORIZON_WEEKS,
            quantiles: default_quantiles(),
            n_samples: DEFAULT_SAMPLES,
            targets: Target::iter().collect(),
            units: ForecastTimeUnit::iter().collect(),
            uncertainty: ForecastUncertainty::Default,
            emit_point_estimates: false,
            seed: 0,
            num_threads: None,
        }
    }
}

impl ForecastConfig {
    /// The default configuration with a fixed forecast date.
    #[must_use]
    pub fn for_date(forecast_date: NaiveDate) -> Self {
        Self {
            forecast_date,
            ..Self::default()
        }
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened and a configuration error if it does not
    /// describe a valid configuration, including unrecognized targets, units or uncertainty
    /// policies.
    pub fn from_json_file(path: &Path) -> Result<Self, ForecastError> {
        let file = File::open(path)?;
        let config: ForecastConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ForecastError::configuration(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.quantiles.is_empty() {
            return Err(ForecastError::configuration("no quantiles requested"));
        }
        if let Some(q) = self.quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(ForecastError::configuration(format!(
                "quantile {q} is outside [0, 1]"
            )));
        }
        if self.quantiles.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(ForecastError::configuration(
                "quantiles must be in ascending order",
            ));
        }
        if self.targets.is_empty() || self.units.is_empty() {
            return Err(ForecastError::configuration(
                "at least one target and one time unit are required",
            ));
        }
        if self.horizon_weeks == 0 {
            return Err(ForecastError::configuration(
                "the horizon must be at least one week",
            ));
        }
        if self.team.is_empty() || self.model.is_empty() {
            return Err(ForecastError::configuration(
                "team and model names must not be empty",
            ));
        }
        if self.num_threads == Some(0) {
            return Err(ForecastError::configuration(
                "num_threads must be positive",
            ));
        }
        Ok(())
    }
}
