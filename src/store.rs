//! Access to the fits produced by the inference stage.
//!
//! [`JsonInferenceStore`] reads a directory with one subdirectory per region code:
//!
//! ```text
//! <root>/
//!   06/
//!     mle_model.json      FittedModel
//!     fit_results.json    FitResult
//!     ensemble.json       [ScoredModel], optional precomputed ensemble
//!     age_model.json      AgeStructuredModel, optional
//!   36/
//!     ...
//! ```
//!
//! A missing or unreadable file is [`ForecastError::DataUnavailable`] for that region only.

use std::fs::{read_dir, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::ForecastError;
use crate::forecast::ensemble::{EnsembleRunner, ScoredModel};
use crate::log::{debug, trace};
use crate::model::{AgeStructuredModel, FitResult, FittedModel, ParameterSet};
use crate::region::Region;

pub const MLE_MODEL_FILE: &str = "mle_model.json";
pub const FIT_RESULTS_FILE: &str = "fit_results.json";
pub const ENSEMBLE_FILE: &str = "ensemble.json";
pub const AGE_MODEL_FILE: &str = "age_model.json";

/// The inference stage as seen by the engines.
pub trait InferenceSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ForecastError::DataUnavailable`] if the region has no usable fit.
    fn mle_model(&self, region: &Region) -> Result<FittedModel, ForecastError>;

    /// # Errors
    ///
    /// Returns [`ForecastError::DataUnavailable`] if the region has no usable fit.
    fn fit_result(&self, region: &Region) -> Result<FitResult, ForecastError>;

    /// # Errors
    ///
    /// Returns [`ForecastError::DataUnavailable`] if the region has no age-structured fit.
    fn age_model(&self, region: &Region) -> Result<AgeStructuredModel, ForecastError>;

    /// The state-level regions with a fit, in code order.
    ///
    /// # Errors
    ///
    /// Returns an error if the regions cannot be listed.
    fn regions(&self) -> Result<Vec<Region>, ForecastError>;
}

#[derive(Clone, Debug)]
pub struct JsonInferenceStore {
    root: PathBuf,
}

impl JsonInferenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn region_dir(&self, region: &Region) -> PathBuf {
        self.root.join(region.to_string())
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        region: &Region,
        file_name: &str,
    ) -> Result<T, ForecastError> {
        let path = self.region_dir(region).join(file_name);
        trace!("reading {}", path.display());
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ForecastError::data_unavailable(
                    region,
                    format!("{} not found", path.display()),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ForecastError::data_unavailable(region, format!("{}: {e}", path.display()))
        })
    }
}

impl InferenceSource for JsonInferenceStore {
    fn mle_model(&self, region: &Region) -> Result<FittedModel, ForecastError> {
        let model: FittedModel = self.read_json(region, MLE_MODEL_FILE)?;
        model
            .check_shape()
            .map_err(|reason| ForecastError::data_unavailable(region, reason))?;
        Ok(model)
    }

    fn fit_result(&self, region: &Region) -> Result<FitResult, ForecastError> {
        self.read_json(region, FIT_RESULTS_FILE)
    }

    fn age_model(&self, region: &Region) -> Result<AgeStructuredModel, ForecastError> {
        let model: AgeStructuredModel = self.read_json(region, AGE_MODEL_FILE)?;
        model
            .check_shape()
            .map_err(|reason| ForecastError::data_unavailable(region, reason))?;
        Ok(model)
    }

    fn regions(&self) -> Result<Vec<Region>, ForecastError> {
        let mut regions = Vec::new();
        for entry in read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(region) = name.to_str().and_then(|code| Region::parse(code).ok()) else {
                debug!("skipping {}", entry.path().display());
                continue;
            };
            if !region.is_county() && entry.path().join(FIT_RESULTS_FILE).is_file() {
                regions.push(region);
            }
        }
        regions.sort();
        Ok(regions)
    }
}

/// Serves precomputed ensembles. The models were sampled when the ensemble was computed, so
/// `overrides` are not applied; the first `n_samples` members are returned.
impl EnsembleRunner for JsonInferenceStore {
    fn model_ensemble(
        &self,
        region: &Region,
        overrides: &ParameterSet,
        n_samples: usize,
    ) -> Result<Vec<ScoredModel>, ForecastError> {
        let mut ensemble: Vec<ScoredModel> = self.read_json(region, ENSEMBLE_FILE)?;
        debug!(
            "region {}: {} precomputed members, {} requested, {} overrides not applied",
            region,
            ensemble.len(),
            n_samples,
            overrides.len()
        );
        ensemble.truncate(n_samples);
        Ok(ensemble)
    }
}
