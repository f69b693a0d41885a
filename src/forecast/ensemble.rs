//! Model ensembles and the runners that produce them.
//!
//! An ensemble pairs every model with the chi-square of its fit to the observations. The pairing
//! is structural: models and chi-squares only enter a [`ModelEnsemble`] together, and the MLE
//! model always sits at index 0.
//!
//! Sampling is delegated to an [`EnsembleRunner`]. [`PriorEnsembleRunner`] draws the parameters
//! that were not varied during fitting from their priors, runs a [`CompartmentalModel`] for each
//! draw and scores it with a [`GoodnessOfFit`]; both of those are supplied by the inference
//! stage. A store of precomputed ensembles is another runner (see
//! [`crate::store::JsonInferenceStore`]).

use std::collections::BTreeMap;

use rand::distr::Uniform;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma, LogNormal, Normal};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::log::{debug, warn};
use crate::model::{FittedModel, ParameterSet};
use crate::region::Region;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredModel {
    pub model: FittedModel,
    pub chi_square: f64,
}

#[derive(Clone, Debug)]
pub struct ModelEnsemble {
    models: Vec<FittedModel>,
    chi_squares: Vec<f64>,
}

impl ModelEnsemble {
    /// Starts an ensemble with the MLE model and its chi-square.
    #[must_use]
    pub fn with_baseline(model: FittedModel, chi_square: f64) -> Self {
        Self {
            models: vec![model],
            chi_squares: vec![chi_square],
        }
    }

    pub fn push(&mut self, scored: ScoredModel) {
        self.models.push(scored.model);
        self.chi_squares.push(scored.chi_square);
    }

    #[must_use]
    pub fn baseline(&self) -> &FittedModel {
        &self.models[0]
    }

    #[must_use]
    pub fn models(&self) -> &[FittedModel] {
        &self.models
    }

    #[must_use]
    pub fn chi_squares(&self) -> &[f64] {
        &self.chi_squares
    }

    /// `max(chi2) - chi2_i` for every member: the best fit weighs most and the worst weighs
    /// nothing.
    #[must_use]
    pub fn weights(&self) -> Vec<f64> {
        let max = self
            .chi_squares
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        self.chi_squares.iter().map(|chi| max - chi).collect()
    }
}

/// Produces the perturbed members of a region's ensemble.
pub trait EnsembleRunner: Send + Sync {
    /// Returns up to `n_samples` scored models. Parameters named in `overrides` are held at the
    /// given values in every sample.
    ///
    /// # Errors
    ///
    /// Returns an error if no ensemble can be produced for the region.
    fn model_ensemble(
        &self,
        region: &Region,
        overrides: &ParameterSet,
        n_samples: usize,
    ) -> Result<Vec<ScoredModel>, ForecastError>;
}

/// The compartmental model solver.
pub trait CompartmentalModel: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the parameters do not describe a runnable model.
    fn run(&self, parameters: &ParameterSet) -> Result<FittedModel, ForecastError>;
}

/// Scores a model run against a region's observations.
pub trait GoodnessOfFit: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the region has no observations to compare against.
    fn chi_square(&self, region: &Region, model: &FittedModel) -> Result<f64, ForecastError>;
}

/// A prior over a single scalar parameter.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum ParameterPrior {
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Gamma { shape: f64, scale: f64 },
}

/// A prior truncated to `[lower, upper]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundedPrior {
    #[serde(flatten)]
    pub prior: ParameterPrior,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl From<ParameterPrior> for BoundedPrior {
    fn from(prior: ParameterPrior) -> Self {
        Self {
            prior,
            lower: None,
            upper: None,
        }
    }
}

enum Sampler {
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
    Gamma(Gamma<f64>),
}

// Draws outside the bounds are redrawn this many times before being clamped.
const MAX_REJECTIONS: usize = 100;

struct BoundedSampler {
    sampler: Sampler,
    lower: f64,
    upper: f64,
}

impl BoundedSampler {
    fn new(name: &str, bounded: &BoundedPrior) -> Result<Self, ForecastError> {
        let invalid = |e: &dyn std::fmt::Display| {
            ForecastError::configuration(format!("invalid prior for `{name}`: {e}"))
        };
        let sampler = match bounded.prior {
            ParameterPrior::Uniform { low, high } => {
                Sampler::Uniform(Uniform::new(low, high).map_err(|e| invalid(&e))?)
            }
            ParameterPrior::Normal { mean, std_dev } => {
                Sampler::Normal(Normal::new(mean, std_dev).map_err(|e| invalid(&e))?)
            }
            ParameterPrior::LogNormal { mu, sigma } => {
                Sampler::LogNormal(LogNormal::new(mu, sigma).map_err(|e| invalid(&e))?)
            }
            ParameterPrior::Gamma { shape, scale } => {
                Sampler::Gamma(Gamma::new(shape, scale).map_err(|e| invalid(&e))?)
            }
        };
        let lower = bounded.lower.unwrap_or(f64::NEG_INFINITY);
        let upper = bounded.upper.unwrap_or(f64::INFINITY);
        if lower > upper {
            return Err(invalid(&format!("lower bound {lower} exceeds upper bound {upper}")));
        }
        Ok(Self {
            sampler,
            lower,
            upper,
        })
    }

    fn draw(&self, rng: &mut StdRng) -> f64 {
        match &self.sampler {
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::Normal(d) => d.sample(rng),
            Sampler::LogNormal(d) => d.sample(rng),
            Sampler::Gamma(d) => d.sample(rng),
        }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        let mut value = self.draw(rng);
        for _ in 0..MAX_REJECTIONS {
            if (self.lower..=self.upper).contains(&value) {
                return value;
            }
            value = self.draw(rng);
        }
        value.clamp(self.lower, self.upper)
    }
}

/// Samples an ensemble from parameter priors.
///
/// Every sample starts from `base_parameters`, draws each prior parameter that is not overridden,
/// then applies the overrides. Samples whose model run or scoring fails are dropped with a
/// warning. The random stream is seeded from `seed` and the region's state code so that results
/// do not depend on the order regions are processed in.
pub struct PriorEnsembleRunner<M, G> {
    model: M,
    goodness_of_fit: G,
    base_parameters: ParameterSet,
    priors: BTreeMap<String, BoundedPrior>,
    seed: u64,
}

impl<M: CompartmentalModel, G: GoodnessOfFit> PriorEnsembleRunner<M, G> {
    #[must_use]
    pub fn new(
        model: M,
        goodness_of_fit: G,
        base_parameters: ParameterSet,
        priors: BTreeMap<String, BoundedPrior>,
        seed: u64,
    ) -> Self {
        Self {
            model,
            goodness_of_fit,
            base_parameters,
            priors,
            seed,
        }
    }

    fn sample_parameters(
        &self,
        samplers: &[(&str, BoundedSampler)],
        overrides: &ParameterSet,
        rng: &mut StdRng,
    ) -> ParameterSet {
        let mut parameters = self.base_parameters.clone();
        for (name, sampler) in samplers {
            parameters.insert(*name, sampler.sample(rng));
        }
        parameters.extend_from(overrides);
        parameters
    }
}

impl<M: CompartmentalModel, G: GoodnessOfFit> EnsembleRunner for PriorEnsembleRunner<M, G> {
    fn model_ensemble(
        &self,
        region: &Region,
        overrides: &ParameterSet,
        n_samples: usize,
    ) -> Result<Vec<ScoredModel>, ForecastError> {
        let samplers = self
            .priors
            .iter()
            .filter(|(name, _)| !overrides.contains(name))
            .map(|(name, prior)| BoundedSampler::new(name, prior).map(|s| (name.as_str(), s)))
            .collect::<Result<Vec<_>, ForecastError>>()?;
        debug!(
            "sampling {} parameters for {} models in region {}",
            samplers.len(),
            n_samples,
            region
        );

        let mut rng =
            StdRng::seed_from_u64(self.seed.wrapping_add(u64::from(region.us_state().encode())));
        let mut ensemble = Vec::with_capacity(n_samples);
        let mut failures = 0;
        for _ in 0..n_samples {
            let parameters = self.sample_parameters(&samplers, overrides, &mut rng);
            let scored = self.model.run(&parameters).and_then(|model| {
                let chi_square = self.goodness_of_fit.chi_square(region, &model)?;
                Ok(ScoredModel { model, chi_square })
            });
            match scored {
                Ok(scored) => ensemble.push(scored),
                Err(e) => {
                    failures += 1;
                    debug!("dropping sample for region {}: {}", region, e);
                }
            }
        }
        if failures > 0 {
            warn!(
                "{} of {} ensemble samples failed for region {}",
                failures, n_samples, region
            );
        }
        Ok(ensemble)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Compartment;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A "model" whose deaths grow linearly at the rate given by `R0`.
    struct LinearDeaths;

    impl CompartmentalModel for LinearDeaths {
        fn run(&self, parameters: &ParameterSet) -> Result<FittedModel, ForecastError> {
            let rate = parameters
                .scalar("R0")
                .ok_or_else(|| ForecastError::from("R0 missing"))?;
            if rate < 0.0 {
                return Err("negative rate".into());
            }
            let t_list: Vec<f64> = (0..10).map(f64::from).collect();
            let deaths = t_list.iter().map(|t| t * rate).collect();
            let mut parameters = parameters.clone();
            parameters.insert("ran", 1.0);
            Ok(FittedModel {
                t_list,
                compartments: BTreeMap::from([(Compartment::D.to_string(), deaths)]),
                parameters,
            })
        }
    }

    struct DistanceFromTwo(AtomicUsize);

    impl GoodnessOfFit for DistanceFromTwo {
        fn chi_square(&self, _: &Region, model: &FittedModel) -> Result<f64, ForecastError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            let rate = model.parameters.scalar("R0").unwrap_or_default();
            Ok((rate - 2.0).powi(2))
        }
    }

    fn runner(
        priors: BTreeMap<String, BoundedPrior>,
    ) -> PriorEnsembleRunner<LinearDeaths, DistanceFromTwo> {
        PriorEnsembleRunner::new(
            LinearDeaths,
            DistanceFromTwo(AtomicUsize::new(0)),
            ParameterSet::new(),
            priors,
            42,
        )
    }

    fn baseline() -> FittedModel {
        LinearDeaths
            .run(&{
                let mut p = ParameterSet::new();
                p.insert("R0", 2.0);
                p
            })
            .unwrap()
    }

    #[test]
    fn ensemble_pairs_models_and_chi_squares() {
        let mut ensemble = ModelEnsemble::with_baseline(baseline(), 1.5);
        assert_eq!(ensemble.models().len(), 1);
        for i in 0..4 {
            ensemble.push(ScoredModel {
                model: baseline(),
                chi_square: f64::from(i),
            });
        }
        assert_eq!(ensemble.models().len(), 5);
        assert_eq!(ensemble.models().len(), ensemble.chi_squares().len());
        assert_eq!(ensemble.chi_squares()[0], 1.5);
        assert_eq!(ensemble.weights(), vec![1.5, 3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn prior_samples_are_bounded_and_scored() {
        let priors = BTreeMap::from([(
            "R0".to_string(),
            BoundedPrior {
                prior: ParameterPrior::Normal {
                    mean: 2.0,
                    std_dev: 1.0,
                },
                lower: Some(1.0),
                upper: Some(3.0),
            },
        )]);
        let runner = runner(priors);
        let region = Region::parse("06").unwrap();
        let samples = runner
            .model_ensemble(&region, &ParameterSet::new(), 50)
            .unwrap();
        assert_eq!(samples.len(), 50);
        assert_eq!(runner.goodness_of_fit.0.load(Ordering::Relaxed), 50);
        for scored in &samples {
            let rate = scored.model.parameters.scalar("R0").unwrap();
            assert!((1.0..=3.0).contains(&rate));
            assert_eq!(scored.chi_square, (rate - 2.0).powi(2));
        }
    }

    #[test]
    fn overrides_are_held_fixed() {
        let priors = BTreeMap::from([(
            "R0".to_string(),
            ParameterPrior::Uniform {
                low: 0.0,
                high: 5.0,
            }
            .into(),
        )]);
        let runner = runner(priors);
        let mut overrides = ParameterSet::new();
        overrides.insert("R0", 2.5);
        let samples = runner
            .model_ensemble(&Region::parse("16").unwrap(), &overrides, 5)
            .unwrap();
        assert!(samples
            .iter()
            .all(|s| s.model.parameters.scalar("R0") == Some(2.5)));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let priors = BTreeMap::from([(
            "R0".to_string(),
            ParameterPrior::Gamma {
                shape: 2.0,
                scale: 1.0,
            }
            .into(),
        )]);
        let region = Region::parse("36").unwrap();
        let first = runner(priors.clone())
            .model_ensemble(&region, &ParameterSet::new(), 10)
            .unwrap();
        let second = runner(priors)
            .model_ensemble(&region, &ParameterSet::new(), 10)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn failed_samples_are_dropped() {
        let priors = BTreeMap::from([(
            "R0".to_string(),
            ParameterPrior::Uniform {
                low: -1.0,
                high: 1.0,
            }
            .into(),
        )]);
        let samples = runner(priors)
            .model_ensemble(&Region::parse("06").unwrap(), &ParameterSet::new(), 40)
            .unwrap();
        assert!(samples.len() < 40);
        assert!(samples
            .iter()
            .all(|s| s.model.parameters.scalar("R0").unwrap() >= 0.0));
    }

    #[test]
    fn invalid_priors_are_configuration_errors() {
        let priors = BTreeMap::from([(
            "R0".to_string(),
            ParameterPrior::Normal {
                mean: 0.0,
                std_dev: -1.0,
            }
            .into(),
        )]);
        let result =
            runner(priors).model_ensemble(&Region::parse("06").unwrap(), &ParameterSet::new(), 1);
        assert!(matches!(result, Err(ForecastError::ConfigurationError(_))));
    }

    #[test]
    fn bounded_prior_deserializes() {
        let prior: BoundedPrior = serde_json::from_str(
            r#"{"distribution": "log_normal", "mu": 0.0, "sigma": 0.5, "upper": 4.0}"#,
        )
        .unwrap();
        assert_eq!(
            prior.prior,
            ParameterPrior::LogNormal {
                mu: 0.0,
                sigma: 0.5
            }
        );
        assert_eq!(prior.upper, Some(4.0));
        assert_eq!(prior.lower, None);
    }
}
