//! Turns a fitted model into the quantile rows of a forecast submission.
//!
//! ```text
//! run_model_ensemble ─> generate_forecast_ensemble ─> generate_quantile_result
//!   MLE model + N          one value per member         weighted quantiles per
//!   scored samples         per (target, unit, step)     cell, flattened to rows
//! ```

use std::borrow::Cow;

use crate::config::ForecastConfig;
use crate::error::ForecastError;
use crate::forecast::ensemble::{EnsembleRunner, ModelEnsemble};
use crate::forecast::horizon::{ForecastHorizon, HorizonStep};
use crate::forecast::output::{QuantileRow, RowType};
use crate::forecast::quantile::{adjust_forecast_dist, weighted_quantiles};
use crate::forecast::target::{target_label, ForecastTimeUnit, Target};
use crate::log::{debug, info, warn};
use crate::model::{Compartment, FitResult, FittedModel};
use crate::numeric::{diff_with_leading_zero, interp_many};
use crate::region::Region;

/// Parameters of the MLE model held fixed while an ensemble is sampled, in addition to
/// [`FitResult::OVERRIDE_PARAMETERS`].
pub const MODEL_OVERRIDE_PARAMETERS: [&str; 4] =
    ["R0", "I_initial", "E_initial", "suppression_policy"];

/// A target forecast by one model: one value per horizon step.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetForecast {
    pub steps: Vec<HorizonStep>,
    pub values: Vec<f64>,
}

/// The values of every ensemble member for one (target, unit) pair, indexed
/// `[step][member]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ForecastCells {
    pub target: Target,
    pub unit: ForecastTimeUnit,
    pub steps: Vec<HorizonStep>,
    pub values: Vec<Vec<f64>>,
}

pub struct OutputMapper<'a> {
    region: Region,
    model: &'a FittedModel,
    fit_result: &'a FitResult,
    runner: &'a dyn EnsembleRunner,
    config: &'a ForecastConfig,
    horizon: ForecastHorizon,
}

impl<'a> OutputMapper<'a> {
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid or `region` is a county, and
    /// [`ForecastError::DataUnavailable`] if the MLE model is malformed.
    pub fn new(
        region: Region,
        model: &'a FittedModel,
        fit_result: &'a FitResult,
        runner: &'a dyn EnsembleRunner,
        config: &'a ForecastConfig,
    ) -> Result<Self, ForecastError> {
        config.validate()?;
        region.require_state()?;
        model
            .check_shape()
            .map_err(|reason| ForecastError::data_unavailable(region, reason))?;
        let horizon = ForecastHorizon::new(
            config.forecast_date,
            config.horizon_weeks,
            config.reference_date,
        );
        Ok(Self {
            region,
            model,
            fit_result,
            runner,
            config,
            horizon,
        })
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    #[must_use]
    pub fn horizon(&self) -> &ForecastHorizon {
        &self.horizon
    }

    /// The MLE model followed by `n_samples` models sampled with the fitted parameters held
    /// fixed. The MLE model's chi-square is the sum of its fit terms.
    ///
    /// Sampled members whose trajectories do not match their time axis, or whose chi-square is
    /// not finite, are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Propagates the runner's error, and returns [`ForecastError::DataUnavailable`] if the MLE
    /// chi-square is not finite.
    pub fn run_model_ensemble(&self) -> Result<ModelEnsemble, ForecastError> {
        let mut overrides = self.model.parameters.select(&MODEL_OVERRIDE_PARAMETERS);
        overrides.extend_from(&self.fit_result.fitted_parameters());

        let baseline_chi_square = self.fit_result.total_chi_square();
        if !baseline_chi_square.is_finite() {
            return Err(ForecastError::data_unavailable(
                self.region,
                format!("MLE chi-square is {baseline_chi_square}"),
            ));
        }
        let samples = self.runner.model_ensemble(&self.region, &overrides, self.config.n_samples)?;
        let n_sampled = samples.len();
        let mut ensemble = ModelEnsemble::with_baseline(self.model.clone(), baseline_chi_square);
        let mut dropped = 0;
        for scored in samples {
            let invalid = match scored.model.check_shape() {
                Err(reason) => Some(reason),
                Ok(()) if !scored.chi_square.is_finite() => {
                    Some(format!("chi-square is {}", scored.chi_square))
                }
                Ok(()) => None,
            };
            match invalid {
                Some(reason) => {
                    dropped += 1;
                    debug!("region {}: dropping ensemble member: {}", self.region, reason);
                }
                None => ensemble.push(scored),
            }
        }
        if dropped > 0 {
            warn!(
                "region {}: dropped {} of {} ensemble members",
                self.region, dropped, n_sampled
            );
        }
        info!(
            "region {}: ensemble of {} models",
            self.region,
            ensemble.models().len()
        );
        Ok(ensemble)
    }

    fn trajectory<'m>(
        &self,
        model: &'m FittedModel,
        compartment: Compartment,
    ) -> Result<&'m [f64], ForecastError> {
        model.trajectory(compartment).ok_or_else(|| {
            ForecastError::data_unavailable(
                self.region,
                format!("model has no `{compartment}` trajectory"),
            )
        })
    }

    /// Interpolates `model`'s trajectory for `target` onto the horizon and selects the steps of
    /// `unit`. Model time `t` corresponds to `t0 + t` days since the reference date.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::DataUnavailable`] if the model lacks a trajectory the target
    /// needs.
    pub fn forecast_target(
        &self,
        model: &FittedModel,
        target: Target,
        unit: ForecastTimeUnit,
    ) -> Result<TargetForecast, ForecastError> {
        let raw: Cow<[f64]> = match target {
            Target::CumDeath => Cow::Borrowed(self.trajectory(model, Compartment::D)?),
            Target::IncDeath => {
                Cow::Borrowed(self.trajectory(model, Compartment::TotalDeathsPerDay)?)
            }
            Target::IncHosp => {
                let general = self.trajectory(model, Compartment::HGenCumulative)?;
                let icu = self.trajectory(model, Compartment::HICUCumulative)?;
                let admitted: Vec<f64> = general.iter().zip(icu).map(|(g, i)| g + i).collect();
                Cow::Owned(diff_with_leading_zero(&admitted))
            }
        };

        let model_days: Vec<f64> = model
            .t_list
            .iter()
            .map(|t| self.fit_result.t0 + t)
            .collect();
        let interpolated = interp_many(self.horizon.days_since_reference(), &model_days, &raw);

        let steps = self.horizon.steps(unit);
        let values = steps.iter().map(|step| interpolated[step.index]).collect();
        Ok(TargetForecast { steps, values })
    }

    /// Forecasts every configured (target, unit) pair with every ensemble member. Missing values
    /// become 0 and negative values are clipped to 0.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::DataUnavailable`] if any member lacks a needed trajectory.
    pub fn generate_forecast_ensemble(
        &self,
        ensemble: &ModelEnsemble,
    ) -> Result<Vec<ForecastCells>, ForecastError> {
        let mut forecast_ensemble = Vec::new();
        for &target in &self.config.targets {
            for &unit in &self.config.units {
                let steps = self.horizon.steps(unit);
                let mut values = vec![Vec::with_capacity(ensemble.models().len()); steps.len()];
                for model in ensemble.models() {
                    let forecast = self.forecast_target(model, target, unit)?;
                    for (cell, value) in values.iter_mut().zip(forecast.values) {
                        cell.push(if value.is_nan() { 0.0 } else { value.max(0.0) });
                    }
                }
                forecast_ensemble.push(ForecastCells {
                    target,
                    unit,
                    steps,
                    values,
                });
            }
        }
        Ok(forecast_ensemble)
    }

    /// Flattens the weighted quantiles of every cell into submission rows, in the order
    /// target, unit, step, quantile.
    #[must_use]
    pub fn generate_quantile_result(
        &self,
        forecast_ensemble: &[ForecastCells],
        weights: &[f64],
    ) -> Vec<QuantileRow> {
        let location = self.region.location();
        let location_name = self.region.name().to_string();
        let quantile_labels: Vec<String> = self
            .config
            .quantiles
            .iter()
            .map(|q| format!("{q:.3}"))
            .collect();
        let row = |cells: &ForecastCells,
                   step: &HorizonStep,
                   row_type: RowType,
                   quantile: Option<String>,
                   value: f64| QuantileRow {
            forecast_date: self.config.forecast_date,
            location: location.clone(),
            location_name: location_name.clone(),
            target: target_label(step.steps_ahead, cells.unit, cells.target),
            target_end_date: step.target_end_date,
            row_type,
            quantile,
            value,
        };

        let mut rows = Vec::new();
        for cells in forecast_ensemble {
            for (step, data) in cells.steps.iter().zip(&cells.values) {
                let data = adjust_forecast_dist(self.config.uncertainty, data, step.steps_ahead);
                let values = weighted_quantiles(&self.config.quantiles, &data, weights);
                for (label, value) in quantile_labels.iter().zip(values) {
                    rows.push(row(cells, step, RowType::Quantile, Some(label.clone()), value));
                }
                if self.config.emit_point_estimates {
                    let median = weighted_quantiles(&[0.5], &data, weights)[0];
                    rows.push(row(cells, step, RowType::Point, None, median));
                }
            }
        }
        debug!("region {}: {} rows", self.region, rows.len());
        rows
    }

    /// Samples the ensemble and produces the region's submission rows.
    ///
    /// # Errors
    ///
    /// Propagates errors from the ensemble runner and [`ForecastError::DataUnavailable`] for
    /// members lacking a needed trajectory.
    pub fn run(&self) -> Result<Vec<QuantileRow>, ForecastError> {
        let ensemble = self.run_model_ensemble()?;
        let forecast_ensemble = self.generate_forecast_ensemble(&ensemble)?;
        Ok(self.generate_quantile_result(&forecast_ensemble, &ensemble.weights()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::forecast::ensemble::ScoredModel;
    use crate::forecast::target::ForecastUncertainty;
    use crate::model::ParameterSet;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// A model with 10 deaths a day since `t = 0`, 2 general and 1 ICU admission a day.
    pub(crate) fn linear_model(deaths_per_day: f64) -> FittedModel {
        let t_list: Vec<f64> = (0..=300).map(f64::from).collect();
        let series = |rate: f64| t_list.iter().map(|t| t * rate).collect::<Vec<_>>();
        let mut parameters = ParameterSet::new();
        parameters.insert("R0", 2.5);
        parameters.insert("delta", 0.2);
        FittedModel {
            compartments: BTreeMap::from([
                ("D".to_string(), series(deaths_per_day)),
                (
                    "total_deaths_per_day".to_string(),
                    vec![deaths_per_day; t_list.len()],
                ),
                ("HGen_cumulative".to_string(), series(2.0)),
                ("HICU_cumulative".to_string(), series(1.0)),
            ]),
            t_list,
            parameters,
        }
    }

    pub(crate) fn fit_result() -> FitResult {
        FitResult {
            t0: 30.0,
            t0_date: NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
            chi2_cases: Some(3.0),
            chi2_deaths: Some(1.0),
            chi2_hosps: None,
            eps: Some(0.4),
            t_break: Some(20.0),
            test_fraction: None,
        }
    }

    /// Returns copies of one model with fixed chi-squares and records the overrides it was
    /// given.
    pub(crate) struct FixedEnsemble {
        pub model: FittedModel,
        pub chi_squares: Vec<f64>,
        pub overrides: Mutex<Option<ParameterSet>>,
    }

    impl FixedEnsemble {
        pub(crate) fn new(model: FittedModel, chi_squares: Vec<f64>) -> Self {
            Self {
                model,
                chi_squares,
                overrides: Mutex::new(None),
            }
        }
    }

    impl EnsembleRunner for FixedEnsemble {
        fn model_ensemble(
            &self,
            _: &Region,
            overrides: &ParameterSet,
            n_samples: usize,
        ) -> Result<Vec<ScoredModel>, ForecastError> {
            *self.overrides.lock().unwrap() = Some(overrides.clone());
            Ok(self
                .chi_squares
                .iter()
                .take(n_samples)
                .map(|chi_square| ScoredModel {
                    model: self.model.clone(),
                    chi_square: *chi_square,
                })
                .collect())
        }
    }

    fn config() -> ForecastConfig {
        ForecastConfig::for_date(NaiveDate::from_ymd_opt(2020, 6, 3).unwrap())
    }

    #[test]
    fn ensemble_includes_the_baseline_first() {
        let model = linear_model(10.0);
        let fit = fit_result();
        let runner = FixedEnsemble::new(model.clone(), vec![5.0, 6.0, 7.0]);
        let config = config();
        let mapper =
            OutputMapper::new(Region::parse("06").unwrap(), &model, &fit, &runner, &config)
                .unwrap();
        let ensemble = mapper.run_model_ensemble().unwrap();
        assert_eq!(ensemble.models().len(), 4);
        assert_eq!(ensemble.models().len(), ensemble.chi_squares().len());
        assert_eq!(ensemble.chi_squares(), &[4.0, 5.0, 6.0, 7.0]);

        let overrides = runner.overrides.lock().unwrap().clone().unwrap();
        assert_eq!(overrides.scalar("R0"), Some(2.5));
        assert_eq!(overrides.scalar("eps"), Some(0.4));
        assert_eq!(overrides.scalar("t_break"), Some(20.0));
        assert!(!overrides.contains("delta"));
        assert!(!overrides.contains("test_fraction"));
    }

    #[test]
    fn forecast_targets_follow_the_trajectories() {
        let model = linear_model(10.0);
        let fit = fit_result();
        let runner = FixedEnsemble::new(model.clone(), vec![]);
        let config = config();
        let mapper =
            OutputMapper::new(Region::parse("06").unwrap(), &model, &fit, &runner, &config)
                .unwrap();

        let cumulative = mapper
            .forecast_target(&model, Target::CumDeath, ForecastTimeUnit::Week)
            .unwrap();
        assert_eq!(cumulative.steps.len(), 4);
        // 2020-06-13 is day 164 since 2020-01-01, or model day 134.
        assert_eq!(cumulative.values[0], 1340.0);

        let hospitalized = mapper
            .forecast_target(&model, Target::IncHosp, ForecastTimeUnit::Day)
            .unwrap();
        assert!(hospitalized.values.iter().all(|v| *v == 3.0));
    }

    #[test]
    fn missing_trajectories_are_data_unavailable() {
        let mut model = linear_model(10.0);
        model.compartments.remove("HICU_cumulative");
        let fit = fit_result();
        let runner = FixedEnsemble::new(model.clone(), vec![1.0]);
        let config = config();
        let mapper =
            OutputMapper::new(Region::parse("16").unwrap(), &model, &fit, &runner, &config)
                .unwrap();
        assert!(matches!(
            mapper.run(),
            Err(ForecastError::DataUnavailable { ref region, .. }) if region == "16"
        ));
    }

    #[test]
    fn malformed_members_are_dropped() {
        let model = linear_model(10.0);
        let mut truncated = linear_model(10.0);
        truncated
            .compartments
            .insert("total_deaths_per_day".to_string(), vec![10.0; 5]);
        let fit = fit_result();
        let runner = FixedEnsemble::new(truncated, vec![1.0, 2.0]);
        let config = config();
        let mapper =
            OutputMapper::new(Region::parse("06").unwrap(), &model, &fit, &runner, &config)
                .unwrap();

        let ensemble = mapper.run_model_ensemble().unwrap();
        assert_eq!(ensemble.models().len(), 1);
        assert_eq!(ensemble.chi_squares(), &[4.0]);
        assert!(mapper.run().unwrap().iter().all(|row| row.value >= 0.0));
    }

    #[test]
    fn non_finite_chi_squares_are_dropped() {
        let fit = fit_result();
        let baseline = linear_model(10.0);
        // The baseline and one close fit die at 4/day, the others at 5/day.
        struct Members(Vec<(FittedModel, f64)>);
        impl EnsembleRunner for Members {
            fn model_ensemble(
                &self,
                _: &Region,
                _: &ParameterSet,
                _: usize,
            ) -> Result<Vec<ScoredModel>, ForecastError> {
                Ok(self
                    .0
                    .iter()
                    .map(|(model, chi_square)| ScoredModel {
                        model: model.clone(),
                        chi_square: *chi_square,
                    })
                    .collect())
            }
        }
        let mut members = vec![(linear_model(4.0), 4.0)];
        members.extend((0..8).map(|_| (linear_model(5.0), 100.0)));
        members.push((linear_model(5.0), f64::INFINITY));
        members.push((linear_model(5.0), f64::NAN));
        let runner = Members(members);
        let model = linear_model(4.0);
        let mut config = config();
        config.targets = vec![Target::IncDeath];
        config.units = vec![ForecastTimeUnit::Day];
        let mapper =
            OutputMapper::new(Region::parse("06").unwrap(), &model, &fit, &runner, &config)
                .unwrap();

        let ensemble = mapper.run_model_ensemble().unwrap();
        assert_eq!(ensemble.models().len(), 10);
        assert!(ensemble.weights().iter().all(|w| w.is_finite()));
        assert_eq!(ensemble.weights()[..2], [96.0, 96.0]);

        // Only the two well-fitting members carry weight, so the median follows them.
        let median = mapper
            .run()
            .unwrap()
            .into_iter()
            .find(|row| row.quantile.as_deref() == Some("0.500"))
            .unwrap();
        assert_eq!(median.value, 4.0);
    }

    #[test]
    fn county_regions_are_rejected() {
        let model = linear_model(10.0);
        let fit = fit_result();
        let runner = FixedEnsemble::new(model.clone(), vec![]);
        let config = config();
        assert!(OutputMapper::new(
            Region::parse("06037").unwrap(),
            &model,
            &fit,
            &runner,
            &config
        )
        .is_err());
    }

    #[test]
    fn constant_deaths_give_zero_spread() {
        let model = linear_model(10.0);
        let mut fit = fit_result();
        fit.chi2_cases = Some(2.0);
        fit.chi2_deaths = None;
        let runner = FixedEnsemble::new(model.clone(), vec![2.0; 20]);
        let mut config = config();
        config.targets = vec![Target::IncDeath];
        config.units = vec![ForecastTimeUnit::Day];
        let mapper =
            OutputMapper::new(Region::parse("06").unwrap(), &model, &fit, &runner, &config)
                .unwrap();
        let rows = mapper.run().unwrap();
        assert_eq!(rows.len(), 28 * 22);
        assert!(rows.iter().all(|row| row.value == 10.0));
        let median = rows
            .iter()
            .find(|row| {
                row.target == "4 day ahead inc death" && row.quantile.as_deref() == Some("0.500")
            })
            .unwrap();
        assert_eq!(median.value, 10.0);
        assert_eq!(median.location, "06");
        assert_eq!(median.location_name, "California");
        assert_eq!(median.target_end_date.to_string(), "2020-06-07");
    }

    #[test]
    fn quantile_rows_are_monotone_per_cell() {
        let fit = fit_result();
        let model = linear_model(10.0);
        // Members with different death rates and chi-squares.
        let members: Vec<(FittedModel, f64)> = (0..30)
            .map(|i| (linear_model(5.0 + f64::from(i)), f64::from((i * 7) % 11)))
            .collect();
        struct Members(Vec<(FittedModel, f64)>);
        impl EnsembleRunner for Members {
            fn model_ensemble(
                &self,
                _: &Region,
                _: &ParameterSet,
                _: usize,
            ) -> Result<Vec<ScoredModel>, ForecastError> {
                Ok(self
                    .0
                    .iter()
                    .map(|(model, chi_square)| ScoredModel {
                        model: model.clone(),
                        chi_square: *chi_square,
                    })
                    .collect())
            }
        }
        let runner = Members(members);
        let mut config = config();
        config.uncertainty = ForecastUncertainty::Naive;
        config.emit_point_estimates = true;
        let mapper =
            OutputMapper::new(Region::parse("36").unwrap(), &model, &fit, &runner, &config)
                .unwrap();
        let rows = mapper.run().unwrap();

        let mut cells: BTreeMap<(String, NaiveDate), Vec<(String, f64)>> = BTreeMap::new();
        for row in rows.iter().filter(|row| row.row_type == RowType::Quantile) {
            cells
                .entry((row.target.clone(), row.target_end_date))
                .or_default()
                .push((row.quantile.clone().unwrap(), row.value));
        }
        assert_eq!(cells.len(), 3 * (28 + 4));
        for values in cells.values() {
            assert_eq!(values.len(), 22);
            assert!(values.windows(2).all(|pair| pair[0].0 < pair[1].0));
            assert!(values.windows(2).all(|pair| pair[0].1 <= pair[1].1));
        }
        let points = rows.iter().filter(|row| row.row_type == RowType::Point);
        assert_eq!(points.count(), 3 * (28 + 4));
    }
}
