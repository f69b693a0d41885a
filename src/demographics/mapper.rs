use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;

use crate::demographics::age::{AgeDensity, AgeSeries, RiskModifiers, TimeSeries};
use crate::demographics::measure::{
    CovidMeasure, CovidMeasureUnit, MeasureComposition, UnitTable,
};
use crate::demographics::rates::RateTables;
use crate::error::ForecastError;
use crate::log::{debug, warn};
use crate::model::{AgeStructuredModel, FitResult};
use crate::numeric::ratio_or_zero;
use crate::region::Region;

/// Name of the tiled population pseudo-compartment.
pub const POPULATION_COMPARTMENT: &str = "N";

/// Predictions of the fit before re-weighting, one row per age group.
#[derive(Clone, Debug, PartialEq)]
pub struct AgeStratifiedPredictions {
    pub dates: Vec<NaiveDate>,
    /// `lower-upper` label of each age group.
    pub age_groups: Vec<String>,
    pub compartments: BTreeMap<String, AgeSeries>,
    pub measures: BTreeMap<CovidMeasure, UnitTable<AgeSeries>>,
}

/// Predictions re-weighted to the target population.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MappedPredictions {
    pub compartments: BTreeMap<String, TimeSeries>,
    pub measures: BTreeMap<CovidMeasure, UnitTable<TimeSeries>>,
}

/// Maps an age-structured fit onto a population with a different age distribution.
///
/// Compartment sizes are rescaled by how much larger each age group is in the target population
/// than in the fitted one. Measures are averages over the target population's age groups,
/// optionally weighted further by a relative risk per age.
pub struct DemographicMapper<'a> {
    region: Region,
    model: &'a AgeStructuredModel,
    t0_date: NaiveDate,
    measures: Vec<CovidMeasure>,
    measure_units: Vec<CovidMeasureUnit>,
    target_age_distribution: Option<Arc<dyn AgeDensity>>,
    risk_modifiers: RiskModifiers,
    rates: RateTables,
}

impl<'a> DemographicMapper<'a> {
    /// # Errors
    ///
    /// Returns a configuration error if measures are requested without a unit, and
    /// [`ForecastError::DataUnavailable`] if the fit is malformed or lacks a trajectory the rates
    /// are built from.
    pub fn new(
        region: Region,
        model: &'a AgeStructuredModel,
        fit_result: &FitResult,
        measures: &[CovidMeasure],
        measure_units: &[CovidMeasureUnit],
        target_age_distribution: Option<Arc<dyn AgeDensity>>,
        risk_modifiers: RiskModifiers,
    ) -> Result<Self, ForecastError> {
        if !measures.is_empty() && measure_units.is_empty() {
            return Err(ForecastError::configuration(
                "measures were requested without a measure unit",
            ));
        }
        model
            .check_shape()
            .map_err(|reason| ForecastError::data_unavailable(region, reason))?;
        let mut units = measure_units.to_vec();
        units.sort();
        units.dedup();
        let rates = RateTables::reconstruct(&region, model, &units)?;
        Ok(Self {
            region,
            model,
            t0_date: fit_result.t0_date,
            measures: measures.to_vec(),
            measure_units: units,
            target_age_distribution,
            risk_modifiers,
            rates,
        })
    }

    #[must_use]
    pub fn rates(&self) -> &RateTables {
        &self.rates
    }

    #[must_use]
    pub fn age_bin_centers(&self) -> Vec<f64> {
        self.model
            .parameters
            .age_groups
            .iter()
            .map(|(lower, upper)| (lower + upper) / 2.0)
            .collect()
    }

    fn dates(&self) -> Result<Vec<NaiveDate>, ForecastError> {
        self.model
            .t_list
            .iter()
            .map(|t| {
                TimeDelta::try_days(t.trunc() as i64)
                    .and_then(|offset| self.t0_date.checked_add_signed(offset))
                    .ok_or_else(|| {
                        ForecastError::data_unavailable(
                            self.region,
                            format!("model time {t} is out of the calendar range"),
                        )
                    })
            })
            .collect()
    }

    fn measure_by_age(&self, measure: CovidMeasure, unit: CovidMeasureUnit) -> Option<AgeSeries> {
        match measure.composition() {
            MeasureComposition::Hospitalization {
                streams,
                per_population,
            } => {
                let table = self.rates.hospitalization.get(unit)?;
                let total = AgeSeries::sum(streams.iter().map(|&stream| &table[stream]))?;
                Some(if per_population {
                    total.zip_with(&self.rates.prevalence, |rate, prevalence| rate * prevalence)
                } else {
                    total
                })
            }
            MeasureComposition::Mortality => {
                let table = self.rates.mortality.get(unit)?;
                AgeSeries::sum([&table.hgen, &table.hicu, &table.hvent])
            }
        }
    }

    /// Every age-stratified trajectory of the fit, the tiled population `N`, and every requested
    /// measure in every requested unit.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::DataUnavailable`] if a model time cannot be turned into a date.
    pub fn generate_predictions(&self) -> Result<AgeStratifiedPredictions, ForecastError> {
        let n_times = self.model.t_list.len();
        let mut compartments: BTreeMap<String, AgeSeries> = self
            .model
            .by_age
            .iter()
            .map(|(name, rows)| (name.clone(), AgeSeries::from_rows(rows.clone())))
            .collect();
        compartments.insert(
            POPULATION_COMPARTMENT.to_string(),
            AgeSeries::tiled(&self.model.parameters.population, n_times),
        );

        let mut measures = BTreeMap::new();
        for &measure in &self.measures {
            let mut table = UnitTable::default();
            for &unit in &self.measure_units {
                if let Some(series) = self.measure_by_age(measure, unit) {
                    table.insert(unit, series);
                }
            }
            measures.insert(measure, table);
        }

        Ok(AgeStratifiedPredictions {
            dates: self.dates()?,
            age_groups: self
                .model
                .parameters
                .age_groups
                .iter()
                .map(|(lower, upper)| format!("{}-{}", lower.trunc(), upper.trunc()))
                .collect(),
            compartments,
            measures,
        })
    }

    /// Normalized weights of the target distribution over the fit's age groups. Without a target
    /// distribution the fit's own population shares are used.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the distribution has the wrong length, has a negative or
    /// non-finite value, or sums to zero.
    pub fn target_weights(&self) -> Result<Vec<f64>, ForecastError> {
        match &self.target_age_distribution {
            Some(distribution) => {
                let density = distribution.density(&self.age_bin_centers());
                if density.len() != self.model.n_age_groups() {
                    return Err(ForecastError::configuration(format!(
                        "target age distribution has {} values for {} age groups",
                        density.len(),
                        self.model.n_age_groups()
                    )));
                }
                normalized(density, "target age distribution")
            }
            None => {
                warn!(
                    "region {}: no target age distribution given, using the region's own",
                    self.region
                );
                normalized(self.model.parameters.population.clone(), "population")
            }
        }
    }

    /// Collapses the age groups of `predictions` under the target age distribution.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the target distribution or a risk modifier is unusable.
    pub fn map_to_target_population(
        &self,
        predictions: &AgeStratifiedPredictions,
    ) -> Result<MappedPredictions, ForecastError> {
        let weights = self.target_weights()?;
        let population = &self.model.parameters.population;
        let total_population: f64 = population.iter().sum();
        let size_ratio: Vec<f64> = weights
            .iter()
            .zip(population)
            .map(|(weight, size)| ratio_or_zero(*weight, size / total_population))
            .collect();
        debug!("region {}: group size ratio {:?}", self.region, size_ratio);

        let dated = |values: Vec<f64>| TimeSeries {
            dates: predictions.dates.clone(),
            values,
        };

        let compartments = predictions
            .compartments
            .iter()
            .map(|(name, series)| (name.clone(), dated(series.collapse(&size_ratio))))
            .collect();

        let centers = self.age_bin_centers();
        let mut measures = BTreeMap::new();
        for (&measure, table) in &predictions.measures {
            let measure_weights = match self.risk_modifiers.get(measure) {
                Some(modifier) => {
                    let risk = modifier.density(&centers);
                    if risk.len() != weights.len() {
                        return Err(ForecastError::configuration(format!(
                            "risk modifier for {measure} has {} values for {} age groups",
                            risk.len(),
                            weights.len()
                        )));
                    }
                    let modified = weights.iter().zip(&risk).map(|(w, r)| w * r).collect();
                    normalized(modified, &format!("risk-modified weights for {measure}"))?
                }
                None => weights.clone(),
            };
            let mapped = table.try_map::<_, ForecastError>(|_, series| {
                Ok(dated(series.collapse(&measure_weights)))
            })?;
            measures.insert(measure, mapped);
        }

        Ok(MappedPredictions {
            compartments,
            measures,
        })
    }

    /// # Errors
    ///
    /// See [`Self::generate_predictions`] and [`Self::map_to_target_population`].
    pub fn run(&self) -> Result<MappedPredictions, ForecastError> {
        let predictions = self.generate_predictions()?;
        self.map_to_target_population(&predictions)
    }
}

fn normalized(values: Vec<f64>, what: &str) -> Result<Vec<f64>, ForecastError> {
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ForecastError::configuration(format!(
            "{what} must be finite and non-negative"
        )));
    }
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return Err(ForecastError::configuration(format!("{what} sums to zero")));
    }
    Ok(values.into_iter().map(|v| v / total).collect())
}
