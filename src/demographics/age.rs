use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::demographics::measure::CovidMeasure;

/// A quantity per age group and time step, indexed `[age group][time step]`.
#[derive(Clone, Debug, PartialEq)]
pub struct AgeSeries {
    rows: Vec<Vec<f64>>,
}

impl AgeSeries {
    pub fn from_fn(n_ages: usize, n_times: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        Self {
            rows: (0..n_ages)
                .map(|age| (0..n_times).map(|time| f(age, time)).collect())
                .collect(),
        }
    }

    /// Takes rows that are already known to be rectangular.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// The same per-age value at every time step.
    #[must_use]
    pub fn tiled(per_age: &[f64], n_times: usize) -> Self {
        Self::from_fn(per_age.len(), n_times, |age, _| per_age[age])
    }

    #[must_use]
    pub fn n_ages(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn n_times(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn get(&self, age: usize, time: usize) -> f64 {
        self.rows[age][time]
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    #[must_use]
    pub fn map(&self, f: impl Fn(usize, f64) -> f64) -> Self {
        Self::from_fn(self.n_ages(), self.n_times(), |age, time| {
            f(age, self.get(age, time))
        })
    }

    #[must_use]
    pub fn zip_with(&self, other: &AgeSeries, f: impl Fn(f64, f64) -> f64) -> Self {
        debug_assert_eq!(self.n_ages(), other.n_ages());
        debug_assert_eq!(self.n_times(), other.n_times());
        Self::from_fn(self.n_ages(), self.n_times(), |age, time| {
            f(self.get(age, time), other.get(age, time))
        })
    }

    /// Element-wise sum of `series`, or `None` if it is empty.
    pub fn sum<'a>(series: impl IntoIterator<Item = &'a AgeSeries>) -> Option<AgeSeries> {
        series.into_iter().fold(None, |total, next| match total {
            None => Some(next.clone()),
            Some(total) => Some(total.zip_with(next, |a, b| a + b)),
        })
    }

    /// Dot product over age groups at every time step.
    #[must_use]
    pub fn collapse(&self, weights: &[f64]) -> Vec<f64> {
        debug_assert_eq!(weights.len(), self.n_ages());
        (0..self.n_times())
            .map(|time| {
                self.rows
                    .iter()
                    .zip(weights)
                    .map(|(row, weight)| row[time] * weight)
                    .sum()
            })
            .collect()
    }
}

/// A dated series after age groups have been collapsed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

/// An unnormalized function of age-bin centers, used for target age distributions and relative
/// risks.
pub trait AgeDensity: Send + Sync {
    /// One value per entry of `age_bin_centers`.
    fn density(&self, age_bin_centers: &[f64]) -> Vec<f64>;
}

impl<F> AgeDensity for F
where
    F: Fn(&[f64]) -> Vec<f64> + Send + Sync,
{
    fn density(&self, age_bin_centers: &[f64]) -> Vec<f64> {
        self(age_bin_centers)
    }
}

/// A piecewise constant density: each bin `[lower, upper)` has one value and ages outside every
/// bin have density zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepDensity {
    pub bins: Vec<(f64, f64, f64)>,
}

impl AgeDensity for StepDensity {
    fn density(&self, age_bin_centers: &[f64]) -> Vec<f64> {
        age_bin_centers
            .iter()
            .map(|age| {
                self.bins
                    .iter()
                    .find(|(lower, upper, _)| lower <= age && age < upper)
                    .map_or(0.0, |(_, _, value)| *value)
            })
            .collect()
    }
}

/// Relative risk by age for individual measures. A measure without a modifier is weighted by the
/// target age distribution alone.
#[derive(Clone, Default)]
pub struct RiskModifiers {
    by_measure: BTreeMap<CovidMeasure, Arc<dyn AgeDensity>>,
}

impl RiskModifiers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, measure: CovidMeasure, modifier: Arc<dyn AgeDensity>) {
        self.by_measure.insert(measure, modifier);
    }

    #[must_use]
    pub fn get(&self, measure: CovidMeasure) -> Option<&dyn AgeDensity> {
        self.by_measure.get(&measure).map(|modifier| &**modifier)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_measure.is_empty()
    }
}

impl std::fmt::Debug for RiskModifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.by_measure.keys()).finish()
    }
}

impl From<BTreeMap<CovidMeasure, StepDensity>> for RiskModifiers {
    fn from(modifiers: BTreeMap<CovidMeasure, StepDensity>) -> Self {
        Self {
            by_measure: modifiers
                .into_iter()
                .map(|(measure, density)| (measure, Arc::new(density) as Arc<dyn AgeDensity>))
                .collect(),
        }
    }
}
