//! Fitted models as handed over by the inference stage.
//!
//! A [`FittedModel`] is an immutable bundle of compartment trajectories over the model time axis
//! `t_list` together with the parameters that produced them. [`FitResult`] carries the fitted
//! epoch and the goodness-of-fit terms. The age-structured variant consumed by the demographic
//! engine is [`AgeStructuredModel`].

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Trajectories a fitted model is expected to expose. The last three are derived series computed
/// by the model alongside the compartments proper.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum Compartment {
    S,
    E,
    I,
    A,
    HGen,
    HICU,
    HVent,
    D,
    R,
    #[strum(serialize = "total_deaths_per_day")]
    TotalDeathsPerDay,
    #[strum(serialize = "HGen_cumulative")]
    HGenCumulative,
    #[strum(serialize = "HICU_cumulative")]
    HICUCumulative,
}

/// A model parameter. Parameters the crate does not interpret (e.g. a serialized suppression
/// policy) are carried through unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Scalar(f64),
    Array(Vec<f64>),
    Other(serde_json::Value),
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Scalar(value)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(value: Vec<f64>) -> Self {
        ParameterValue::Array(value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParameterValue>);

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(ParameterValue::Scalar(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Copies every parameter of `other` into `self`, replacing existing values.
    pub fn extend_from(&mut self, other: &ParameterSet) {
        self.0
            .extend(other.0.iter().map(|(name, value)| (name.clone(), value.clone())));
    }

    /// The subset of parameters whose names appear in `names`.
    #[must_use]
    pub fn select(&self, names: &[&str]) -> ParameterSet {
        ParameterSet(
            self.0
                .iter()
                .filter(|(name, _)| names.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    /// Model time in days since the fitted epoch `t0`.
    pub t_list: Vec<f64>,
    pub compartments: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub parameters: ParameterSet,
}

impl FittedModel {
    #[must_use]
    pub fn trajectory(&self, compartment: Compartment) -> Option<&[f64]> {
        let name: &'static str = compartment.into();
        self.compartments.get(name).map(Vec::as_slice)
    }

    /// Every trajectory must have one value per model time step.
    ///
    /// # Errors
    ///
    /// Returns a description of the first mismatched trajectory.
    pub fn check_shape(&self) -> Result<(), String> {
        if self.t_list.is_empty() {
            return Err("model has an empty time axis".to_string());
        }
        for (name, values) in &self.compartments {
            if values.len() != self.t_list.len() {
                return Err(format!(
                    "trajectory `{name}` has {} values for {} time steps",
                    values.len(),
                    self.t_list.len()
                ));
            }
        }
        Ok(())
    }
}

/// Accepts `2020-03-01` as well as `2020-03-01T00:00:00`.
fn deserialize_iso_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse::<NaiveDate>()
        .or_else(|_| text.parse::<NaiveDateTime>().map(|dt| dt.date()))
        .map_err(serde::de::Error::custom)
}

/// The outcome of fitting a model to observations.
///
/// The fit's goodness is reported as separate chi-square terms for cases, deaths and
/// hospitalizations. These terms must be additive: the chi-square of the MLE model within an
/// ensemble is their sum, which is only comparable to the chi-squares of sampled models if the
/// terms were computed against the same observations and no cross terms exist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// The fitted epidemic start, in days since the reference date.
    pub t0: f64,
    #[serde(deserialize_with = "deserialize_iso_date")]
    pub t0_date: NaiveDate,
    #[serde(default)]
    pub chi2_cases: Option<f64>,
    #[serde(default)]
    pub chi2_deaths: Option<f64>,
    #[serde(default)]
    pub chi2_hosps: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub t_break: Option<f64>,
    #[serde(default)]
    pub test_fraction: Option<f64>,
}

impl FitResult {
    /// Parameters held at their fitted values while an ensemble is sampled.
    pub const OVERRIDE_PARAMETERS: [&'static str; 3] = ["eps", "t_break", "test_fraction"];

    /// The sum of the chi-square terms present.
    #[must_use]
    pub fn total_chi_square(&self) -> f64 {
        [self.chi2_cases, self.chi2_deaths, self.chi2_hosps]
            .into_iter()
            .flatten()
            .sum()
    }

    #[must_use]
    pub fn fitted_parameters(&self) -> ParameterSet {
        let mut parameters = ParameterSet::new();
        for (name, value) in Self::OVERRIDE_PARAMETERS
            .into_iter()
            .zip([self.eps, self.t_break, self.test_fraction])
        {
            if let Some(value) = value {
                parameters.insert(name, value);
            }
        }
        parameters
    }
}

/// A parameter that is either shared by all age groups or given per group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PerAge {
    Uniform(f64),
    ByAge(Vec<f64>),
}

impl PerAge {
    /// Expands the parameter to one value per age group.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch if a per-group parameter has the wrong length.
    pub fn resolve(&self, name: &str, n_age_groups: usize) -> Result<Vec<f64>, String> {
        match self {
            PerAge::Uniform(value) => Ok(vec![*value; n_age_groups]),
            PerAge::ByAge(values) if values.len() == n_age_groups => Ok(values.clone()),
            PerAge::ByAge(values) => Err(format!(
                "parameter `{name}` has {} values for {n_age_groups} age groups",
                values.len()
            )),
        }
    }
}

/// Parameters of an age-structured model fit that the demographic engine needs to reconstruct
/// per-age rates. Names follow the inference stage's serialized model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeModelParameters {
    /// Lower and upper bound of each age group.
    pub age_groups: Vec<(f64, f64)>,
    /// Population of each age group.
    #[serde(rename = "N")]
    pub population: Vec<f64>,
    /// Rate of leaving the infectious pool without hospitalization.
    pub delta: PerAge,
    /// Lifetime probability of hospitalization, ICU included.
    pub hospitalization_rate_general: PerAge,
    pub hospitalization_rate_icu: PerAge,
    pub symptoms_to_hospital_days: PerAge,
    pub fraction_icu_requiring_ventilator: PerAge,
    pub mortality_rate_from_hospital: PerAge,
    pub mortality_rate_no_general_beds: PerAge,
    #[serde(rename = "mortality_rate_from_ICU")]
    pub mortality_rate_from_icu: PerAge,
    #[serde(rename = "mortality_rate_no_ICU_beds")]
    pub mortality_rate_no_icu_beds: PerAge,
    #[serde(rename = "mortality_rate_from_ICUVent")]
    pub mortality_rate_from_icu_vent: PerAge,
    pub hospitalization_length_of_stay_general: PerAge,
    pub hospitalization_length_of_stay_icu: PerAge,
    pub hospitalization_length_of_stay_icu_and_ventilator: PerAge,
    pub beds_general: f64,
    #[serde(rename = "beds_ICU")]
    pub beds_icu: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeStructuredModel {
    pub t_list: Vec<f64>,
    /// Trajectories summed over age groups.
    pub compartments: BTreeMap<String, Vec<f64>>,
    /// Trajectories per age group, indexed `[age group][time step]`.
    pub by_age: BTreeMap<String, Vec<Vec<f64>>>,
    pub parameters: AgeModelParameters,
}

impl AgeStructuredModel {
    #[must_use]
    pub fn n_age_groups(&self) -> usize {
        self.parameters.age_groups.len()
    }

    #[must_use]
    pub fn aggregate(&self, compartment: Compartment) -> Option<&[f64]> {
        let name: &'static str = compartment.into();
        self.compartments.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn by_age(&self, compartment: Compartment) -> Option<&[Vec<f64>]> {
        let name: &'static str = compartment.into();
        self.by_age.get(name).map(Vec::as_slice)
    }

    /// # Errors
    ///
    /// Returns a description of the first inconsistency between the time axis, the age groups
    /// and the trajectories.
    pub fn check_shape(&self) -> Result<(), String> {
        let n_times = self.t_list.len();
        let n_ages = self.n_age_groups();
        if n_times == 0 || n_ages == 0 {
            return Err("model has no time steps or no age groups".to_string());
        }
        if self.parameters.population.len() != n_ages {
            return Err(format!(
                "population has {} groups but the model has {n_ages} age groups",
                self.parameters.population.len()
            ));
        }
        for (name, values) in &self.compartments {
            if values.len() != n_times {
                return Err(format!(
                    "trajectory `{name}` has {} values for {n_times} time steps",
                    values.len()
                ));
            }
        }
        for (name, rows) in &self.by_age {
            if rows.len() != n_ages || rows.iter().any(|row| row.len() != n_times) {
                return Err(format!(
                    "age-stratified trajectory `{name}` is not {n_ages} x {n_times}"
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compartment_names() {
        assert_eq!(Compartment::HICU.to_string(), "HICU");
        assert_eq!(Compartment::TotalDeathsPerDay.to_string(), "total_deaths_per_day");
        assert_eq!(
            "HGen_cumulative".parse::<Compartment>().unwrap(),
            Compartment::HGenCumulative
        );
    }

    #[test]
    fn fit_result_parsing_and_chi_square() {
        let fit: FitResult = serde_json::from_str(
            r#"{"t0": 45.5, "t0_date": "2020-02-15T00:00:00", "chi2_cases": 10.0,
                "chi2_deaths": 2.5, "eps": 0.3, "R0": 3.1}"#,
        )
        .unwrap();
        assert_eq!(fit.t0_date, NaiveDate::from_ymd_opt(2020, 2, 15).unwrap());
        assert_eq!(fit.total_chi_square(), 12.5);
        let fitted = fit.fitted_parameters();
        assert_eq!(fitted.len(), 1);
        assert_eq!(fitted.scalar("eps"), Some(0.3));
    }

    #[test]
    fn parameter_set_select_and_extend() {
        let mut parameters = ParameterSet::new();
        parameters.insert("R0", 2.4);
        parameters.insert("I_initial", 10.0);
        parameters.insert("suppression_policy", vec![1.0, 0.5]);
        parameters.insert("delta", 0.2);
        let selected = parameters.select(&["R0", "suppression_policy", "missing"]);
        assert_eq!(selected.len(), 2);
        assert!(selected.contains("suppression_policy"));

        let mut base = ParameterSet::new();
        base.insert("R0", 1.0);
        base.extend_from(&selected);
        assert_eq!(base.scalar("R0"), Some(2.4));
    }

    #[test]
    fn untagged_parameters() {
        let parameters: ParameterSet =
            serde_json::from_str(r#"{"R0": 2.0, "t_list": [0, 1], "policy": {"kind": "step"}}"#)
                .unwrap();
        assert_eq!(parameters.scalar("R0"), Some(2.0));
        assert_eq!(
            parameters.get("t_list"),
            Some(&ParameterValue::Array(vec![0.0, 1.0]))
        );
        assert!(matches!(
            parameters.get("policy"),
            Some(ParameterValue::Other(_))
        ));
    }

    #[test]
    fn fitted_model_shape() {
        let mut model = FittedModel {
            t_list: vec![0.0, 1.0, 2.0],
            compartments: BTreeMap::from([("D".to_string(), vec![0.0, 1.0, 2.0])]),
            parameters: ParameterSet::new(),
        };
        assert!(model.check_shape().is_ok());
        assert_eq!(model.trajectory(Compartment::D), Some(&[0.0, 1.0, 2.0][..]));
        assert!(model.trajectory(Compartment::HGen).is_none());
        model.compartments.insert("HGen".to_string(), vec![1.0]);
        assert!(model.check_shape().is_err());
    }

    #[test]
    fn per_age_resolution() {
        assert_eq!(PerAge::Uniform(0.5).resolve("x", 3).unwrap(), vec![0.5; 3]);
        assert!(PerAge::ByAge(vec![1.0, 2.0]).resolve("x", 3).is_err());
    }
}
