//! The closed sets a forecast run is configured with. Each parses from and displays as the
//! canonical string used in submission labels and configuration files.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

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
    Serialize,
    Deserialize,
)]
pub enum Target {
    #[strum(serialize = "cum death")]
    #[serde(rename = "cum death")]
    CumDeath,
    #[strum(serialize = "inc death")]
    #[serde(rename = "inc death")]
    IncDeath,
    #[strum(serialize = "inc hosp")]
    #[serde(rename = "inc hosp")]
    IncHosp,
}

impl Target {
    /// The name used for the target in the submission metadata.
    #[must_use]
    pub fn long_name(&self) -> &'static str {
        match self {
            Target::CumDeath => "cumulative deaths",
            Target::IncDeath => "incident deaths",
            Target::IncHosp => "incident hospitalizations",
        }
    }
}

/// Granularity of the forecast horizon. Weekly forecasts are for the epi weeks ending on the
/// Saturdays in the horizon.
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
    Serialize,
    Deserialize,
)]
pub enum ForecastTimeUnit {
    #[strum(serialize = "day")]
    #[serde(rename = "day")]
    Day,
    #[strum(serialize = "wk")]
    #[serde(rename = "wk")]
    Week,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum ForecastUncertainty {
    /// Use the ensemble spread as is.
    #[default]
    #[strum(serialize = "default")]
    #[serde(rename = "default")]
    Default,
    /// Widen each draw around the cell mean by `1 + sqrt(h)`, `h` being the horizon step.
    #[strum(serialize = "naive")]
    #[serde(rename = "naive")]
    Naive,
}

/// The `target` column value, e.g. `"3 wk ahead inc death"`.
#[must_use]
pub fn target_label(steps_ahead: i64, unit: ForecastTimeUnit, target: Target) -> String {
    format!("{steps_ahead} {unit} ahead {target}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn canonical_strings_round_trip() {
        for target in Target::iter() {
            assert_eq!(Target::from_str(&target.to_string()).unwrap(), target);
        }
        assert_eq!(ForecastTimeUnit::from_str("wk").unwrap(), ForecastTimeUnit::Week);
        assert_eq!(
            ForecastUncertainty::from_str("naive").unwrap(),
            ForecastUncertainty::Naive
        );
    }

    #[test]
    fn unknown_values_are_configuration_errors() {
        let error: ForecastError = Target::from_str("inc case").unwrap_err().into();
        assert!(matches!(error, ForecastError::ConfigurationError(_)));
        let error: ForecastError = ForecastTimeUnit::from_str("month").unwrap_err().into();
        assert!(!error.is_region_local());
        assert!(serde_json::from_str::<ForecastUncertainty>("\"wide\"").is_err());
    }

    #[test]
    fn labels_and_long_names() {
        assert_eq!(
            target_label(3, ForecastTimeUnit::Week, Target::IncDeath),
            "3 wk ahead inc death"
        );
        assert_eq!(
            target_label(12, ForecastTimeUnit::Day, Target::CumDeath),
            "12 day ahead cum death"
        );
        assert_eq!(Target::IncHosp.long_name(), "incident hospitalizations");
        let json = serde_json::to_string(&Target::CumDeath).unwrap();
        assert_eq!(json, "\"cum death\"");
    }
}
