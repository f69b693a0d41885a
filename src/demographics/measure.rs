use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::ForecastError;

/// Outcome probabilities the demographic engine can report.
///
/// The `_infected` variants are conditional on infection. The others are per person of the
/// whole population and fold in the age-specific prevalence.
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
pub enum CovidMeasure {
    #[strum(serialize = "hospitalization_general_infected")]
    #[serde(rename = "hospitalization_general_infected")]
    HospitalizationGeneralInfected,
    #[strum(serialize = "hospitalization_icu_infected")]
    #[serde(rename = "hospitalization_icu_infected")]
    HospitalizationIcuInfected,
    #[strum(serialize = "hospitalization_infected")]
    #[serde(rename = "hospitalization_infected")]
    HospitalizationInfected,
    #[strum(serialize = "hospitalization_general")]
    #[serde(rename = "hospitalization_general")]
    HospitalizationGeneral,
    #[strum(serialize = "hospitalization_icu")]
    #[serde(rename = "hospitalization_icu")]
    HospitalizationIcu,
    #[strum(serialize = "hospitalization")]
    #[serde(rename = "hospitalization")]
    Hospitalization,
    /// Infection fatality rate, summed over the three hospital streams.
    #[strum(serialize = "IFR")]
    #[serde(rename = "IFR")]
    IFR,
}

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
pub enum CovidMeasureUnit {
    /// Probability that the event ultimately happens.
    #[strum(serialize = "per_capita")]
    #[serde(rename = "per_capita")]
    PerCapita,
    /// Probability that the event happens on a given day.
    #[strum(serialize = "per_capita_day")]
    #[serde(rename = "per_capita_day")]
    PerCapitaDay,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum HospitalizationStream {
    HGen,
    HICU,
    HVent,
}

const ALL_STREAMS: &[HospitalizationStream] = &[
    HospitalizationStream::HGen,
    HospitalizationStream::HICU,
    HospitalizationStream::HVent,
];
const GENERAL_STREAMS: &[HospitalizationStream] = &[HospitalizationStream::HGen];
const ICU_STREAMS: &[HospitalizationStream] =
    &[HospitalizationStream::HICU, HospitalizationStream::HVent];

/// How a measure is assembled from the per-stream rate tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeasureComposition {
    /// Sum of the hospitalization rates of `streams`, times prevalence if `per_population`.
    Hospitalization {
        streams: &'static [HospitalizationStream],
        per_population: bool,
    },
    /// Sum of the mortality rates of every stream.
    Mortality,
}

impl CovidMeasure {
    #[must_use]
    pub fn composition(self) -> MeasureComposition {
        use CovidMeasure::*;
        let hospitalization = |streams, per_population| MeasureComposition::Hospitalization {
            streams,
            per_population,
        };
        match self {
            HospitalizationGeneralInfected => hospitalization(GENERAL_STREAMS, false),
            HospitalizationIcuInfected => hospitalization(ICU_STREAMS, false),
            HospitalizationInfected => hospitalization(ALL_STREAMS, false),
            HospitalizationGeneral => hospitalization(GENERAL_STREAMS, true),
            HospitalizationIcu => hospitalization(ICU_STREAMS, true),
            Hospitalization => hospitalization(ALL_STREAMS, true),
            IFR => MeasureComposition::Mortality,
        }
    }
}

/// Parses measure or unit names, naming the offending entry on failure.
///
/// # Errors
///
/// Returns a configuration error for the first unrecognized name.
pub fn parse_names<T, S>(names: &[S]) -> Result<Vec<T>, ForecastError>
where
    T: FromStr,
    S: AsRef<str>,
{
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            name.parse::<T>()
                .map_err(|_| ForecastError::configuration(format!("unrecognized name `{name}`")))
        })
        .collect()
}

/// One value per measure unit. Units that were not requested are `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitTable<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_capita: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_capita_day: Option<T>,
}

impl<T> Default for UnitTable<T> {
    fn default() -> Self {
        Self {
            per_capita: None,
            per_capita_day: None,
        }
    }
}

impl<T> UnitTable<T> {
    #[must_use]
    pub fn get(&self, unit: CovidMeasureUnit) -> Option<&T> {
        match unit {
            CovidMeasureUnit::PerCapita => self.per_capita.as_ref(),
            CovidMeasureUnit::PerCapitaDay => self.per_capita_day.as_ref(),
        }
    }

    pub fn insert(&mut self, unit: CovidMeasureUnit, value: T) {
        match unit {
            CovidMeasureUnit::PerCapita => self.per_capita = Some(value),
            CovidMeasureUnit::PerCapitaDay => self.per_capita_day = Some(value),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CovidMeasureUnit, &T)> {
        [
            (CovidMeasureUnit::PerCapita, self.per_capita.as_ref()),
            (CovidMeasureUnit::PerCapitaDay, self.per_capita_day.as_ref()),
        ]
        .into_iter()
        .filter_map(|(unit, value)| value.map(|value| (unit, value)))
    }

    /// Applies `f` to every present entry.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(CovidMeasureUnit, &T) -> Result<U, E>,
    ) -> Result<UnitTable<U>, E> {
        let mut table = UnitTable::default();
        for (unit, value) in self.iter() {
            table.insert(unit, f(unit, value)?);
        }
        Ok(table)
    }
}

/// One value per hospitalization stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamTable<T> {
    pub hgen: T,
    pub hicu: T,
    pub hvent: T,
}

impl<T> StreamTable<T> {
    pub fn from_fn(mut f: impl FnMut(HospitalizationStream) -> T) -> Self {
        Self {
            hgen: f(HospitalizationStream::HGen),
            hicu: f(HospitalizationStream::HICU),
            hvent: f(HospitalizationStream::HVent),
        }
    }

    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_from_fn<E>(
        mut f: impl FnMut(HospitalizationStream) -> Result<T, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            hgen: f(HospitalizationStream::HGen)?,
            hicu: f(HospitalizationStream::HICU)?,
            hvent: f(HospitalizationStream::HVent)?,
        })
    }
}

impl<T> Index<HospitalizationStream> for StreamTable<T> {
    type Output = T;

    fn index(&self, stream: HospitalizationStream) -> &T {
        match stream {
            HospitalizationStream::HGen => &self.hgen,
            HospitalizationStream::HICU => &self.hicu,
            HospitalizationStream::HVent => &self.hvent,
        }
    }
}

impl<T> IndexMut<HospitalizationStream> for StreamTable<T> {
    fn index_mut(&mut self, stream: HospitalizationStream) -> &mut T {
        match stream {
            HospitalizationStream::HGen => &mut self.hgen,
            HospitalizationStream::HICU => &mut self.hicu,
            HospitalizationStream::HVent => &mut self.hvent,
        }
    }
}
