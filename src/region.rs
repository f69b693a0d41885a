//! Regions are identified by FIPS code. Forecast submissions are state-level and carry the
//! two digit state code plus the state's display name; demographic mapping also accepts county
//! codes.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use seir_fips::parser::parse_region_fips;
use seir_fips::{RegionFips, USState};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ForecastError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    fips: RegionFips,
}

impl Region {
    /// Parses a two digit state or five digit county code.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::RegionError`] if the code is malformed or names no known state or
    /// territory.
    pub fn parse(code: &str) -> Result<Self, ForecastError> {
        Ok(Self {
            fips: parse_region_fips(code)?,
        })
    }

    #[must_use]
    pub fn state(state: USState) -> Self {
        Self {
            fips: RegionFips {
                state,
                county: None,
            },
        }
    }

    #[must_use]
    pub fn fips(&self) -> RegionFips {
        self.fips
    }

    #[must_use]
    pub fn us_state(&self) -> USState {
        self.fips.state
    }

    #[must_use]
    pub fn is_county(&self) -> bool {
        self.fips.is_county()
    }

    /// The two digit state code used in the `location` column.
    #[must_use]
    pub fn location(&self) -> String {
        self.fips.state.fips()
    }

    /// The display name of the state or territory, e.g. "District of Columbia".
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.fips.state.name()
    }

    /// Forecast submissions are keyed by state.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for county regions.
    pub fn require_state(&self) -> Result<(), ForecastError> {
        if self.is_county() {
            return Err(ForecastError::configuration(format!(
                "forecasts are produced for states only, got county {self}"
            )));
        }
        Ok(())
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.fips, f)
    }
}

impl FromStr for Region {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::parse(s)
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Region::parse(&code).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_region_location_and_name() {
        let region = Region::parse("06").unwrap();
        assert_eq!(region.location(), "06");
        assert_eq!(region.name(), "California");
        assert!(region.require_state().is_ok());
        assert_eq!(region.to_string(), "06");
    }

    #[test]
    fn county_regions_are_not_forecastable() {
        let region: Region = "06037".parse().unwrap();
        assert!(region.is_county());
        assert_eq!(region.location(), "06");
        assert!(matches!(
            region.require_state(),
            Err(ForecastError::ConfigurationError(_))
        ));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert!(matches!(
            Region::parse("03"),
            Err(ForecastError::RegionError(_))
        ));
        assert!(Region::parse("6").is_err());
        assert!(Region::parse("CA").is_err());
    }

    #[test]
    fn serde_uses_the_code() {
        let region = Region::state(USState::DC);
        let json = serde_json::to_string(&region).unwrap();
        assert_eq!(json, "\"11\"");
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
        assert!(serde_json::from_str::<Region>("\"99\"").is_err());
    }
}
