//! Re-weighting of age-structured predictions onto a target population.
//!
//! [`DemographicMapper`] rebuilds per-age hospitalization, mortality and recovery rates from an
//! [`AgeStructuredModel`](crate::model::AgeStructuredModel), assembles the requested
//! [`CovidMeasure`]s from them, and collapses the age groups under a target age distribution.

pub mod age;
pub mod mapper;
pub mod measure;
pub mod rates;

pub use age::{AgeDensity, AgeSeries, RiskModifiers, StepDensity, TimeSeries};
pub use mapper::{AgeStratifiedPredictions, DemographicMapper, MappedPredictions};
pub use measure::{parse_names, CovidMeasure, CovidMeasureUnit, HospitalizationStream};
pub use rates::RateTables;
