//! Quantile forecast submissions and demographic re-weighting for fitted SEIR models
//!
//! The crate consumes compartmental model fits produced by an external inference stage and
//! turns them into two kinds of standardized output:
//!
//! * A **forecast submission**: a perturbed ensemble of the fitted model is scored by
//!   chi-square, target metrics (cumulative deaths, incident deaths, incident hospitalizations)
//!   are extracted over a four week horizon, and chi-square weighted quantiles are written in the
//!   `forecast_date, location, location_name, target, target_end_date, type, quantile, value`
//!   schema. See [`forecast`].
//! * A **demographic mapping**: per-age hospitalization, mortality and recovery rates are
//!   reconstructed from an age-structured fit, composite measures such as the IFR are computed,
//!   and everything is re-aggregated under an arbitrary target age distribution with optional
//!   relative-risk modifiers. See [`demographics`].
//!
//! Neither engine solves the model's differential equations or ingests observations. Both are
//! handed already-materialized fits, either directly or through a [`store::JsonInferenceStore`].
//! Runs for different regions share no mutable state; [`forecast::batch`] fans them out over a
//! bounded worker pool.
pub mod config;
pub mod demographics;
pub mod error;
pub mod forecast;
pub mod log;
pub mod macros;
pub mod model;
pub mod numeric;
#[cfg(feature = "progress_bar")]
pub mod progress;
pub mod region;
pub mod store;

pub use config::ForecastConfig;
pub use error::ForecastError;
pub use region::Region;
