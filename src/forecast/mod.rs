//! Probabilistic forecasts of deaths and hospitalizations in the community submission format.
//!
//! A region's forecast starts from its maximum-likelihood model and fit result, samples an
//! ensemble around it with an [`EnsembleRunner`], evaluates every requested target on every
//! horizon step for every member, and reduces each cell to chi-square weighted quantiles.

pub mod batch;
pub mod ensemble;
pub mod horizon;
pub mod mapper;
pub mod output;
pub mod quantile;
pub mod target;

pub use batch::{run_all, run_for_region, BatchReport};
pub use ensemble::{EnsembleRunner, ModelEnsemble, ScoredModel};
pub use horizon::ForecastHorizon;
pub use mapper::OutputMapper;
pub use output::QuantileRow;
pub use quantile::weighted_quantiles;
pub use target::{ForecastTimeUnit, ForecastUncertainty, Target};
