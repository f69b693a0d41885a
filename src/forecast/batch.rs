//! Forecasts for many regions at once.
//!
//! Regions are independent and run in parallel on a dedicated thread pool. A region that fails
//! for its own reasons (missing fit, malformed model, a failed ensemble) is logged and recorded
//! in the [`BatchReport`]; a configuration error aborts the whole batch.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::config::ForecastConfig;
use crate::error::ForecastError;
use crate::forecast::ensemble::EnsembleRunner;
use crate::forecast::mapper::OutputMapper;
use crate::forecast::output::{write_combined_file, write_metadata, write_region_file, QuantileRow};
use crate::log::{error, info, warn};
use crate::region::Region;
use crate::store::InferenceSource;

/// The rows produced for one region and the file they were written to.
#[derive(Clone, Debug)]
pub struct RegionForecast {
    pub region: Region,
    pub rows: Vec<QuantileRow>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Rows of every successful region, sorted when a combined file was written.
    pub rows: Vec<QuantileRow>,
    pub failures: Vec<(Region, ForecastError)>,
    /// Files written, per-region files first.
    pub files: Vec<PathBuf>,
}

/// Forecasts one region and, with `output_dir`, writes its submission file.
///
/// # Errors
///
/// Returns [`ForecastError::DataUnavailable`] if the region has no usable fit, and propagates
/// errors from the ensemble runner and file output.
pub fn run_for_region(
    region: Region,
    source: &dyn InferenceSource,
    runner: &dyn EnsembleRunner,
    config: &ForecastConfig,
    output_dir: Option<&Path>,
) -> Result<RegionForecast, ForecastError> {
    let model = source.mle_model(&region)?;
    let fit_result = source.fit_result(&region)?;
    let mapper = OutputMapper::new(region, &model, &fit_result, runner, config)?;
    let rows = mapper.run()?;
    let file = output_dir
        .map(|directory| write_region_file(directory, config, &region, &rows))
        .transpose()?;
    info!("region {}: {} rows", region, rows.len());
    Ok(RegionForecast { region, rows, file })
}

/// Forecasts every region in `regions` and, with `output_dir`, writes the per-region files, the
/// combined file and the metadata file.
///
/// # Errors
///
/// Returns the first error that is not confined to one region, and errors writing the combined
/// or metadata files. Region-local failures are reported in [`BatchReport::failures`].
pub fn run_all(
    regions: &[Region],
    source: &dyn InferenceSource,
    runner: &dyn EnsembleRunner,
    config: &ForecastConfig,
    output_dir: Option<&Path>,
) -> Result<BatchReport, ForecastError> {
    config.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads.unwrap_or(0))
        .build()
        .map_err(|e| ForecastError::ForecastError(format!("cannot start worker threads: {e}")))?;
    info!(
        "forecasting {} regions on {} threads",
        regions.len(),
        pool.current_num_threads()
    );

    #[cfg(feature = "progress_bar")]
    crate::progress::init_region_progress(regions.len());

    let results: Vec<(Region, Result<RegionForecast, ForecastError>)> = pool.install(|| {
        regions
            .par_iter()
            .map(|region| {
                let result = run_for_region(*region, source, runner, config, output_dir);
                #[cfg(feature = "progress_bar")]
                crate::progress::increment_region_progress();
                (*region, result)
            })
            .collect()
    });

    #[cfg(feature = "progress_bar")]
    crate::progress::finish_region_progress();

    let mut report = BatchReport::default();
    for (region, result) in results {
        match result {
            Ok(forecast) => {
                report.rows.extend(forecast.rows);
                report.files.extend(forecast.file);
            }
            Err(e) if e.is_region_local() => {
                error!("region {region} failed: {e}");
                report.failures.push((region, e));
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(directory) = output_dir {
        if report.rows.is_empty() {
            warn!("no region produced a forecast; skipping the combined file");
        } else {
            report
                .files
                .push(write_combined_file(directory, config, &mut report.rows)?);
        }
        report.files.push(write_metadata(directory, config)?);
    }
    info!(
        "{} regions forecast, {} failed",
        regions.len() - report.failures.len(),
        report.failures.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::mapper::tests::{fit_result, linear_model, FixedEnsemble};
    use crate::forecast::output::{combined_file_name, metadata_file_name, read_rows};
    use crate::model::{AgeStructuredModel, FitResult, FittedModel};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    /// Every state but Idaho has the linear model.
    struct LinearSource;

    impl InferenceSource for LinearSource {
        fn mle_model(&self, region: &Region) -> Result<FittedModel, ForecastError> {
            if region.to_string() == "16" {
                return Err(ForecastError::data_unavailable(region, "no fit"));
            }
            Ok(linear_model(10.0))
        }

        fn fit_result(&self, _: &Region) -> Result<FitResult, ForecastError> {
            Ok(fit_result())
        }

        fn age_model(&self, region: &Region) -> Result<AgeStructuredModel, ForecastError> {
            Err(ForecastError::data_unavailable(region, "no age model"))
        }

        fn regions(&self) -> Result<Vec<Region>, ForecastError> {
            ["06", "16", "36"].iter().map(|code| Region::parse(code)).collect()
        }
    }

    fn config() -> ForecastConfig {
        let mut config = ForecastConfig::for_date(NaiveDate::from_ymd_opt(2020, 6, 3).unwrap());
        config.num_threads = Some(2);
        config
    }

    #[test]
    fn failures_are_isolated_to_their_region() {
        let runner = FixedEnsemble::new(linear_model(10.0), vec![2.0, 3.0]);
        let regions = LinearSource.regions().unwrap();
        let directory = tempdir().unwrap();
        let config = config();

        let report =
            run_all(&regions, &LinearSource, &runner, &config, Some(directory.path())).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0.to_string(), "16");
        assert!(report.rows.iter().all(|row| row.location != "16"));
        assert!(report.rows.iter().any(|row| row.location == "06"));
        assert!(report.rows.iter().any(|row| row.location == "36"));
        assert_eq!(report.files.len(), 4);

        let combined = read_rows(&directory.path().join(combined_file_name(&config))).unwrap();
        assert_eq!(combined, report.rows);
        assert!(directory.path().join(metadata_file_name(&config)).is_file());
    }

    #[test]
    fn malformed_ensemble_members_do_not_abort_the_batch() {
        let mut truncated = linear_model(10.0);
        truncated
            .compartments
            .insert("total_deaths_per_day".to_string(), vec![10.0; 5]);
        let runner = FixedEnsemble::new(truncated, vec![1.0]);
        let regions = [Region::parse("06").unwrap(), Region::parse("36").unwrap()];

        let report = run_all(&regions, &LinearSource, &runner, &config(), None).unwrap();
        assert!(report.failures.is_empty());
        assert!(report.rows.iter().any(|row| row.location == "06"));
        assert!(report.rows.iter().any(|row| row.location == "36"));
    }

    #[test]
    fn configuration_errors_abort_the_batch() {
        let runner = FixedEnsemble::new(linear_model(10.0), vec![1.0]);
        let regions = LinearSource.regions().unwrap();
        let mut config = config();
        config.quantiles = vec![0.5, 1.5];
        assert!(matches!(
            run_all(&regions, &LinearSource, &runner, &config, None),
            Err(ForecastError::ConfigurationError(_))
        ));
    }

    #[test]
    fn single_region_without_output_writes_nothing() {
        let runner = FixedEnsemble::new(linear_model(10.0), vec![1.0]);
        let forecast = run_for_region(
            Region::parse("06").unwrap(),
            &LinearSource,
            &runner,
            &config(),
            None,
        )
        .unwrap();
        assert!(forecast.file.is_none());
        assert!(!forecast.rows.is_empty());
    }
}
