use std::path::Path;

use anyhow::{bail, Result};

use seir_forecast::forecast::run_all;
use seir_forecast::log::info;
use seir_forecast::store::{InferenceSource, JsonInferenceStore};
use seir_forecast::Region;

use crate::utils::load_config;
use crate::ConfigArgs;

pub fn forecast(
    data_dir: &Path,
    output_dir: Option<&Path>,
    region_codes: &[String],
    threads: Option<usize>,
    config_args: &ConfigArgs,
) -> Result<()> {
    let mut config = load_config(config_args)?;
    if threads.is_some() {
        config.num_threads = threads;
    }

    let store = JsonInferenceStore::new(data_dir);
    let regions = if region_codes.is_empty() {
        store.regions()?
    } else {
        region_codes
            .iter()
            .map(|code| Region::parse(code))
            .collect::<Result<Vec<_>, _>>()?
    };
    if regions.is_empty() {
        bail!("no regions to forecast in {}", data_dir.display());
    }
    info!("forecasting {} as of {}", regions.len(), config.forecast_date);

    let report = run_all(&regions, &store, &store, &config, output_dir)?;
    for (region, error) in &report.failures {
        eprintln!("{region}: {error}");
    }
    if report.rows.is_empty() {
        bail!("every region failed");
    }
    for file in &report.files {
        println!("{}", file.display());
    }
    println!(
        "{} rows for {} of {} regions",
        report.rows.len(),
        regions.len() - report.failures.len(),
        regions.len()
    );
    Ok(())
}
