use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use seir_forecast::log::{apply_log_levels, parse_log_levels};
use seir_forecast::ForecastConfig;

use crate::ConfigArgs;

/// Installs the `--log-level` specification. Without one, logging stays off.
pub fn init_logging(spec: Option<&str>) -> Result<()> {
    if let Some(spec) = spec {
        apply_log_levels(&parse_log_levels(spec)?);
    }
    Ok(())
}

/// The configuration file, or the defaults, with command line overrides applied.
pub fn load_config(args: &ConfigArgs) -> Result<ForecastConfig> {
    let mut config = match &args.config {
        Some(path) => ForecastConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ForecastConfig::default(),
    };
    if let Some(date) = args.forecast_date {
        config.forecast_date = date;
    }
    config.validate()?;
    Ok(config)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}
