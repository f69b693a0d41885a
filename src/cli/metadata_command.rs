use std::path::Path;

use anyhow::Result;

use seir_forecast::forecast::output::write_metadata;

use crate::utils::load_config;
use crate::ConfigArgs;

pub fn metadata(output_dir: &Path, config_args: &ConfigArgs) -> Result<()> {
    let config = load_config(config_args)?;
    let path = write_metadata(output_dir, &config)?;
    println!("{}", path.display());
    Ok(())
}
