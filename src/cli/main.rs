mod demographics_command;
mod forecast_command;
mod metadata_command;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "seir-forecast")]
#[command(about = "Quantile forecasts and demographic re-weighting for fitted SEIR models")]
struct Cli {
    /// Log level specification, e.g. `info` or `warn,seir_forecast::forecast=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by the commands that need a run configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// JSON run configuration; defaults apply to omitted fields
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Forecast date, overriding the configuration (YYYY-MM-DD)
    #[arg(long)]
    pub forecast_date: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast deaths and hospitalizations and write the submission files
    Forecast {
        /// Directory with one subdirectory of fits per region
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Directory for the submission files; nothing is written without it
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Region codes to forecast; defaults to every state with a fit
        #[arg(short, long, value_delimiter = ',')]
        regions: Vec<String>,

        /// Worker threads, overriding the configuration
        #[arg(short, long)]
        threads: Option<usize>,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Write only the metadata file for a run
    Metadata {
        #[arg(short, long)]
        output_dir: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Re-weight a region's age-structured fit and print the result as JSON
    Demographics {
        /// Region code
        region: String,

        /// Directory with one subdirectory of fits per region
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Measures to compute, e.g. `IFR,hospitalization`
        #[arg(short, long, value_delimiter = ',')]
        measures: Vec<String>,

        /// Measure units; defaults to `per_capita,per_capita_day`
        #[arg(short, long, value_delimiter = ',')]
        units: Vec<String>,

        /// JSON step density of the target population's ages
        #[arg(long)]
        target_distribution: Option<PathBuf>,

        /// JSON map from measure name to a step density of relative risk
        #[arg(long)]
        risk_modifiers: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Forecast {
            data_dir,
            output_dir,
            regions,
            threads,
            config,
        } => forecast_command::forecast(
            &data_dir,
            output_dir.as_deref(),
            &regions,
            threads,
            &config,
        ),
        Commands::Metadata { output_dir, config } => {
            metadata_command::metadata(&output_dir, &config)
        }
        Commands::Demographics {
            region,
            data_dir,
            measures,
            units,
            target_distribution,
            risk_modifiers,
        } => demographics_command::demographics(
            &region,
            &data_dir,
            &measures,
            &units,
            target_distribution.as_deref(),
            risk_modifiers.as_deref(),
        ),
    }
}
