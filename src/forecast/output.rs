//! Submission rows and the files they are written to.
//!
//! Every region gets `<forecast_date>_<team>_<model>_<region>.csv`. A batch run also writes the
//! combined `<forecast_date>_<team>_<model>.csv`, sorted by the full column tuple, and a single
//! `metadata-<team>-<model>.txt` rendered from a `$placeholder` template.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ForecastConfig;
use crate::error::ForecastError;
use crate::forecast::horizon::ForecastHorizon;
use crate::region::Region;

const METADATA_TEMPLATE: &str = include_str!("metadata_template.txt");

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowType {
    Quantile,
    Point,
}

/// One line of a submission file. Fields are in column order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantileRow {
    pub forecast_date: NaiveDate,
    /// Two digit state code
    pub location: String,
    pub location_name: String,
    /// `"<n> <unit> ahead <target>"`
    pub target: String,
    pub target_end_date: NaiveDate,
    #[serde(rename = "type")]
    pub row_type: RowType,
    /// Three decimals, empty for point rows
    pub quantile: Option<String>,
    pub value: f64,
}

impl QuantileRow {
    fn compare(&self, other: &Self) -> Ordering {
        (
            self.forecast_date,
            &self.location,
            &self.location_name,
            &self.target,
            self.target_end_date,
            self.row_type,
            &self.quantile,
        )
            .cmp(&(
                other.forecast_date,
                &other.location,
                &other.location_name,
                &other.target,
                other.target_end_date,
                other.row_type,
                &other.quantile,
            ))
            .then_with(|| self.value.total_cmp(&other.value))
    }
}

/// Sorts rows by every column in column order.
pub fn sort_rows(rows: &mut [QuantileRow]) {
    rows.sort_by(QuantileRow::compare);
}

#[must_use]
pub fn region_file_name(config: &ForecastConfig, region: &Region) -> String {
    format!(
        "{}_{}_{}_{}.csv",
        config.forecast_date, config.team, config.model, region
    )
}

#[must_use]
pub fn combined_file_name(config: &ForecastConfig) -> String {
    format!("{}_{}_{}.csv", config.forecast_date, config.team, config.model)
}

#[must_use]
pub fn metadata_file_name(config: &ForecastConfig) -> String {
    format!("metadata-{}-{}.txt", config.team, config.model)
}

// Creates the file and all parent directories if they do not exist.
fn create_output_file(path: &Path, extension: &str) -> Result<File, ForecastError> {
    if path.extension().and_then(OsStr::to_str) != Some(extension) {
        return Err(ForecastError::configuration(format!(
            "output file {} must have extension .{extension}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// Writes `rows` with a header line.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_rows(path: &Path, rows: &[QuantileRow]) -> Result<(), ForecastError> {
    let file = create_output_file(path, "csv")?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a submission file back.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is malformed.
pub fn read_rows(path: &Path) -> Result<Vec<QuantileRow>, ForecastError> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<QuantileRow>, _>>()?;
    Ok(rows)
}

/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_region_file(
    directory: &Path,
    config: &ForecastConfig,
    region: &Region,
    rows: &[QuantileRow],
) -> Result<PathBuf, ForecastError> {
    let path = directory.join(region_file_name(config, region));
    write_rows(&path, rows)?;
    Ok(path)
}

/// Sorts `rows` and writes them as the combined submission.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_combined_file(
    directory: &Path,
    config: &ForecastConfig,
    rows: &mut [QuantileRow],
) -> Result<PathBuf, ForecastError> {
    sort_rows(rows);
    let path = directory.join(combined_file_name(config));
    write_rows(&path, rows)?;
    Ok(path)
}

/// Replaces `$name` and `${name}` with the value of `name`; `$$` is a literal `$`.
///
/// # Errors
///
/// Returns a configuration error naming an unknown or malformed placeholder.
pub fn substitute(template: &str, values: &[(&str, String)]) -> Result<String, ForecastError> {
    let lookup = |name: &str| {
        values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .ok_or_else(|| ForecastError::configuration(format!("unknown placeholder `${name}`")))
    };
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_';

    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(position) = rest.find('$') {
        output.push_str(&rest[..position]);
        let after = &rest[position + 1..];
        if let Some(remaining) = after.strip_prefix('$') {
            output.push('$');
            rest = remaining;
        } else if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| {
                ForecastError::configuration("unterminated `${` in template".to_string())
            })?;
            output.push_str(lookup(&braced[..end])?);
            rest = &braced[end + 1..];
        } else {
            let end = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
            if end == 0 {
                return Err(ForecastError::configuration(
                    "`$` must be followed by a placeholder name".to_string(),
                ));
            }
            output.push_str(lookup(&after[..end])?);
            rest = &after[end..];
        }
    }
    output.push_str(rest);
    Ok(output)
}

/// Renders the metadata file for a run with `config`.
///
/// # Errors
///
/// Returns a configuration error if the horizon is empty.
pub fn render_metadata(config: &ForecastConfig) -> Result<String, ForecastError> {
    let horizon = ForecastHorizon::new(
        config.forecast_date,
        config.horizon_weeks,
        config.reference_date,
    );
    let start = horizon
        .first_date()
        .ok_or_else(|| ForecastError::configuration("the forecast horizon is empty"))?;
    let model_targets: Vec<String> = config
        .units
        .iter()
        .flat_map(|unit| {
            config
                .targets
                .iter()
                .map(move |target| format!("{unit} ahead {target}"))
        })
        .collect();
    let target_names: Vec<&str> = config.targets.iter().map(|t| t.long_name()).collect();

    substitute(
        METADATA_TEMPLATE,
        &[
            ("Model_targets", model_targets.join(", ")),
            ("forecast_startdate", start.to_string()),
            ("Model_target_names", target_names.join(", ")),
            ("model_name", config.model.clone()),
            ("team_name", config.team.clone()),
        ],
    )
}

/// # Errors
///
/// Returns an error if the metadata cannot be rendered or written.
pub fn write_metadata(directory: &Path, config: &ForecastConfig) -> Result<PathBuf, ForecastError> {
    let path = directory.join(metadata_file_name(config));
    let metadata = render_metadata(config)?;
    let mut file = create_output_file(&path, "txt")?;
    file.write_all(metadata.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::target::{ForecastTimeUnit, Target};
    use tempfile::tempdir;

    fn config() -> ForecastConfig {
        ForecastConfig::for_date(NaiveDate::from_ymd_opt(2020, 6, 3).unwrap())
    }

    fn row(location: &str, target: &str, quantile: Option<&str>, value: f64) -> QuantileRow {
        QuantileRow {
            forecast_date: NaiveDate::from_ymd_opt(2020, 6, 3).unwrap(),
            location: location.to_string(),
            location_name: "Somewhere".to_string(),
            target: target.to_string(),
            target_end_date: NaiveDate::from_ymd_opt(2020, 6, 13).unwrap(),
            row_type: if quantile.is_some() {
                RowType::Quantile
            } else {
                RowType::Point
            },
            quantile: quantile.map(str::to_string),
            value,
        }
    }

    #[test]
    fn file_names() {
        let config = config();
        let region = Region::parse("06").unwrap();
        assert_eq!(
            region_file_name(&config, &region),
            "2020-06-03_CovidActNow_SEIR_CAN_06.csv"
        );
        assert_eq!(combined_file_name(&config), "2020-06-03_CovidActNow_SEIR_CAN.csv");
        assert_eq!(metadata_file_name(&config), "metadata-CovidActNow-SEIR_CAN.txt");
    }

    #[test]
    fn csv_columns_and_round_trip() {
        let dir = tempdir().unwrap();
        let rows = vec![
            row("06", "1 wk ahead inc death", Some("0.500"), 12.5),
            row("06", "1 wk ahead inc death", None, 12.0),
        ];
        let path = write_region_file(dir.path(), &config(), &Region::parse("06").unwrap(), &rows)
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "forecast_date,location,location_name,target,target_end_date,type,quantile,value"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2020-06-03,06,Somewhere,1 wk ahead inc death,2020-06-13,quantile,0.500,12.5"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2020-06-03,06,Somewhere,1 wk ahead inc death,2020-06-13,point,,12.0"
        );
        assert_eq!(read_rows(&path).unwrap(), rows);
    }

    #[test]
    fn combined_file_is_sorted() {
        let dir = tempdir().unwrap();
        let mut rows = vec![
            row("36", "1 wk ahead inc death", Some("0.500"), 3.0),
            row("06", "2 wk ahead inc death", Some("0.010"), 2.0),
            row("06", "1 wk ahead inc death", Some("0.500"), 1.0),
            row("06", "1 wk ahead inc death", Some("0.010"), 0.5),
        ];
        let path = write_combined_file(dir.path(), &config(), &mut rows).unwrap();
        let read = read_rows(&path).unwrap();
        let values: Vec<f64> = read.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![0.5, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn only_csv_files() {
        let dir = tempdir().unwrap();
        let result = write_rows(&dir.path().join("rows.tsv"), &[]);
        assert!(matches!(result, Err(ForecastError::ConfigurationError(_))));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cdc").join("rows.csv");
        write_rows(&path, &[row("06", "1 day ahead cum death", Some("0.500"), 1.0)]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn substitution() {
        let values = [("name", "SEIR".to_string()), ("team", "CAN".to_string())];
        assert_eq!(
            substitute("$team-${name}: $$5 $name.", &values).unwrap(),
            "CAN-SEIR: $5 SEIR."
        );
        assert!(substitute("$missing", &values).is_err());
        assert!(substitute("${name", &values).is_err());
        assert!(substitute("cost $ 5", &values).is_err());
    }

    #[test]
    fn metadata_lists_targets_and_start_date() {
        let mut config = config();
        config.targets = vec![Target::CumDeath, Target::IncHosp];
        config.units = vec![ForecastTimeUnit::Day, ForecastTimeUnit::Week];
        let metadata = render_metadata(&config).unwrap();
        assert!(metadata.contains("team_name: CovidActNow"));
        assert!(metadata.contains("model_abbr: CovidActNow-SEIR_CAN"));
        assert!(metadata.contains("forecast_startdate: 2020-06-07"));
        assert!(metadata.contains(
            "targets: day ahead cum death, day ahead inc hosp, wk ahead cum death, wk ahead inc hosp"
        ));
        assert!(metadata.contains("target_names: cumulative deaths, incident hospitalizations"));
        assert!(!metadata.contains('$'));

        let dir = tempdir().unwrap();
        let path = write_metadata(dir.path(), &config).unwrap();
        assert!(path.ends_with("metadata-CovidActNow-SEIR_CAN.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), metadata);
    }
}
