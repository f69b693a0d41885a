use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use strum::IntoEnumIterator;

use seir_forecast::demographics::{
    parse_names, AgeDensity, CovidMeasure, CovidMeasureUnit, DemographicMapper, RiskModifiers,
    StepDensity,
};
use seir_forecast::store::{InferenceSource, JsonInferenceStore};
use seir_forecast::Region;

use crate::utils::read_json;

pub fn demographics(
    region_code: &str,
    data_dir: &Path,
    measure_names: &[String],
    unit_names: &[String],
    target_distribution: Option<&Path>,
    risk_modifiers: Option<&Path>,
) -> Result<()> {
    let region = Region::parse(region_code)?;
    let measures: Vec<CovidMeasure> = parse_names(measure_names)?;
    let units: Vec<CovidMeasureUnit> = if unit_names.is_empty() {
        CovidMeasureUnit::iter().collect()
    } else {
        parse_names(unit_names)?
    };
    let target = target_distribution
        .map(|path| read_json::<StepDensity>(path))
        .transpose()?
        .map(|density| Arc::new(density) as Arc<dyn AgeDensity>);
    let risk_modifiers = match risk_modifiers {
        Some(path) => RiskModifiers::from(read_json::<BTreeMap<CovidMeasure, StepDensity>>(path)?),
        None => RiskModifiers::new(),
    };

    let store = JsonInferenceStore::new(data_dir);
    let model = store.age_model(&region)?;
    let fit_result = store.fit_result(&region)?;
    let mapper = DemographicMapper::new(
        region,
        &model,
        &fit_result,
        &measures,
        &units,
        target,
        risk_modifiers,
    )?;
    let mapped = mapper.run()?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &mapped)?;
    writeln!(stdout)?;
    Ok(())
}
