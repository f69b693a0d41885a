//! Per-age rates implied by an age-structured fit.
//!
//! The fit exposes compartment sizes and lifetime probabilities. The daily transition rates
//! between compartments are rebuilt from those parameters, and from them the two kinds of
//! measure:
//!
//! * `per_capita`: the probability that an infected person ultimately reaches a hospital stream,
//!   or dies in it, from competing exponential rates.
//! * `per_capita_day`: new daily events over the current size of the pool they come from.
//!
//! Pools that are empty at some time step contribute zero rather than NaN.

use crate::demographics::age::AgeSeries;
use crate::demographics::measure::{CovidMeasureUnit, HospitalizationStream, StreamTable, UnitTable};
use crate::error::ForecastError;
use crate::model::{AgeModelParameters, AgeStructuredModel, Compartment};
use crate::numeric::ratio_or_zero;
use crate::region::Region;

/// The fit's per-age parameters, each expanded to one value per age group.
struct AgeParameters {
    delta: Vec<f64>,
    hospitalization_rate_general: Vec<f64>,
    hospitalization_rate_icu: Vec<f64>,
    symptoms_to_hospital_days: Vec<f64>,
    fraction_icu_requiring_ventilator: Vec<f64>,
    mortality_rate_from_hospital: Vec<f64>,
    mortality_rate_no_general_beds: Vec<f64>,
    mortality_rate_from_icu: Vec<f64>,
    mortality_rate_no_icu_beds: Vec<f64>,
    mortality_rate_from_icu_vent: Vec<f64>,
    length_of_stay_general: Vec<f64>,
    length_of_stay_icu: Vec<f64>,
    length_of_stay_icu_vent: Vec<f64>,
}

impl AgeParameters {
    fn resolve(parameters: &AgeModelParameters) -> Result<Self, String> {
        let n = parameters.age_groups.len();
        Ok(Self {
            delta: parameters.delta.resolve("delta", n)?,
            hospitalization_rate_general: parameters
                .hospitalization_rate_general
                .resolve("hospitalization_rate_general", n)?,
            hospitalization_rate_icu: parameters
                .hospitalization_rate_icu
                .resolve("hospitalization_rate_icu", n)?,
            symptoms_to_hospital_days: parameters
                .symptoms_to_hospital_days
                .resolve("symptoms_to_hospital_days", n)?,
            fraction_icu_requiring_ventilator: parameters
                .fraction_icu_requiring_ventilator
                .resolve("fraction_icu_requiring_ventilator", n)?,
            mortality_rate_from_hospital: parameters
                .mortality_rate_from_hospital
                .resolve("mortality_rate_from_hospital", n)?,
            mortality_rate_no_general_beds: parameters
                .mortality_rate_no_general_beds
                .resolve("mortality_rate_no_general_beds", n)?,
            mortality_rate_from_icu: parameters
                .mortality_rate_from_icu
                .resolve("mortality_rate_from_ICU", n)?,
            mortality_rate_no_icu_beds: parameters
                .mortality_rate_no_icu_beds
                .resolve("mortality_rate_no_ICU_beds", n)?,
            mortality_rate_from_icu_vent: parameters
                .mortality_rate_from_icu_vent
                .resolve("mortality_rate_from_ICUVent", n)?,
            length_of_stay_general: parameters
                .hospitalization_length_of_stay_general
                .resolve("hospitalization_length_of_stay_general", n)?,
            length_of_stay_icu: parameters
                .hospitalization_length_of_stay_icu
                .resolve("hospitalization_length_of_stay_icu", n)?,
            length_of_stay_icu_vent: parameters
                .hospitalization_length_of_stay_icu_and_ventilator
                .resolve("hospitalization_length_of_stay_icu_and_ventilator", n)?,
        })
    }
}

/// Age-stratified trajectories the rates are built from.
struct Trajectories {
    infected: AgeSeries,
    asymptomatic: AgeSeries,
    hospital: StreamTable<AgeSeries>,
    /// Occupancy summed over age groups, compared against bed capacity.
    occupancy_general: Vec<f64>,
    occupancy_icu: Vec<f64>,
}

impl Trajectories {
    fn load(region: &Region, model: &AgeStructuredModel) -> Result<Self, ForecastError> {
        let by_age = |compartment: Compartment| {
            model
                .by_age(compartment)
                .map(|rows| AgeSeries::from_rows(rows.to_vec()))
                .ok_or_else(|| {
                    ForecastError::data_unavailable(
                        region,
                        format!("no age-stratified `{compartment}` trajectory"),
                    )
                })
        };
        let hospital = StreamTable::try_from_fn(|stream| {
            by_age(match stream {
                HospitalizationStream::HGen => Compartment::HGen,
                HospitalizationStream::HICU => Compartment::HICU,
                HospitalizationStream::HVent => Compartment::HVent,
            })
        })?;
        let occupancy = |compartment: Compartment, series: &AgeSeries| {
            model.aggregate(compartment).map_or_else(
                || series.collapse(&vec![1.0; series.n_ages()]),
                <[f64]>::to_vec,
            )
        };
        Ok(Self {
            infected: by_age(Compartment::I)?,
            asymptomatic: by_age(Compartment::A)?,
            occupancy_general: occupancy(Compartment::HGen, &hospital.hgen),
            occupancy_icu: occupancy(Compartment::HICU, &hospital.hicu),
            hospital,
        })
    }
}

/// Per-age hospitalization and mortality measures for every requested unit, with the prevalence
/// used to turn per-infected measures into per-population ones.
#[derive(Clone, Debug, PartialEq)]
pub struct RateTables {
    pub hospitalization: UnitTable<StreamTable<AgeSeries>>,
    pub mortality: UnitTable<StreamTable<AgeSeries>>,
    /// Infected fraction of each age group, `(I + A) / N`.
    pub prevalence: AgeSeries,
}

impl RateTables {
    /// # Errors
    ///
    /// Returns [`ForecastError::DataUnavailable`] if the fit lacks an age-stratified trajectory or
    /// a per-age parameter has the wrong number of groups.
    pub fn reconstruct(
        region: &Region,
        model: &AgeStructuredModel,
        units: &[CovidMeasureUnit],
    ) -> Result<Self, ForecastError> {
        let parameters = AgeParameters::resolve(&model.parameters)
            .map_err(|reason| ForecastError::data_unavailable(region, reason))?;
        let trajectories = Trajectories::load(region, model)?;
        let n_ages = model.n_age_groups();
        let n_times = model.t_list.len();

        let mortality_rates =
            mortality_rates(&parameters, &model.parameters, &trajectories, n_times);
        let hospitalization_rates = hospitalization_rates(&parameters);
        let recovery_rates = recovery_rates(&parameters, &mortality_rates);
        let infected_pool = trajectories
            .infected
            .zip_with(&trajectories.asymptomatic, |i, a| i + a);
        let symptomatic_fraction = trajectories
            .infected
            .zip_with(&infected_pool, ratio_or_zero);

        let mut hospitalization = UnitTable::default();
        let mut mortality = UnitTable::default();
        for &unit in units {
            let hospitalized = StreamTable::from_fn(|stream| {
                let rate = &hospitalization_rates[stream];
                match unit {
                    CovidMeasureUnit::PerCapita => symptomatic_fraction.map(|age, fraction| {
                        let total_rate_out_of_infected = parameters.delta[age]
                            + hospitalization_rates.hgen[age]
                            + hospitalization_rates.hicu[age]
                            + hospitalization_rates.hvent[age];
                        ratio_or_zero(rate[age], total_rate_out_of_infected) * fraction
                    }),
                    CovidMeasureUnit::PerCapitaDay => {
                        symptomatic_fraction.map(|age, fraction| rate[age] * fraction)
                    }
                }
            });
            let died = match unit {
                CovidMeasureUnit::PerCapita => StreamTable::from_fn(|stream| {
                    let probability = mortality_rates[stream]
                        .zip_with(&recovery_rates[stream], |m, r| ratio_or_zero(m, m + r));
                    probability.zip_with(&hospitalized[stream], |p, h| p * h)
                }),
                CovidMeasureUnit::PerCapitaDay => {
                    let pool = AgeSeries::sum([
                        &infected_pool,
                        &trajectories.hospital.hgen,
                        &trajectories.hospital.hicu,
                        &trajectories.hospital.hvent,
                    ])
                    .unwrap_or_else(|| AgeSeries::from_fn(n_ages, n_times, |_, _| 0.0));
                    StreamTable::from_fn(|stream| {
                        let deaths = mortality_rates[stream]
                            .zip_with(&trajectories.hospital[stream], |m, h| m * h);
                        deaths.zip_with(&pool, ratio_or_zero)
                    })
                }
            };
            hospitalization.insert(unit, hospitalized);
            mortality.insert(unit, died);
        }

        let population = &model.parameters.population;
        let prevalence =
            infected_pool.map(|age, infected| ratio_or_zero(infected, population[age]));

        Ok(Self {
            hospitalization,
            mortality,
            prevalence,
        })
    }
}

/// Daily death rate in each stream. The general and ICU rates switch to their no-bed values at
/// every time step where aggregate occupancy strictly exceeds capacity.
fn mortality_rates(
    p: &AgeParameters,
    model: &AgeModelParameters,
    trajectories: &Trajectories,
    n_times: usize,
) -> StreamTable<AgeSeries> {
    let n_ages = p.delta.len();
    StreamTable {
        hgen: AgeSeries::from_fn(n_ages, n_times, |age, time| {
            let rate = if trajectories.occupancy_general[time] > model.beds_general {
                p.mortality_rate_no_general_beds[age]
            } else {
                p.mortality_rate_from_hospital[age]
            };
            rate / p.length_of_stay_general[age]
        }),
        hicu: AgeSeries::from_fn(n_ages, n_times, |age, time| {
            let rate = if trajectories.occupancy_icu[time] > model.beds_icu {
                p.mortality_rate_no_icu_beds[age]
            } else {
                p.mortality_rate_from_icu[age]
            };
            (1.0 - p.fraction_icu_requiring_ventilator[age]) * rate / p.length_of_stay_icu[age]
        }),
        hvent: AgeSeries::from_fn(n_ages, n_times, |age, _| {
            p.mortality_rate_from_icu_vent[age] / p.length_of_stay_icu_vent[age]
        }),
    }
}

/// Daily admission rate from the symptomatic pool into each stream.
fn hospitalization_rates(p: &AgeParameters) -> StreamTable<Vec<f64>> {
    let general = p
        .hospitalization_rate_general
        .iter()
        .zip(&p.hospitalization_rate_icu)
        .zip(&p.symptoms_to_hospital_days)
        .map(|((general, icu), days)| (general - icu) / days)
        .collect();
    let icu: Vec<f64> = p
        .hospitalization_rate_icu
        .iter()
        .zip(&p.symptoms_to_hospital_days)
        .map(|(icu, days)| icu / days)
        .collect();
    let ventilator = icu
        .iter()
        .zip(&p.fraction_icu_requiring_ventilator)
        .map(|(icu, fraction)| icu * fraction)
        .collect();
    StreamTable {
        hgen: general,
        hicu: icu,
        hvent: ventilator,
    }
}

/// Daily discharge rate of survivors in each stream.
fn recovery_rates(p: &AgeParameters, mortality: &StreamTable<AgeSeries>) -> StreamTable<AgeSeries> {
    StreamTable {
        hgen: mortality
            .hgen
            .map(|age, m| (1.0 - m) / p.length_of_stay_general[age]),
        hicu: mortality.hicu.map(|age, m| {
            (1.0 - m) * (1.0 - p.fraction_icu_requiring_ventilator[age]) / p.length_of_stay_icu[age]
        }),
        hvent: mortality.hicu.map(|age, m| {
            (1.0 - m.max(p.mortality_rate_from_icu_vent[age])) / p.length_of_stay_icu_vent[age]
        }),
    }
}
