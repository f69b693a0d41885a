//! The calendar window a submission covers.
//!
//! Epi weeks run Sunday through Saturday. The horizon is `horizon_weeks` whole epi weeks starting
//! at the next epi week; a forecast made on a Sunday or Monday anchors to the week that contains
//! it instead. Dates on or before the forecast date are dropped.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::forecast::target::ForecastTimeUnit;

/// The first day of the epi week the horizon starts with.
#[must_use]
pub fn next_epi_week_start(forecast_date: NaiveDate) -> NaiveDate {
    let days_since_sunday = forecast_date.weekday().num_days_from_sunday();
    let week_start = forecast_date - Days::new(u64::from(days_since_sunday));
    if days_since_sunday <= 1 {
        week_start
    } else {
        week_start + Days::new(7)
    }
}

/// One column of a forecast: the label `n` in `"<n> <unit> ahead <target>"`, the date it is for,
/// and its index into [`ForecastHorizon::dates`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HorizonStep {
    pub steps_ahead: i64,
    pub target_end_date: NaiveDate,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForecastHorizon {
    forecast_date: NaiveDate,
    dates: Vec<NaiveDate>,
    days_since_reference: Vec<f64>,
}

impl ForecastHorizon {
    #[must_use]
    pub fn new(forecast_date: NaiveDate, horizon_weeks: u32, reference_date: NaiveDate) -> Self {
        let start = next_epi_week_start(forecast_date);
        let dates: Vec<NaiveDate> = (0..u64::from(horizon_weeks) * 7)
            .map(|offset| start + Days::new(offset))
            .filter(|date| *date > forecast_date)
            .collect();
        let days_since_reference = dates
            .iter()
            .map(|date| (*date - reference_date).num_days() as f64)
            .collect();
        Self {
            forecast_date,
            dates,
            days_since_reference,
        }
    }

    #[must_use]
    pub fn forecast_date(&self) -> NaiveDate {
        self.forecast_date
    }

    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The horizon dates as days since the reference date, the time axis trajectories are
    /// interpolated onto.
    #[must_use]
    pub fn days_since_reference(&self) -> &[f64] {
        &self.days_since_reference
    }

    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Daily steps are labelled by days after the forecast date. Weekly steps are the Saturdays
    /// in the horizon, labelled 1, 2, ... in order.
    #[must_use]
    pub fn steps(&self, unit: ForecastTimeUnit) -> Vec<HorizonStep> {
        match unit {
            ForecastTimeUnit::Day => self
                .dates
                .iter()
                .enumerate()
                .map(|(index, date)| HorizonStep {
                    steps_ahead: (*date - self.forecast_date).num_days(),
                    target_end_date: *date,
                    index,
                })
                .collect(),
            ForecastTimeUnit::Week => self
                .dates
                .iter()
                .enumerate()
                .filter(|(_, date)| date.weekday() == Weekday::Sat)
                .zip(1..)
                .map(|((index, date), week)| HorizonStep {
                    steps_ahead: week,
                    target_end_date: *date,
                    index,
                })
                .collect(),
        }
    }
}
