use ndarray::Array1;
use polars::prelude::{DataFrame, NamedFrom, PolarsResult, Series};
use serde::{Deserialize, Serialize};
use std::iter;

/// One year of an onset-rate curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub year: usize,
    /// Fraction of the population with onset by this year.
    pub rate: f64,
    /// `rate` spread uniformly over the `year + 1` elapsed years.
    pub average_rate: f64,
}

impl RateRow {
    pub fn new(year: usize, rate: f64) -> Self {
        Self {
            year,
            rate,
            average_rate: rate / (year as f64 + 1.0),
        }
    }
}

/// A per-year onset-rate curve, empirical or theoretical.
///
/// Rows are numbered `0..len` in order. Tables are recomputed on demand and are
/// never stored on the database they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    rows: Vec<RateRow>,
}

impl RateTable {
    /// Builds a table from raw rates, one per consecutive year starting at 0.
    pub fn from_rates(rates: impl IntoIterator<Item = f64>) -> Self {
        let rows = rates
            .into_iter()
            .enumerate()
            .map(|(year, rate)| RateRow::new(year, rate))
            .collect();
        Self { rows }
    }

    /// Expected cumulative onset under a constant yearly hazard.
    ///
    /// `rate[0] = incidence` and every later year exposes the remaining disease-free
    /// fraction to the same incidence: `rate[i] = rate[i-1] + (1 - rate[i-1]) * incidence`.
    pub fn theoretical(incidence: f64, observation_years: usize) -> Self {
        Self::from_rates(
            iter::successors(Some(incidence), |previous| {
                Some(previous + (1.0 - previous) * incidence)
            })
            .take(observation_years),
        )
    }

    pub fn rows(&self) -> &[RateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rates(&self) -> Array1<f64> {
        self.rows.iter().map(|row| row.rate).collect()
    }

    pub fn average_rates(&self) -> Array1<f64> {
        self.rows.iter().map(|row| row.average_rate).collect()
    }

    /// Plot-ready frame with the columns `year`, `rate` and `averageRate`.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let years: Vec<u32> = self.rows.iter().map(|row| row.year as u32).collect();
        DataFrame::new(vec![
            Series::new("year".into(), years).into(),
            Series::new("rate".into(), self.rates().to_vec()).into(),
            Series::new("averageRate".into(), self.average_rates().to_vec()).into(),
        ])
    }
}
