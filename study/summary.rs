use crate::rates::RateTable;
use ndarray::ArrayView2;
use serde::Serialize;

/// Box-plot statistics of the sampled average rates for a single year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: usize,
    pub mean: f64,
    pub min: f64,
    pub lower_quartile: f64,
    pub median: f64,
    pub upper_quartile: f64,
    pub max: f64,
    /// Smallest observation within 1.5 IQR below the lower quartile.
    pub lower_whisker: f64,
    /// Largest observation within 1.5 IQR above the upper quartile.
    pub upper_whisker: f64,
    /// Theoretical average rate for the same year.
    pub theory: f64,
    pub bias: f64,
}

const WHISKER_SPAN: f64 = 1.5;

/// Quantile of already sorted values, interpolating linearly between order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let below = position.floor() as usize;
            let above = position.ceil() as usize;
            let fraction = position - below as f64;
            sorted[below] + (sorted[above] - sorted[below]) * fraction
        }
    }
}

/// Summarises every year column of a `trials × years` matrix against the theory curve.
pub fn summarize_years(average_rates: ArrayView2<f64>, theory: &RateTable) -> Vec<YearSummary> {
    average_rates
        .columns()
        .into_iter()
        .zip(theory.rows())
        .enumerate()
        .map(|(year, (column, expected))| {
            let mut sorted = column.to_vec();
            sorted.sort_by(f64::total_cmp);

            let mean = column.mean().unwrap_or(f64::NAN);
            let lower_quartile = quantile(&sorted, 0.25);
            let upper_quartile = quantile(&sorted, 0.75);
            let reach = WHISKER_SPAN * (upper_quartile - lower_quartile);
            let lower_whisker = sorted
                .iter()
                .copied()
                .find(|&value| value >= lower_quartile - reach)
                .unwrap_or(f64::NAN);
            let upper_whisker = sorted
                .iter()
                .rev()
                .copied()
                .find(|&value| value <= upper_quartile + reach)
                .unwrap_or(f64::NAN);

            YearSummary {
                year,
                mean,
                min: sorted.first().copied().unwrap_or(f64::NAN),
                lower_quartile,
                median: quantile(&sorted, 0.5),
                upper_quartile,
                max: sorted.last().copied().unwrap_or(f64::NAN),
                lower_whisker,
                upper_whisker,
                theory: expected.average_rate,
                bias: mean - expected.average_rate,
            }
        })
        .collect()
}
