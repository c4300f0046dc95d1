//! Tab-separated outputs and console banners for simulations and studies.

use super::CohortStudy;
use super::summary::YearSummary;
use crate::database::Database;
use crate::rates::RateTable;
use ndarray::ArrayView2;
use polars::prelude::{
    Column, CsvWriter, DataFrame, NamedFrom, PolarsError, SerWriter, Series,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Error from the underlying Polars library: {0}")]
    Polars(#[from] PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn write_tsv(path: &Path, frame: &mut DataFrame) -> Result<(), ReportError> {
    let file = BufWriter::new(File::create(path)?);
    CsvWriter::new(file)
        .include_header(true)
        .with_separator(b'\t')
        .finish(frame)?;
    log::info!("Wrote {} rows to {}", frame.height(), path.display());
    Ok(())
}

pub fn write_rate_table(path: &Path, table: &RateTable) -> Result<(), ReportError> {
    write_tsv(path, &mut table.to_dataframe()?)
}

pub fn write_tidy_study(path: &Path, study: &CohortStudy) -> Result<(), ReportError> {
    write_tsv(path, &mut study.to_tidy_dataframe()?)
}

pub fn year_summary_dataframe(summaries: &[YearSummary]) -> Result<DataFrame, PolarsError> {
    let column = |name: &str, pick: fn(&YearSummary) -> f64| -> Column {
        let values: Vec<f64> = summaries.iter().map(pick).collect();
        Series::new(name.into(), values).into()
    };
    let years: Vec<u32> = summaries.iter().map(|summary| summary.year as u32).collect();

    DataFrame::new(vec![
        Series::new("year".into(), years).into(),
        column("mean", |s| s.mean),
        column("min", |s| s.min),
        column("lowerQuartile", |s| s.lower_quartile),
        column("median", |s| s.median),
        column("upperQuartile", |s| s.upper_quartile),
        column("max", |s| s.max),
        column("lowerWhisker", |s| s.lower_whisker),
        column("upperWhisker", |s| s.upper_whisker),
        column("theory", |s| s.theory),
        column("bias", |s| s.bias),
    ])
}

pub fn write_year_summaries(path: &Path, summaries: &[YearSummary]) -> Result<(), ReportError> {
    write_tsv(path, &mut year_summary_dataframe(summaries)?)
}

/// Writes the histogram layout with one `yearN` column per observation year.
pub fn write_histogram_layout(path: &Path, layout: ArrayView2<u8>) -> Result<(), ReportError> {
    let columns: Vec<Column> = layout
        .columns()
        .into_iter()
        .enumerate()
        .map(|(year, flags)| {
            let values: Vec<u32> = flags.iter().map(|&flag| u32::from(flag)).collect();
            Series::new(format!("year{year}").into(), values).into()
        })
        .collect();
    write_tsv(path, &mut DataFrame::new(columns)?)
}

pub fn population_banner(database: &Database) -> String {
    format!(
        "Population patients={} incidence={} observation years={}",
        database.patient_count(),
        database.incidence(),
        database.observation_years()
    )
}

pub fn study_banner(study: &CohortStudy) -> String {
    format!(
        "Cohort patients={} cohort repeats={}",
        study.cohort_size(),
        study.trial_count()
    )
}
