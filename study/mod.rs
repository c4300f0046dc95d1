//! Repeated cohort studies against a simulated population.
//!
//! A study elects many independent cohorts from one [`Database`] and records each
//! cohort's average onset-rate curve. The resulting `trials × years` matrix is the
//! raw material for comparing sampled curves with the theoretical one.

pub mod report;
pub mod summary;

use crate::database::{Database, DatabaseError};
use crate::rates::RateTable;
use itertools::iproduct;
use ndarray::{Array2, ArrayView2};
use polars::prelude::{DataFrame, NamedFrom, PolarsResult, Series};
use rand::Rng;
use summary::{YearSummary, summarize_years};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StudyError {
    #[error("A cohort study needs at least one repeat.")]
    NoRepeats,
    #[error("Cohort election failed: {0}")]
    Database(#[from] DatabaseError),
}

/// Observer for reporting incremental progress while a study runs.
pub trait StudyProgressObserver {
    fn on_study_start(&mut self, total_trials: usize) {
        let _ = total_trials;
    }
    fn on_trial_complete(&mut self, completed_trials: usize) {
        let _ = completed_trials;
    }
    fn on_study_finish(&mut self) {}
}

#[derive(Default)]
pub struct NoopStudyProgress;

impl StudyProgressObserver for NoopStudyProgress {}

/// One observation of the long-format study table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TidyRate {
    pub cohort_id: usize,
    pub year: usize,
    pub rate: f64,
}

/// Outcome of a repeated cohort study.
#[derive(Debug, Clone)]
pub struct CohortStudy {
    cohort_size: usize,
    average_rates: Array2<f64>,
    theory: RateTable,
}

/// Elects `repeats` cohorts of `cohort_size` patients and records their average rates.
///
/// Row `t` of the result holds the `averageRate` column of trial `t`'s onset table.
pub fn run_cohort_study<R, O>(
    database: &Database,
    cohort_size: usize,
    repeats: usize,
    rng: &mut R,
    observer: &mut O,
) -> Result<CohortStudy, StudyError>
where
    R: Rng,
    O: StudyProgressObserver + ?Sized,
{
    if repeats == 0 {
        return Err(StudyError::NoRepeats);
    }
    if cohort_size == 0 {
        return Err(DatabaseError::EmptyCohort.into());
    }

    log::info!(
        "Running {repeats} cohort trials of {cohort_size} patients over {} years",
        database.observation_years()
    );

    let mut average_rates = Array2::zeros((repeats, database.observation_years()));
    observer.on_study_start(repeats);
    for (trial, mut row) in average_rates.rows_mut().into_iter().enumerate() {
        let cohort = database.elect_cohort_with(cohort_size, rng)?;
        row.assign(&cohort.onset_rate_table().average_rates());
        observer.on_trial_complete(trial + 1);
    }
    observer.on_study_finish();

    Ok(CohortStudy {
        cohort_size,
        average_rates,
        theory: database.theoretical_rate_table(),
    })
}

impl CohortStudy {
    pub fn cohort_size(&self) -> usize {
        self.cohort_size
    }

    pub fn trial_count(&self) -> usize {
        self.average_rates.nrows()
    }

    pub fn observation_years(&self) -> usize {
        self.average_rates.ncols()
    }

    /// The `trials × years` matrix of average onset rates.
    pub fn average_rates(&self) -> ArrayView2<'_, f64> {
        self.average_rates.view()
    }

    /// Theoretical curve of the population the cohorts were drawn from.
    pub fn theory(&self) -> &RateTable {
        &self.theory
    }

    /// Long format: one row per `(cohort, year)`, ordered by cohort then year.
    pub fn tidy_rows(&self) -> Vec<TidyRate> {
        iproduct!(0..self.trial_count(), 0..self.observation_years())
            .map(|(cohort_id, year)| TidyRate {
                cohort_id,
                year,
                rate: self.average_rates[[cohort_id, year]],
            })
            .collect()
    }

    /// Long-format frame with the columns `cohortID`, `year` and `rate`.
    pub fn to_tidy_dataframe(&self) -> PolarsResult<DataFrame> {
        let rows = self.tidy_rows();
        let cohort_ids: Vec<u32> = rows.iter().map(|row| row.cohort_id as u32).collect();
        let years: Vec<u32> = rows.iter().map(|row| row.year as u32).collect();
        let rates: Vec<f64> = rows.iter().map(|row| row.rate).collect();
        DataFrame::new(vec![
            Series::new("cohortID".into(), cohort_ids).into(),
            Series::new("year".into(), years).into(),
            Series::new("rate".into(), rates).into(),
        ])
    }

    /// Distribution of the sampled average rates for every year.
    pub fn year_summaries(&self) -> Vec<YearSummary> {
        summarize_years(self.average_rates.view(), &self.theory)
    }
}
