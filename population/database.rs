//! The patient event database: a simulated population of onset histories.
//!
//! A [`Database`] owns a `patients × years` matrix produced by a two-stage cumulative
//! transform of independent yearly onset trials. Every view it hands out (rate tables,
//! the histogram layout, cohorts) is freshly computed; the database itself is never
//! mutated after construction.

use crate::rates::RateTable;
use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

/// Cumulative onset matrix with shape `(patient_count, observation_years)`.
pub type OnsetMatrix = Array2<u32>;

/// Validation failures raised before any matrix is built or sampled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatabaseError {
    #[error("Incidence must lie strictly between 0 and 1, but {0} was given.")]
    InvalidIncidence(f64),
    #[error("The patient count must be at least 1.")]
    EmptyPopulation,
    #[error("The number of observation years must be at least 1.")]
    EmptyHorizon,
    #[error("A cohort must contain at least one patient.")]
    EmptyCohort,
    #[error(
        "The supplied matrix has shape {found:?}, but ({expected_patients}, {expected_years}) was expected."
    )]
    ShapeMismatch {
        found: (usize, usize),
        expected_patients: usize,
        expected_years: usize,
    },
}

/// Checks the three scalar parameters shared by every database constructor.
pub fn validate_parameters(
    incidence: f64,
    patient_count: usize,
    observation_years: usize,
) -> Result<(), DatabaseError> {
    // Written as a positive range test so that NaN is rejected as well.
    if !(incidence > 0.0 && incidence < 1.0) {
        return Err(DatabaseError::InvalidIncidence(incidence));
    }
    if patient_count == 0 {
        return Err(DatabaseError::EmptyPopulation);
    }
    if observation_years == 0 {
        return Err(DatabaseError::EmptyHorizon);
    }
    Ok(())
}

/// Turns a matrix of uniform draws into the cumulative onset matrix.
///
/// The transform runs in three steps along the year axis of every row:
/// 1. a trigger fires wherever `incidence - u > 0`;
/// 2. the running sum of triggers is thresholded to a once-fired flag;
/// 3. the running sum of that flag is taken again.
///
/// The result is therefore zero before onset and counts the years since (and
/// including) the onset year afterwards. Later triggers after onset have no effect.
pub fn accumulate_onset(incidence: f64, uniforms: ArrayView2<f64>) -> OnsetMatrix {
    let mut cells = uniforms.mapv(|u| u32::from(incidence - u > 0.0));
    running_sum_along_years(&mut cells);
    cells.mapv_inplace(|count| u32::from(count >= 1));
    running_sum_along_years(&mut cells);
    cells
}

fn running_sum_along_years(cells: &mut OnsetMatrix) {
    cells.accumulate_axis_inplace(Axis(1), |&previous, current| *current += previous);
}

/// An immutable simulated population of patients observed over a fixed horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    incidence: f64,
    patient_count: usize,
    observation_years: usize,
    data: OnsetMatrix,
}

impl Database {
    /// Simulates a fresh population using the thread-local, unseeded generator.
    pub fn new(
        incidence: f64,
        patient_count: usize,
        observation_years: usize,
    ) -> Result<Self, DatabaseError> {
        Self::with_rng(
            incidence,
            patient_count,
            observation_years,
            &mut rand::rng(),
        )
    }

    /// Simulates a reproducible population from a fixed seed.
    pub fn seeded(
        incidence: f64,
        patient_count: usize,
        observation_years: usize,
        seed: u64,
    ) -> Result<Self, DatabaseError> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::with_rng(incidence, patient_count, observation_years, &mut rng)
    }

    /// Simulates a population drawing every uniform value from `rng`.
    ///
    /// Draws are taken in row-major order, one per `(patient, year)` cell.
    pub fn with_rng<R: Rng>(
        incidence: f64,
        patient_count: usize,
        observation_years: usize,
        rng: &mut R,
    ) -> Result<Self, DatabaseError> {
        validate_parameters(incidence, patient_count, observation_years)?;

        let uniforms = Array2::from_shape_simple_fn((patient_count, observation_years), || {
            rng.random::<f64>()
        });
        let data = accumulate_onset(incidence, uniforms.view());

        log::debug!(
            "Simulated {patient_count} patients over {observation_years} years at incidence {incidence}"
        );

        Ok(Self {
            incidence,
            patient_count,
            observation_years,
            data,
        })
    }

    /// Wraps an existing onset matrix. The matrix is copied, never aliased.
    pub fn from_matrix(
        incidence: f64,
        patient_count: usize,
        observation_years: usize,
        matrix: ArrayView2<u32>,
    ) -> Result<Self, DatabaseError> {
        validate_parameters(incidence, patient_count, observation_years)?;
        if matrix.dim() != (patient_count, observation_years) {
            return Err(DatabaseError::ShapeMismatch {
                found: matrix.dim(),
                expected_patients: patient_count,
                expected_years: observation_years,
            });
        }

        Ok(Self {
            incidence,
            patient_count,
            observation_years,
            data: matrix.to_owned(),
        })
    }

    pub fn incidence(&self) -> f64 {
        self.incidence
    }

    pub fn patient_count(&self) -> usize {
        self.patient_count
    }

    pub fn observation_years(&self) -> usize {
        self.observation_years
    }

    /// Read-only view of the cumulative onset matrix.
    pub fn data(&self) -> ArrayView2<'_, u32> {
        self.data.view()
    }

    /// Binarised onset matrix with every year column sorted ascending on its own.
    ///
    /// Patient identity is not preserved across columns; the layout stacks the
    /// onset patients at the bottom of each year for heatmap rendering.
    pub fn histogram_layout(&self) -> Array2<u8> {
        let mut layout = self.data.mapv(|cell| u8::from(cell > 0));
        for mut column in layout.columns_mut() {
            let onset = column.iter().filter(|&&flag| flag == 1).count();
            let healthy = column.len() - onset;
            for (row, flag) in column.iter_mut().enumerate() {
                *flag = u8::from(row >= healthy);
            }
        }
        layout
    }

    /// Elects a cohort of `size` patients using the thread-local generator.
    pub fn elect_cohort(&self, size: usize) -> Result<Database, DatabaseError> {
        self.elect_cohort_with(size, &mut rand::rng())
    }

    /// Elects a cohort of `size` patients, sampling rows with replacement.
    ///
    /// The same patient may appear several times, and `size` may exceed the
    /// population. The returned database owns a copy of the sampled rows.
    pub fn elect_cohort_with<R: Rng>(
        &self,
        size: usize,
        rng: &mut R,
    ) -> Result<Database, DatabaseError> {
        if size == 0 {
            return Err(DatabaseError::EmptyCohort);
        }

        let rows: Vec<usize> = (0..size)
            .map(|_| rng.random_range(0..self.patient_count))
            .collect();
        let data = self.data.select(Axis(0), &rows);

        log::trace!(
            "Elected cohort of {size} from {} patients",
            self.patient_count
        );

        Ok(Database {
            incidence: self.incidence,
            patient_count: size,
            observation_years: self.observation_years,
            data,
        })
    }

    /// Number of patients whose onset has occurred by each year.
    pub fn onset_counts(&self) -> Vec<usize> {
        self.data
            .columns()
            .into_iter()
            .map(|column| column.iter().filter(|&&cell| cell > 0).count())
            .collect()
    }

    /// Empirical onset rates observed in this population.
    pub fn onset_rate_table(&self) -> RateTable {
        let patients = self.patient_count as f64;
        RateTable::from_rates(
            self.onset_counts()
                .into_iter()
                .map(|count| count as f64 / patients),
        )
    }

    /// Closed-form expected onset rates for this database's incidence and horizon.
    pub fn theoretical_rate_table(&self) -> RateTable {
        RateTable::theoretical(self.incidence, self.observation_years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn accumulate_onset_counts_years_since_first_trigger() {
        let uniforms = array![
            [0.9, 0.2, 0.7, 0.1],
            [0.6, 0.8, 0.9, 0.7],
            [0.1, 0.1, 0.1, 0.1],
        ];
        let onset = accumulate_onset(0.5, uniforms.view());
        assert_eq!(onset, array![[0, 1, 2, 3], [0, 0, 0, 0], [1, 2, 3, 4]]);
    }

    #[test]
    fn draw_equal_to_incidence_does_not_trigger() {
        let uniforms = array![[0.25, 0.25, 0.2499]];
        let onset = accumulate_onset(0.25, uniforms.view());
        assert_eq!(onset, array![[0, 0, 1]]);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(
            Database::new(0.0, 10, 5).unwrap_err(),
            DatabaseError::InvalidIncidence(0.0)
        );
        assert_eq!(
            Database::new(1.0, 10, 5).unwrap_err(),
            DatabaseError::InvalidIncidence(1.0)
        );
        assert!(matches!(
            Database::new(f64::NAN, 10, 5),
            Err(DatabaseError::InvalidIncidence(_))
        ));
        assert_eq!(
            Database::new(0.1, 0, 5).unwrap_err(),
            DatabaseError::EmptyPopulation
        );
        assert_eq!(
            Database::new(0.1, 10, 0).unwrap_err(),
            DatabaseError::EmptyHorizon
        );
    }

    #[test]
    fn seeded_populations_are_reproducible() {
        let first = Database::seeded(0.05, 200, 8, 11).expect("database");
        let second = Database::seeded(0.05, 200, 8, 11).expect("database");
        assert_eq!(first, second);
    }

    #[test]
    fn rows_are_non_decreasing() {
        let database = Database::seeded(0.2, 500, 12, 3).expect("database");
        assert_eq!(database.data().dim(), (500, 12));
        for row in database.data().rows() {
            for pair in row.windows(2) {
                assert!(pair[0] <= pair[1]);
            }
        }
    }

    #[test]
    fn from_matrix_copies_and_checks_shape() {
        let matrix = array![[0, 1], [0, 0]];
        let database = Database::from_matrix(0.1, 2, 2, matrix.view()).expect("database");
        assert_eq!(database.data(), matrix.view());

        let err = Database::from_matrix(0.1, 3, 2, matrix.view()).unwrap_err();
        assert_eq!(
            err,
            DatabaseError::ShapeMismatch {
                found: (2, 2),
                expected_patients: 3,
                expected_years: 2,
            }
        );
    }

    #[test]
    fn histogram_layout_sorts_each_column() {
        let matrix = array![[0, 1, 2], [1, 2, 3], [0, 0, 1], [0, 0, 0]];
        let database = Database::from_matrix(0.1, 4, 3, matrix.view()).expect("database");
        let layout = database.histogram_layout();
        assert_eq!(
            layout,
            array![[0, 0, 0], [0, 0, 1], [0, 1, 1], [1, 1, 1]]
        );
    }

    #[test]
    fn onset_rate_table_divides_by_population() {
        let matrix = array![[0, 1, 2], [0, 0, 1], [0, 0, 0], [1, 2, 3]];
        let database = Database::from_matrix(0.1, 4, 3, matrix.view()).expect("database");
        let table = database.onset_rate_table();
        let rates: Vec<f64> = table.rows().iter().map(|row| row.rate).collect();
        assert_eq!(rates, vec![0.25, 0.5, 0.75]);
        for row in table.rows() {
            assert_abs_diff_eq!(row.average_rate, 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn cohort_rows_come_from_parent() {
        let database = Database::seeded(0.3, 50, 6, 5).expect("database");
        let mut rng = StdRng::seed_from_u64(9);
        let cohort = database
            .elect_cohort_with(120, &mut rng)
            .expect("cohort larger than population is allowed");

        assert_eq!(cohort.patient_count(), 120);
        assert_eq!(cohort.observation_years(), 6);
        assert_eq!(cohort.incidence(), 0.3);
        assert_eq!(cohort.data().dim(), (120, 6));
        for row in cohort.data().rows() {
            assert!(database.data().rows().into_iter().any(|parent| parent == row));
        }
    }

    #[test]
    fn empty_cohort_is_rejected() {
        let database = Database::seeded(0.3, 10, 3, 1).expect("database");
        assert_eq!(
            database.elect_cohort(0).unwrap_err(),
            DatabaseError::EmptyCohort
        );
    }
}
