use approx::assert_abs_diff_eq;
use cohortsim::config::StudyConfig;
use cohortsim::database::Database;
use cohortsim::study::report::{write_rate_table, write_tidy_study, write_year_summaries};
use cohortsim::study::{NoopStudyProgress, run_cohort_study};
use std::fs;
use tempfile::tempdir;

fn small_config() -> StudyConfig {
    StudyConfig {
        incidence: 0.05,
        patient_count: 2_000,
        observation_years: 8,
        cohort_size: 100,
        cohort_repeats: 40,
        seed: Some(31),
    }
}

#[test]
fn study_shape_matches_trials_by_years() {
    let config = small_config();
    let mut rng = config.rng();
    let database = Database::with_rng(
        config.incidence,
        config.patient_count,
        config.observation_years,
        &mut rng,
    )
    .expect("database");
    let study = run_cohort_study(
        &database,
        config.cohort_size,
        config.cohort_repeats,
        &mut rng,
        &mut NoopStudyProgress,
    )
    .expect("study");

    assert_eq!(study.trial_count(), 40);
    assert_eq!(study.observation_years(), 8);
    assert_eq!(study.average_rates().dim(), (40, 8));
    assert_eq!(study.tidy_rows().len(), 40 * 8);
    assert_eq!(study.year_summaries().len(), 8);
}

#[test]
fn seeded_studies_are_reproducible() {
    let run = || {
        let config = small_config();
        let mut rng = config.rng();
        let database = Database::with_rng(
            config.incidence,
            config.patient_count,
            config.observation_years,
            &mut rng,
        )
        .expect("database");
        run_cohort_study(&database, 25, 10, &mut rng, &mut NoopStudyProgress)
            .expect("study")
            .average_rates()
            .to_owned()
    };
    assert_eq!(run(), run());
}

#[test]
fn summaries_are_ordered_and_centred_near_theory() {
    let database = Database::seeded(0.1, 20_000, 5, 8).expect("database");
    let mut rng = small_config().rng();
    let study = run_cohort_study(&database, 2_000, 30, &mut rng, &mut NoopStudyProgress)
        .expect("study");

    for summary in study.year_summaries() {
        assert!(summary.min <= summary.lower_whisker);
        assert!(summary.lower_whisker <= summary.lower_quartile);
        assert!(summary.lower_quartile <= summary.median);
        assert!(summary.median <= summary.upper_quartile);
        assert!(summary.upper_quartile <= summary.upper_whisker);
        assert!(summary.upper_whisker <= summary.max);
        assert_abs_diff_eq!(summary.mean, summary.theory, epsilon = 0.02);
    }
}

#[test]
fn study_tables_are_written() {
    let config = small_config();
    let mut rng = config.rng();
    let database = Database::with_rng(0.02, 500, 4, &mut rng).expect("database");
    let study = run_cohort_study(&database, 50, 3, &mut rng, &mut NoopStudyProgress)
        .expect("study");
    let dir = tempdir().expect("tempdir");

    write_tidy_study(&dir.path().join("cohort_rates.tsv"), &study).expect("tidy");
    write_year_summaries(&dir.path().join("year_summary.tsv"), &study.year_summaries())
        .expect("summaries");
    write_rate_table(&dir.path().join("theory_rates.tsv"), study.theory()).expect("theory");

    let summary = fs::read_to_string(dir.path().join("year_summary.tsv")).expect("read");
    assert!(summary.starts_with("year\tmean\tmin\tlowerQuartile\tmedian"));
    assert_eq!(summary.lines().count(), 5);
}
