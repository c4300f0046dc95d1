use cohortsim::database::{Database, accumulate_onset};
use cohortsim::study::{NoopStudyProgress, run_cohort_study};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::Array2;
use rand::distr::StandardUniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const INCIDENCE: f64 = 0.01;
const OBSERVATION_YEARS: usize = 10;

fn random_uniforms(patients: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(0x5EED_0D5E + patients as u64);
    Array2::from_shape_fn((patients, OBSERVATION_YEARS), |_| {
        rng.sample(StandardUniform)
    })
}

fn benchmark_accumulate_onset(c: &mut Criterion) {
    let sizes = [1_000_usize, 10_000, 100_000];
    let inputs: Vec<_> = sizes
        .iter()
        .map(|&patients| (patients, random_uniforms(patients)))
        .collect();

    let mut group = c.benchmark_group("accumulate_onset");
    for (patients, uniforms) in inputs.iter() {
        group.throughput(Throughput::Elements((*patients * OBSERVATION_YEARS) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(patients), uniforms, |b, input| {
            b.iter(|| {
                let onset = accumulate_onset(black_box(INCIDENCE), black_box(input.view()));
                black_box(onset);
            });
        });
    }
    group.finish();
}

fn benchmark_cohort_study(c: &mut Criterion) {
    let database = Database::seeded(INCIDENCE, 10_000, OBSERVATION_YEARS, 7)
        .expect("benchmark population");

    c.bench_function("cohort_study_100x100", |b| {
        let mut rng = StdRng::seed_from_u64(11);
        b.iter(|| {
            let study = run_cohort_study(
                black_box(&database),
                100,
                100,
                &mut rng,
                &mut NoopStudyProgress,
            )
            .expect("study");
            black_box(study);
        });
    });
}

criterion_group!(population, benchmark_accumulate_onset, benchmark_cohort_study);
criterion_main!(population);
