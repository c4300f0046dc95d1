// ========================================================================================
//
//                      THE STUDY ORCHESTRATOR: COHORTSIM
//
// ========================================================================================
//
// This binary is a thin conductor over the library. It resolves parameters from an
// optional TOML file and command-line flags, builds the simulated population, drives
// cohort studies, and hands every table to the report writers. No simulation logic
// lives here.

use clap::{Args, CommandFactory, Parser, Subcommand};
use cohortsim::config::StudyConfig;
use cohortsim::database::Database;
use cohortsim::rates::RateTable;
use cohortsim::study::report::{
    population_banner, study_banner, write_histogram_layout, write_rate_table,
    write_tidy_study, write_year_summaries,
};
use cohortsim::study::{StudyProgressObserver, run_cohort_study};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser)]
#[command(
    name = "cohortsim",
    version,
    about = "Simulate disease onset in a synthetic population and study cohort sampling."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a population and write its onset, theory and histogram tables
    #[command(about = "Simulate a population (outputs: onset_rates.tsv, theory_rates.tsv, histogram.tsv)")]
    Simulate {
        #[command(flatten)]
        population: PopulationArgs,

        /// Directory receiving the output tables
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Repeatedly elect cohorts and compare their onset curves with theory
    #[command(about = "Run a repeated cohort study (outputs: cohort_rates.tsv, year_summary.tsv, theory_rates.tsv)")]
    Study {
        #[command(flatten)]
        population: PopulationArgs,

        /// Number of patients elected into every cohort
        #[arg(long)]
        cohort_size: Option<usize>,

        /// Number of cohorts to elect
        #[arg(long)]
        repeats: Option<usize>,

        /// Directory receiving the output tables
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Print the theoretical onset curve without sampling anything
    Theory {
        /// Yearly probability that a disease-free patient develops onset
        #[arg(long, default_value = "0.01")]
        incidence: f64,

        /// Length of the observation horizon in years
        #[arg(long, default_value = "10")]
        years: usize,
    },

    /// Write a configuration file holding the default parameters
    InitConfig {
        /// Destination of the TOML file
        #[arg(default_value = "cohortsim.toml")]
        path: PathBuf,
    },
}

#[derive(Args)]
struct PopulationArgs {
    /// TOML file with default parameters; flags below take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Yearly probability that a disease-free patient develops onset
    #[arg(long)]
    incidence: Option<f64>,

    /// Number of patients in the simulated population
    #[arg(long)]
    patients: Option<usize>,

    /// Length of the observation horizon in years
    #[arg(long)]
    years: Option<usize>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

impl PopulationArgs {
    fn resolve(&self) -> Result<StudyConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => StudyConfig::load(path)?,
            None => StudyConfig::default(),
        };
        if let Some(incidence) = self.incidence {
            config.incidence = incidence;
        }
        if let Some(patients) = self.patients {
            config.patient_count = patients;
        }
        if let Some(years) = self.years {
            config.observation_years = years;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let start_time = Instant::now();

    let result = match cli.command {
        Some(Commands::Simulate {
            population,
            out_dir,
        }) => run_simulate(&population, &out_dir),
        Some(Commands::Study {
            population,
            cohort_size,
            repeats,
            out_dir,
        }) => run_study(&population, cohort_size, repeats, &out_dir),
        Some(Commands::Theory { incidence, years }) => run_theory(incidence, years),
        Some(Commands::InitConfig { path }) => run_init_config(&path),
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    log::debug!("Finished in {:.2?}", start_time.elapsed());
}

fn build_population(config: &StudyConfig, rng: &mut StdRng) -> Result<Database, Box<dyn Error>> {
    let database = Database::with_rng(
        config.incidence,
        config.patient_count,
        config.observation_years,
        rng,
    )?;
    log::info!("{}", population_banner(&database));
    Ok(database)
}

fn run_simulate(population: &PopulationArgs, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let config = population.resolve()?;
    let database = build_population(&config, &mut config.rng())?;
    fs::create_dir_all(out_dir)?;

    write_rate_table(&out_dir.join("onset_rates.tsv"), &database.onset_rate_table())?;
    write_rate_table(
        &out_dir.join("theory_rates.tsv"),
        &database.theoretical_rate_table(),
    )?;
    write_histogram_layout(
        &out_dir.join("histogram.tsv"),
        database.histogram_layout().view(),
    )?;
    Ok(())
}

fn run_study(
    population: &PopulationArgs,
    cohort_size: Option<usize>,
    repeats: Option<usize>,
    out_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let mut config = population.resolve()?;
    if let Some(size) = cohort_size {
        config.cohort_size = size;
    }
    if let Some(repeats) = repeats {
        config.cohort_repeats = repeats;
    }
    config.validate()?;

    let mut rng = config.rng();
    let database = build_population(&config, &mut rng)?;

    let mut progress = BarProgress::default();
    let study = run_cohort_study(
        &database,
        config.cohort_size,
        config.cohort_repeats,
        &mut rng,
        &mut progress,
    )?;
    log::info!("{}", study_banner(&study));

    let summaries = study.year_summaries();
    for summary in &summaries {
        log::info!(
            "year {:>2}: median {:.5} theory {:.5} bias {:+.5}",
            summary.year,
            summary.median,
            summary.theory,
            summary.bias
        );
    }

    fs::create_dir_all(out_dir)?;
    write_tidy_study(&out_dir.join("cohort_rates.tsv"), &study)?;
    write_year_summaries(&out_dir.join("year_summary.tsv"), &summaries)?;
    write_rate_table(&out_dir.join("theory_rates.tsv"), study.theory())?;
    Ok(())
}

fn run_theory(incidence: f64, years: usize) -> Result<(), Box<dyn Error>> {
    cohortsim::database::validate_parameters(incidence, 1, years)?;
    let frame = RateTable::theoretical(incidence, years).to_dataframe()?;
    println!("{frame}");
    Ok(())
}

fn run_init_config(path: &Path) -> Result<(), Box<dyn Error>> {
    StudyConfig::default().save(path)?;
    eprintln!("> Wrote default configuration to {}", path.display());
    Ok(())
}

/// Renders study progress as a terminal bar.
#[derive(Default)]
struct BarProgress {
    bar: Option<ProgressBar>,
}

impl StudyProgressObserver for BarProgress {
    fn on_study_start(&mut self, total_trials: usize) {
        let bar = ProgressBar::new(total_trials as u64);
        match ProgressStyle::with_template(">  - Cohorts [{bar:40.cyan/blue}] {pos}/{len} ({eta})") {
            Ok(style) => bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏ ")),
            Err(e) => log::warn!("Falling back to the default progress style: {e}"),
        }
        self.bar = Some(bar);
    }

    fn on_trial_complete(&mut self, completed_trials: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(completed_trials as u64);
        }
    }

    fn on_study_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
