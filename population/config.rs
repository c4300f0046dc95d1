use crate::database::{DatabaseError, validate_parameters};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Parameters of a population simulation and the cohort study run against it.
///
/// Serialised as a small human-editable TOML file. Missing keys fall back to the
/// defaults below, so a file may override only the values it cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub incidence: f64,
    pub patient_count: usize,
    pub observation_years: usize,
    pub cohort_size: usize,
    pub cohort_repeats: usize,
    /// Fixed seed for reproducible runs; absent means a fresh OS-seeded generator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            incidence: 0.010,
            patient_count: 10_000,
            observation_years: 10,
            cohort_size: 100,
            cohort_repeats: 100,
            seed: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid population parameters: {0}")]
    Population(#[from] DatabaseError),
    #[error("The cohort study must be repeated at least once.")]
    NoRepeats,
}

impl StudyConfig {
    /// Rejects parameters the simulation or the study would refuse later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_parameters(self.incidence, self.patient_count, self.observation_years)?;
        if self.cohort_size == 0 {
            return Err(DatabaseError::EmptyCohort.into());
        }
        if self.cohort_repeats == 0 {
            return Err(ConfigError::NoRepeats);
        }
        Ok(())
    }

    /// Random generator honouring `seed` when present.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        log::debug!("Loaded study configuration from {}", path.display());
        Ok(config)
    }
}
