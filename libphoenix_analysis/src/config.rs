use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::DEFAULT_HEADER_CUT;
use super::error::ConfigError;
use super::iteration::CombineMethod;

/// Structure representing the analysis configuration. Contains pathing,
/// discovery patterns, and aggregation settings for one report run.
/// Configs are serializable and deserializable to YAML using serde and serde_yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the measurement phase (contains the collections).
    pub phase_path: PathBuf,
    /// Output path of the phase report PDF.
    pub report_path: PathBuf,
    /// Directory holding the Geant4 simulation CSV output, if any.
    pub sim_data_path: Option<PathBuf>,
    /// Output path of the simulation report PDF.
    pub sim_report_path: Option<PathBuf>,
    /// Number of header lines in an acquisition file before the data rows.
    pub header_cut: usize,
    /// Iteration combination method.
    pub combine_method: CombineMethod,
    /// Name prefix of collection directories.
    pub collection_prefix: String,
    /// Name prefix of dynamically discovered material sample directories.
    pub material_prefix: String,
    /// Fixed exposure conditions expected in every collection.
    pub exposures: Vec<String>,
    /// The exposure used as the reference when baseline-subtracting.
    pub baseline_exposure: String,
    /// Directory entries that are never treated as samples.
    pub ignore: Vec<String>,
    /// Free-text description placed on the report title pages.
    pub report_description: String,
}

impl Default for Config {
    /// Generate a new Config object with the standard Project Phoenix layout
    /// and an invalid phase path.
    fn default() -> Self {
        Self {
            phase_path: PathBuf::from("None"),
            report_path: PathBuf::from("report1.pdf"),
            sim_data_path: None,
            sim_report_path: None,
            header_cut: DEFAULT_HEADER_CUT,
            combine_method: CombineMethod::MeanWeighted,
            collection_prefix: String::from("Coll"),
            material_prefix: String::from("LiF"),
            exposures: vec![
                String::from("BL"),
                String::from("AM"),
                String::from("H2O"),
            ],
            baseline_exposure: String::from("BL"),
            ignore: vec![String::from("power.txt")],
            report_description: String::new(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file.
    /// Returns a Config if successful.
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check that the phase directory exists.
    pub fn does_phase_exist(&self) -> bool {
        self.phase_path.exists()
    }

    /// The name of the phase (campaign), taken from the directory name.
    pub fn phase_name(&self) -> String {
        self.phase_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("phase"))
    }

    /// Path of one collection directory.
    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.phase_path.join(collection)
    }

    /// Path of one sample/exposure directory within a collection.
    pub fn sample_dir(&self, collection: &str, sample: &str) -> PathBuf {
        self.collection_dir(collection).join(sample)
    }

    /// Path of the laser power reading for a collection.
    pub fn power_file(&self, collection: &str) -> PathBuf {
        self.collection_dir(collection).join("power.txt")
    }

    /// Whether a simulation report was requested.
    pub fn has_simulation(&self) -> bool {
        self.sim_data_path.is_some()
    }

    /// Output path of the simulation report, defaulting next to the phase report.
    pub fn sim_report_file(&self) -> PathBuf {
        self.sim_report_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("sim_report1.pdf"))
    }
}
