//! Runtime configuration loading.

use serde::Deserialize;
use std::path::Path;

/// Optional knobs for a simulation run, kept out of the scenario file so
/// the same scenario can be replayed with different seeds or trace
/// destinations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimConfig {
    /// Seed for the position allocator; unseeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Directory trace artifacts are written into; the working directory
    /// when absent.
    #[serde(default)]
    pub trace_dir: Option<String>,
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Derive the config path from a scenario file path.
    ///
    /// Replaces the scenario filename with "config.toml" in the same
    /// directory.
    pub fn config_path_from_scenario(scenario_path: &str) -> std::path::PathBuf {
        let scenario = Path::new(scenario_path);
        scenario
            .parent()
            .unwrap_or(Path::new("."))
            .join("config.toml")
    }
}
