use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{Cycle, Region};
use crate::error::TwlError;

pub const DEFAULT_BUCKET: &str = "national-water-model";
pub const DEFAULT_METADATA_URL: &str =
    "https://mesonet.agron.iastate.edu/sites/networks.php?format=csv&nohtml=&special=alldcp";

/// Raw on-disk config shape (`twl-pipeline.json`). Every field is optional;
/// omitted fields fall back to the built-in defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub cycles: Vec<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
}

/// Validated configuration passed into the pipeline entry point.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub regions: Vec<Region>,
    /// Forecast issue hours in ascending order; the scheduler scans them in
    /// reverse.
    pub cycles: Vec<Cycle>,
    pub bucket: String,
    pub metadata_url: String,
    pub data_dir: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from an explicit path, from `twl-pipeline.json` in the current
    /// directory when present, or fall back to the built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<PipelineConfig, TwlError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("twl-pipeline.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| TwlError::ConfigRead(config_path.clone()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|err| TwlError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<PipelineConfig, TwlError> {
        let region_names = if config.regions.is_empty() {
            default_regions()
        } else {
            config.regions
        };
        let cycle_names = if config.cycles.is_empty() {
            default_cycles()
        } else {
            config.cycles
        };

        let regions = region_names
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<Region>, TwlError>>()?;
        let cycles = cycle_names
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<Cycle>, TwlError>>()?;

        Ok(PipelineConfig {
            regions,
            cycles,
            bucket: config.bucket.unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            metadata_url: config
                .metadata_url
                .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
            data_dir: Utf8PathBuf::from(config.data_dir.unwrap_or_else(|| "data".to_string())),
        })
    }
}

pub fn default_regions() -> Vec<String> {
    vec!["atlgulf".to_string()]
}

pub fn default_cycles() -> Vec<String> {
    vec![
        "00".to_string(),
        "06".to_string(),
        "12".to_string(),
        "18".to_string(),
    ]
}
