use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::ability_id::DEFAULT_FALLBACK_RANGE;
use crate::error::StoreError;

pub const CONFIG_PATH_ENV: &str = "ROTATION_NORMALIZER_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseSettings {
    pub player_index: usize,
    pub cancelled_cast_allow_list: Vec<String>,
    pub cancelled_cast_min_duration_ms: f64,
    pub fallback_id_range: u64,
    pub report_host: String,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            player_index: 0,
            cancelled_cast_allow_list: vec!["Spatial Surge".to_string(), "Arc Lightning".to_string()],
            cancelled_cast_min_duration_ms: 300.0,
            fallback_id_range: DEFAULT_FALLBACK_RANGE,
            report_host: "https://dps.report".to_string(),
        }
    }
}

impl ParseSettings {
    pub fn allows_cancelled_cast(&self, ability_name: &str, duration_ms: f64) -> bool {
        self.cancelled_cast_allow_list
            .iter()
            .any(|allowed_name| allowed_name == ability_name)
            && duration_ms >= self.cancelled_cast_min_duration_ms
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub build_metadata_path: PathBuf,
    pub taxonomy_path: PathBuf,
    pub uncategorized_path: PathBuf,
    pub taxonomy_metadata_path: PathBuf,
    pub raw_catalog_path: Option<PathBuf>,
    pub manual_logs_path: Option<PathBuf>,
    pub log_filter: String,
    pub parse: ParseSettings,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            input_dir: data_dir.join("html"),
            output_dir: data_dir.join("bench"),
            build_metadata_path: data_dir.join("build_metadata.json"),
            taxonomy_path: data_dir.join("skills").join("gw2_skills_en.json"),
            uncategorized_path: data_dir.join("skills").join("gw2_skills_uncategorized.json"),
            taxonomy_metadata_path: data_dir.join("skills").join("gw2_skills_metadata.json"),
            raw_catalog_path: None,
            manual_logs_path: None,
            log_filter: "info".to_string(),
            parse: ParseSettings::default(),
        }
    }
}

impl NormalizerSettings {
    pub fn load() -> Result<Self, StoreError> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(config_path) if !config_path.is_empty() => {
                Self::load_from(Path::new(&config_path))
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Self, StoreError> {
        let raw_json = match std::fs::read_to_string(config_path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    config_path = %config_path.display(),
                    "Normalizer config not found, using defaults"
                );
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(StoreError::Read {
                    path: config_path.to_path_buf(),
                    source: error,
                });
            }
        };

        serde_json::from_str::<Self>(&raw_json).map_err(|error| StoreError::Parse {
            path: config_path.to_path_buf(),
            source: error,
        })
    }
}
