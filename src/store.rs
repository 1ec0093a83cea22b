use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::build_metadata::naming::ManualLogEntry;
use crate::build_metadata::BuildMetadataTable;
use crate::error::StoreError;
use crate::rotation::RotationDocument;
use crate::taxonomy::{AbilityTable, RawAbility, TaxonomyMetadata};

/// Missing files read as `None`; unreadable or corrupt files are errors so a bad table is never
/// silently replaced by an empty one.
fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw_json = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source: error,
            });
        }
    };

    let value = serde_json::from_str::<T>(raw_json.trim_start_matches('\u{feff}')).map_err(|error| {
        StoreError::Parse {
            path: path.to_path_buf(),
            source: error,
        }
    })?;

    Ok(Some(value))
}

fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, StoreError> {
    if let Some(parent_directory) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent_directory).map_err(|error| StoreError::Write {
            path: parent_directory.to_path_buf(),
            message: format!("failed to create directory: {error}"),
        })?;
    }

    let serialized = serde_json::to_string_pretty(value).map_err(|error| StoreError::Serialize {
        path: path.to_path_buf(),
        source: error,
    })?;

    let temp_path = temporary_path(path);
    std::fs::write(&temp_path, serialized).map_err(|error| StoreError::Write {
        path: temp_path.clone(),
        message: format!("failed to write temporary file: {error}"),
    })?;

    // rename replaces an existing target in one step, so the old file stays intact until then.
    if let Err(error) = std::fs::rename(&temp_path, path) {
        if let Err(cleanup_error) = std::fs::remove_file(&temp_path) {
            tracing::warn!(
                temp_path = %temp_path.display(),
                cleanup_error = %cleanup_error,
                "Failed to remove temporary file after rename failure"
            );
        }
        return Err(StoreError::Write {
            path: path.to_path_buf(),
            message: format!("failed to finalize: {error}"),
        });
    }

    Ok(path.to_path_buf())
}

fn temporary_path(path: &Path) -> PathBuf {
    let Some(file_name) = path.file_name().and_then(|value| value.to_str()) else {
        return path.with_extension("json.tmp");
    };

    path.with_file_name(format!("{file_name}.tmp"))
}

pub fn load_ability_table(path: &Path) -> Result<AbilityTable, StoreError> {
    Ok(read_json_file::<AbilityTable>(path)?.unwrap_or_default())
}

pub fn save_ability_table(path: &Path, table: &AbilityTable) -> Result<PathBuf, StoreError> {
    write_json_file(path, table)
}

pub fn save_taxonomy_metadata(path: &Path, metadata: &TaxonomyMetadata) -> Result<PathBuf, StoreError> {
    write_json_file(path, metadata)
}

pub fn load_build_table(path: &Path) -> Result<BuildMetadataTable, StoreError> {
    Ok(read_json_file::<BuildMetadataTable>(path)?.unwrap_or_default())
}

pub fn save_build_table(path: &Path, table: &BuildMetadataTable) -> Result<PathBuf, StoreError> {
    write_json_file(path, table)
}

pub fn load_raw_catalog(path: &Path) -> Result<Option<Vec<RawAbility>>, StoreError> {
    read_json_file(path)
}

pub fn load_manual_logs(path: &Path) -> Result<BTreeMap<String, ManualLogEntry>, StoreError> {
    Ok(read_json_file(path)?.unwrap_or_default())
}

pub fn save_rotation_document(path: &Path, document: &RotationDocument) -> Result<PathBuf, StoreError> {
    write_json_file(path, document)
}
