use std::collections::HashMap;
use std::path::Path;

use super::model::{BuildMetadataRecord, BuildMetadataTable};
use super::naming::name_as_file_stem;

/// Finds the build identity of a stored artifact by any of the names it is saved under.
#[derive(Debug, Clone, Default)]
pub struct BuildMetadataIndex {
    records: Vec<BuildMetadataRecord>,
    positions_by_key: HashMap<String, usize>,
}

impl BuildMetadataIndex {
    pub fn from_table(table: &BuildMetadataTable) -> Self {
        let mut index = Self::default();
        for record in table.iter() {
            index.add(record.clone());
        }

        tracing::debug!(
            builds = index.records.len(),
            lookup_keys = index.positions_by_key.len(),
            "Indexed build metadata"
        );
        index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn add(&mut self, record: BuildMetadataRecord) {
        let position = self.records.len();
        let mut lookup_keys = Vec::new();

        let html_file_path = record.html_file_path.trim();
        if !html_file_path.is_empty() {
            lookup_keys.push(html_file_path.to_string());
            lookup_keys.push(html_file_path.replace('\\', "/"));
        }

        let url_name = record.url_name.trim();
        if !url_name.is_empty() {
            lookup_keys.push(url_name.to_string());
            lookup_keys.push(format!("{url_name}.html"));
        }

        if !record.name.trim().is_empty() {
            let file_stem = name_as_file_stem(record.name.trim());
            lookup_keys.push(format!("{file_stem}.html"));
            lookup_keys.push(file_stem);
        }

        for lookup_key in lookup_keys {
            // Later records win so the newest entry for a shared name is found.
            self.positions_by_key.insert(lookup_key, position);
        }
        self.records.push(record);
    }

    pub fn lookup(&self, artifact_path: &Path, input_directory: Option<&Path>) -> Option<&BuildMetadataRecord> {
        let mut candidates = Vec::with_capacity(4);

        if let Some(relative_path) =
            input_directory.and_then(|directory| artifact_path.strip_prefix(directory).ok())
        {
            candidates.push(relative_path.to_string_lossy().replace('\\', "/"));
        }

        if let Some(file_name) = artifact_path.file_name() {
            candidates.push(file_name.to_string_lossy().to_string());
        }

        if let Some(file_stem) = artifact_path.file_stem() {
            let file_stem = file_stem.to_string_lossy().to_string();
            candidates.push(format!("{file_stem}.html"));
            candidates.push(file_stem);
        }

        let found = candidates.iter().find_map(|candidate| {
            self.positions_by_key
                .get(candidate)
                .and_then(|position| self.records.get(*position))
        });

        if found.is_none() {
            tracing::debug!(
                artifact_path = %artifact_path.display(),
                "No build metadata matched artifact"
            );
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::BuildMetadataIndex;
    use crate::build_metadata::model::{BenchmarkCategory, BuildMetadataRecord, BuildMetadataTable};
    use std::path::Path;

    fn indexed_table() -> BuildMetadataIndex {
        let mut weaver = BuildMetadataRecord::new("Power Weaver", BenchmarkCategory::Dps);
        weaver.url_name = "power-weaver".to_string();

        let mut harbinger = BuildMetadataRecord::new("Quickness Harbinger", BenchmarkCategory::Quickness);
        harbinger.html_file_path = r"quick\condition\quickness-harbinger.html".to_string();

        let manual = BuildMetadataRecord::new("Alac Mechanist", BenchmarkCategory::Alacrity);

        let table: BuildMetadataTable = [weaver, harbinger, manual].into_iter().collect();
        BuildMetadataIndex::from_table(&table)
    }

    #[test]
    fn finds_records_by_relative_path() {
        let index = indexed_table();
        let record = index
            .lookup(
                Path::new("/data/html/quick/condition/quickness-harbinger.html"),
                Some(Path::new("/data/html")),
            )
            .expect("Expected lookup by relative path");

        assert_eq!(record.name, "Quickness Harbinger");
    }

    #[test]
    fn finds_records_by_url_name_and_display_name() {
        let index = indexed_table();

        let by_url_name = index
            .lookup(Path::new("/elsewhere/power-weaver.json"), None)
            .expect("Expected lookup by url name stem");
        assert_eq!(by_url_name.name, "Power Weaver");

        let by_name = index
            .lookup(Path::new("alac_mechanist.html"), None)
            .expect("Expected lookup by display name");
        assert_eq!(by_name.benchmark_type, BenchmarkCategory::Alacrity);

        assert!(index.lookup(Path::new("unknown-build.html"), None).is_none());
    }
}
