use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::build_metadata::naming::{benchmark_category, build_archetype, records_from_manual_list};
use crate::build_metadata::{self, BuildMetadataIndex, BuildMetadataTable, MergeSummary};
use crate::error::StoreError;
use crate::rotation::{ArtifactFormat, CastSequenceParser, ParsedArtifact};
use crate::settings::{NormalizerSettings, ParseSettings};
use crate::store;
use crate::taxonomy::{self, TaxonomyMetadata};

const ROTATION_FILE_SUFFIX: &str = "_v4.json";

#[derive(Debug, Clone)]
pub struct ArtifactInput {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct NormalizedArtifact {
    pub path: PathBuf,
    pub parsed: ParsedArtifact,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub documents: Vec<NormalizedArtifact>,
    pub table: BuildMetadataTable,
    pub summary: MergeSummary,
    pub empty_artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub documents_written: Vec<PathBuf>,
    pub empty_artifacts: Vec<PathBuf>,
    pub merge_summary: MergeSummary,
    pub taxonomy: Option<TaxonomyMetadata>,
}

/// Parses artifacts on blocking workers, then folds every observed build record into the table
/// in input order with a single merge.
pub async fn ingest_artifacts(
    artifacts: Vec<ArtifactInput>,
    previous_table: &BuildMetadataTable,
    index: &BuildMetadataIndex,
    settings: &ParseSettings,
    input_directory: Option<&Path>,
) -> IngestOutcome {
    let parser = Arc::new(CastSequenceParser::new(settings.clone()));

    let mut handles = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let identity = index.lookup(&artifact.path, input_directory).cloned();
        if identity.is_none() {
            tracing::debug!(
                artifact_path = %artifact.path.display(),
                "No build metadata found for artifact"
            );
        }

        let parser = Arc::clone(&parser);
        let format_hint = format_hint_for_path(&artifact.path);
        let handle = tokio::task::spawn_blocking(move || {
            let parsed = parser.parse_artifact(&artifact.contents, format_hint, identity.as_ref());
            NormalizedArtifact {
                path: artifact.path,
                parsed,
            }
        });
        handles.push(handle);
    }

    let mut documents = Vec::with_capacity(handles.len());
    let mut empty_artifacts = Vec::new();
    for handle in handles {
        let normalized = match handle.await {
            Ok(normalized) => normalized,
            Err(error) => {
                tracing::error!(join_error = %error, "Artifact parse worker failed");
                continue;
            }
        };

        if normalized.parsed.is_empty() {
            tracing::warn!(
                artifact_path = %normalized.path.display(),
                skipped_entries = normalized.parsed.skipped.len(),
                "Artifact has no usable casts"
            );
            empty_artifacts.push(normalized.path);
            continue;
        }
        documents.push(normalized);
    }

    let observed_records: Vec<_> = documents
        .iter()
        .filter_map(|document| document.parsed.build_metadata.clone())
        .collect();
    let (table, summary) = build_metadata::merge_with_summary(&observed_records, previous_table);

    IngestOutcome {
        documents,
        table,
        summary,
        empty_artifacts,
    }
}

fn format_hint_for_path(path: &Path) -> Option<ArtifactFormat> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    matches!(extension.as_str(), "html" | "htm").then_some(ArtifactFormat::Html)
}

pub fn rebuild_taxonomy(settings: &NormalizerSettings) -> Result<Option<TaxonomyMetadata>, StoreError> {
    let Some(raw_catalog_path) = settings.raw_catalog_path.as_deref() else {
        return Ok(None);
    };

    let Some(raw_abilities) = store::load_raw_catalog(raw_catalog_path)? else {
        tracing::warn!(
            raw_catalog_path = %raw_catalog_path.display(),
            "Raw ability catalog not found, keeping existing taxonomy"
        );
        return Ok(None);
    };

    let previous_table = store::load_ability_table(&settings.taxonomy_path)?;
    let build = taxonomy::build(&raw_abilities, &previous_table);
    let metadata = TaxonomyMetadata::from_build(&build, Utc::now());

    store::save_ability_table(&settings.taxonomy_path, &build.table)?;
    store::save_ability_table(&settings.uncategorized_path, &build.uncategorized)?;
    store::save_taxonomy_metadata(&settings.taxonomy_metadata_path, &metadata)?;

    tracing::info!(
        raw_abilities = raw_abilities.len(),
        categorized_abilities = metadata.categorized_abilities,
        uncategorized_abilities = metadata.uncategorized_abilities,
        carried_forward = metadata.carried_forward,
        "Rebuilt ability taxonomy"
    );

    Ok(Some(metadata))
}

pub fn collect_artifact_paths(input_directory: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut artifact_paths = Vec::new();
    let mut pending_directories = vec![input_directory.to_path_buf()];

    while let Some(directory) = pending_directories.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound && directory == input_directory => {
                tracing::warn!(input_dir = %directory.display(), "Input directory does not exist");
                return Ok(artifact_paths);
            }
            Err(error) => {
                return Err(StoreError::Read {
                    path: directory,
                    source: error,
                });
            }
        };

        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.is_dir() {
                pending_directories.push(entry_path);
                continue;
            }

            let is_artifact = entry_path
                .extension()
                .and_then(|value| value.to_str())
                .is_some_and(|extension| matches!(extension.to_ascii_lowercase().as_str(), "html" | "htm" | "json"));
            if is_artifact {
                artifact_paths.push(entry_path);
            }
        }
    }

    artifact_paths.sort();
    Ok(artifact_paths)
}

fn read_artifacts(artifact_paths: Vec<PathBuf>) -> Vec<ArtifactInput> {
    artifact_paths
        .into_iter()
        .filter_map(|path| match std::fs::read_to_string(&path) {
            Ok(contents) => Some(ArtifactInput { path, contents }),
            Err(error) => {
                tracing::warn!(
                    artifact_path = %path.display(),
                    read_error = %error,
                    "Failed to read artifact, skipping"
                );
                None
            }
        })
        .collect()
}

/// `<output>/<benchmark>/<archetype>/<stem>_v4.json`
pub fn rotation_output_path(output_directory: &Path, normalized: &NormalizedArtifact) -> PathBuf {
    let file_stem = normalized
        .path
        .file_stem()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|| "rotation".to_string());

    let (benchmark_type, build_type) = match normalized.parsed.build_metadata.as_ref() {
        Some(record) => (record.benchmark_type, record.build_type),
        None => (benchmark_category(&file_stem), build_archetype(&file_stem)),
    };

    output_directory
        .join(benchmark_type.as_str())
        .join(build_type.as_str())
        .join(format!("{file_stem}{ROTATION_FILE_SUFFIX}"))
}

/// Artifacts sharing a stem in different input directories would land on one output file.
/// Later ones get their parent directory name as a prefix, then a numeric suffix if needed.
fn disambiguated_output_path(output_path: PathBuf, artifact_path: &Path, taken_paths: &HashSet<PathBuf>) -> PathBuf {
    if !taken_paths.contains(&output_path) {
        return output_path;
    }

    let file_name = output_path
        .file_name()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("rotation{ROTATION_FILE_SUFFIX}"));
    let parent_label = artifact_path
        .parent()
        .and_then(Path::file_name)
        .map(|value| value.to_string_lossy().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "artifact".to_string());

    let prefixed_path = output_path.with_file_name(format!("{parent_label}_{file_name}"));
    let base_name = file_name.strip_suffix(ROTATION_FILE_SUFFIX).unwrap_or(&file_name);
    let mut candidate_path = prefixed_path;
    let mut attempt = 2;
    while taken_paths.contains(&candidate_path) {
        candidate_path = output_path.with_file_name(format!("{parent_label}_{base_name}_{attempt}{ROTATION_FILE_SUFFIX}"));
        attempt += 1;
    }

    tracing::warn!(
        artifact_path = %artifact_path.display(),
        original_output_path = %output_path.display(),
        output_path = %candidate_path.display(),
        "Rotation output name already used by another artifact, writing under a prefixed name"
    );
    candidate_path
}

pub async fn run(settings: &NormalizerSettings) -> Result<RunReport, StoreError> {
    let taxonomy = rebuild_taxonomy(settings)?;

    let mut build_table = store::load_build_table(&settings.build_metadata_path)?;
    if let Some(manual_logs_path) = settings.manual_logs_path.as_deref() {
        let manual_records = records_from_manual_list(&store::load_manual_logs(manual_logs_path)?);
        build_table = build_metadata::merge(&manual_records, &build_table);
    }

    let index = BuildMetadataIndex::from_table(&build_table);
    let artifact_paths = collect_artifact_paths(&settings.input_dir)?;
    tracing::info!(
        input_dir = %settings.input_dir.display(),
        artifacts = artifact_paths.len(),
        indexed_builds = index.len(),
        "Normalizing rotation artifacts"
    );
    let artifacts = read_artifacts(artifact_paths);

    let outcome = ingest_artifacts(
        artifacts,
        &build_table,
        &index,
        &settings.parse,
        Some(settings.input_dir.as_path()),
    )
    .await;

    let mut documents_written = Vec::with_capacity(outcome.documents.len());
    let mut taken_paths = HashSet::with_capacity(outcome.documents.len());
    for normalized in &outcome.documents {
        let output_path = disambiguated_output_path(
            rotation_output_path(&settings.output_dir, normalized),
            &normalized.path,
            &taken_paths,
        );
        taken_paths.insert(output_path.clone());
        let written_path = store::save_rotation_document(&output_path, &normalized.parsed.document())?;
        tracing::debug!(
            artifact_path = %normalized.path.display(),
            output_path = %written_path.display(),
            cast_events = normalized.parsed.sequence.len(),
            "Wrote rotation document"
        );
        documents_written.push(written_path);
    }

    store::save_build_table(&settings.build_metadata_path, &outcome.table)?;

    tracing::info!(
        documents_written = documents_written.len(),
        empty_artifacts = outcome.empty_artifacts.len(),
        "Finished normalizing rotation artifacts"
    );

    Ok(RunReport {
        documents_written,
        empty_artifacts: outcome.empty_artifacts,
        merge_summary: outcome.summary,
        taxonomy,
    })
}

#[cfg(test)]
mod tests {
    use super::{disambiguated_output_path, ingest_artifacts, rotation_output_path, run, ArtifactInput};
    use crate::build_metadata::{
        BenchmarkCategory, BuildArchetype, BuildMetadataIndex, BuildMetadataRecord, BuildMetadataTable,
    };
    use crate::settings::{NormalizerSettings, ParseSettings};
    use crate::test_support::unique_temp_directory;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    fn html_artifact(dps: u32, cast_time: &str) -> String {
        format!(
            r#"<html><table><tr><td data-original-title="1 damage&lt;br&gt;100% of total">{dps}</td></tr></table>
            <img class="rot-icon" src="https://render.guildwars2.com/file/A/5526.png" data-original-title="Arc Lightning at {cast_time}s for 512ms"></html>"#
        )
    }

    #[tokio::test]
    async fn ingest_merges_observed_dps_into_identified_builds_once() {
        let mut known_record = BuildMetadataRecord::new("Power Catalyst", BenchmarkCategory::Dps);
        known_record.html_file_path = "dps/power/power_catalyst.html".to_string();
        let previous_table: BuildMetadataTable = [known_record].into_iter().collect();
        let index = BuildMetadataIndex::from_table(&previous_table);

        let artifacts = vec![
            ArtifactInput {
                path: PathBuf::from("logs/dps/power/power_catalyst.html"),
                contents: html_artifact(42_000, "1.000"),
            },
            ArtifactInput {
                path: PathBuf::from("logs/unknown_build.html"),
                contents: html_artifact(30_000, "0.500"),
            },
            ArtifactInput {
                path: PathBuf::from("logs/broken.json"),
                contents: "{ not json".to_string(),
            },
        ];

        let outcome = ingest_artifacts(
            artifacts,
            &previous_table,
            &index,
            &ParseSettings::default(),
            Some(Path::new("logs")),
        )
        .await;

        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.empty_artifacts, vec![PathBuf::from("logs/broken.json")]);
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(
            outcome
                .table
                .get("Power Catalyst", BenchmarkCategory::Dps)
                .and_then(|record| record.overall_dps),
            Some(42_000.0)
        );
        assert_eq!(outcome.summary.enriched, 1);
    }

    #[tokio::test]
    async fn run_writes_documents_under_benchmark_and_archetype() {
        let temp_directory = unique_temp_directory("pipeline");
        let input_directory = temp_directory.join("html");
        std::fs::create_dir_all(input_directory.join("quick"))
            .expect("Failed to create temporary pipeline input directory");
        std::fs::write(
            input_directory.join("quick").join("condition_quickness_harbinger.html"),
            html_artifact(35_500, "2.250"),
        )
        .expect("Failed to write test artifact");

        let settings = NormalizerSettings {
            input_dir: input_directory,
            output_dir: temp_directory.join("bench"),
            build_metadata_path: temp_directory.join("build_metadata.json"),
            taxonomy_path: temp_directory.join("skills.json"),
            uncategorized_path: temp_directory.join("uncategorized.json"),
            taxonomy_metadata_path: temp_directory.join("skills_metadata.json"),
            ..NormalizerSettings::default()
        };

        let report = run(&settings).await.expect("Expected pipeline run to succeed");

        let expected_path = temp_directory
            .join("bench")
            .join("quick")
            .join("condition")
            .join("condition_quickness_harbinger_v4.json");
        assert_eq!(report.documents_written, vec![expected_path.clone()]);
        assert!(report.taxonomy.is_none());

        let written: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&expected_path).expect("Expected rotation document to exist"),
        )
        .expect("Expected rotation document to be JSON");
        assert_eq!(written["rotation"][0][0][1], serde_json::json!(5526));
        assert!(written.get("buildMetadata").is_none());
        assert!(settings.build_metadata_path.exists());

        std::fs::remove_dir_all(&temp_directory).expect("Failed to remove temporary pipeline test directory");
    }

    #[tokio::test]
    async fn run_keeps_same_named_artifacts_from_different_directories_apart() {
        let temp_directory = unique_temp_directory("pipeline");
        let input_directory = temp_directory.join("html");
        for (subdirectory, dps) in [("week_1", 35_500), ("week_2", 36_100)] {
            std::fs::create_dir_all(input_directory.join(subdirectory))
                .expect("Failed to create temporary pipeline input directory");
            std::fs::write(
                input_directory.join(subdirectory).join("power_catalyst.html"),
                html_artifact(dps, "1.500"),
            )
            .expect("Failed to write test artifact");
        }

        let settings = NormalizerSettings {
            input_dir: input_directory,
            output_dir: temp_directory.join("bench"),
            build_metadata_path: temp_directory.join("build_metadata.json"),
            taxonomy_path: temp_directory.join("skills.json"),
            uncategorized_path: temp_directory.join("uncategorized.json"),
            taxonomy_metadata_path: temp_directory.join("skills_metadata.json"),
            ..NormalizerSettings::default()
        };

        let report = run(&settings).await.expect("Expected pipeline run to succeed");

        let output_directory = temp_directory.join("bench").join("dps").join("power");
        assert_eq!(
            report.documents_written,
            vec![
                output_directory.join("power_catalyst_v4.json"),
                output_directory.join("week_2_power_catalyst_v4.json"),
            ]
        );
        assert!(report.documents_written.iter().all(|path| path.exists()));

        std::fs::remove_dir_all(&temp_directory).expect("Failed to remove temporary pipeline test directory");
    }

    #[test]
    fn colliding_output_paths_get_parent_prefix_then_counter() {
        let output_path = Path::new("bench").join("dps").join("power").join("power_weaver_v4.json");
        let mut taken_paths = HashSet::new();

        let first = disambiguated_output_path(output_path.clone(), Path::new("html/a/power_weaver.html"), &taken_paths);
        assert_eq!(first, output_path);
        taken_paths.insert(first);

        let second = disambiguated_output_path(output_path.clone(), Path::new("html/b/power_weaver.json"), &taken_paths);
        assert_eq!(second, output_path.with_file_name("b_power_weaver_v4.json"));
        taken_paths.insert(second);

        let third = disambiguated_output_path(output_path.clone(), Path::new("other/b/power_weaver.html"), &taken_paths);
        assert_eq!(third, output_path.with_file_name("b_power_weaver_2_v4.json"));
    }

    #[test]
    fn output_path_prefers_build_record_categories() {
        let mut record = BuildMetadataRecord::new("Alac Mechanist", BenchmarkCategory::Alacrity);
        record.build_type = BuildArchetype::Condition;

        let parsed = crate::rotation::CastSequenceParser::default().parse_artifact(
            r#"{"rotation": [[[0.0, 63234, 0, 1, 1.0]]], "skillMap": {}}"#,
            None,
            Some(&record),
        );
        let normalized = super::NormalizedArtifact {
            path: PathBuf::from("html/power_mechanist.json"),
            parsed,
        };

        assert_eq!(
            rotation_output_path(Path::new("bench"), &normalized),
            Path::new("bench").join("alac").join("condition").join("power_mechanist_v4.json")
        );
    }
}
