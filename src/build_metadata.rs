pub mod lookup;
pub mod model;
pub mod naming;

use std::collections::HashMap;

pub use lookup::BuildMetadataIndex;
pub use model::{
    is_unknown_slot_value, BenchmarkCategory, BuildArchetype, BuildKey, BuildMetadataRecord,
    BuildMetadataTable, SlotKey, REQUIRED_SLOT_KEYS, UNKNOWN_PROFESSION, UNKNOWN_SLOT_VALUE,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub enriched: usize,
    pub unchanged: usize,
}

pub fn merge(new_records: &[BuildMetadataRecord], previous_table: &BuildMetadataTable) -> BuildMetadataTable {
    merge_with_summary(new_records, previous_table).0
}

pub fn merge_with_summary(
    new_records: &[BuildMetadataRecord],
    previous_table: &BuildMetadataTable,
) -> (BuildMetadataTable, MergeSummary) {
    let mut merged_table = previous_table.clone();
    let mut summary = MergeSummary::default();

    let mut positions_by_key: HashMap<BuildKey, usize> = HashMap::new();
    for (position, record) in merged_table.iter().enumerate() {
        positions_by_key.entry(record.key()).or_insert(position);
    }

    for incoming_record in new_records {
        let build_key = incoming_record.key();
        let incoming_is_complete = incoming_record.is_complete();

        let Some(position) = positions_by_key.get(&build_key).copied() else {
            if !incoming_is_complete {
                tracing::debug!(
                    build_name = %build_key.name,
                    benchmark_type = build_key.benchmark_type.as_str(),
                    missing_slots = ?incoming_record.missing_slots(),
                    "Inserting incomplete build record"
                );
            }
            positions_by_key.insert(build_key, merged_table.len());
            merged_table.records_mut().push(incoming_record.clone());
            summary.inserted += 1;
            continue;
        };

        let Some(existing_record) = merged_table.records_mut().get_mut(position) else {
            continue;
        };

        if incoming_is_complete {
            let mut replacement = incoming_record.clone();
            fill_unknown_slots(&mut replacement, existing_record);
            fill_unknown_fields(&mut replacement, existing_record);
            if replacement == *existing_record {
                summary.unchanged += 1;
            } else {
                tracing::debug!(
                    build_name = %build_key.name,
                    benchmark_type = build_key.benchmark_type.as_str(),
                    "Replacing build record with complete observation"
                );
                *existing_record = replacement;
                summary.replaced += 1;
            }
            continue;
        }

        let filled_slots = fill_unknown_slots(existing_record, incoming_record);
        let filled_fields = fill_unknown_fields(existing_record, incoming_record);
        if filled_slots || filled_fields {
            tracing::debug!(
                build_name = %build_key.name,
                benchmark_type = build_key.benchmark_type.as_str(),
                "Enriched build record from incomplete observation"
            );
            summary.enriched += 1;
        } else {
            summary.unchanged += 1;
        }
    }

    tracing::info!(
        previous_builds = previous_table.len(),
        merged_builds = merged_table.len(),
        inserted = summary.inserted,
        replaced = summary.replaced,
        enriched = summary.enriched,
        unchanged = summary.unchanged,
        "Merged build metadata"
    );

    (merged_table, summary)
}

fn fill_unknown_slots(target: &mut BuildMetadataRecord, source: &BuildMetadataRecord) -> bool {
    let mut changed = false;
    for (slot_key, incoming_value) in &source.skill_slots {
        let should_fill = match target.skill_slots.get(slot_key) {
            None => true,
            Some(current_value) => {
                is_unknown_slot_value(current_value) && current_value != incoming_value
            }
        };

        if should_fill {
            target
                .skill_slots
                .insert(slot_key.clone(), incoming_value.clone());
            changed = true;
        }
    }
    changed
}

fn fill_unknown_fields(target: &mut BuildMetadataRecord, source: &BuildMetadataRecord) -> bool {
    let mut changed = false;

    if target.overall_dps.is_none() && source.overall_dps.is_some() {
        target.overall_dps = source.overall_dps;
        changed = true;
    }

    if target.has_unknown_profession() && !source.has_unknown_profession() {
        target.profession = source.profession.clone();
        changed = true;
    }

    for (target_field, source_field) in [
        (&mut target.url, &source.url),
        (&mut target.elite_spec, &source.elite_spec),
        (&mut target.url_name, &source.url_name),
        (&mut target.dps_report_url, &source.dps_report_url),
        (&mut target.sc_link_url, &source.sc_link_url),
        (&mut target.html_file_path, &source.html_file_path),
        (&mut target.weapons, &source.weapons),
    ] {
        if target_field.trim().is_empty() && !source_field.trim().is_empty() {
            target_field.clone_from(source_field);
            changed = true;
        }
    }

    for (extra_key, extra_value) in &source.extra {
        if !target.extra.contains_key(extra_key) {
            target.extra.insert(extra_key.clone(), extra_value.clone());
            changed = true;
        }
    }

    changed
}
