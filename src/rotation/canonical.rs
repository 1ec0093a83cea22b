use serde_json::Value;

use super::{
    json_ability_id, json_integer, json_number, read_ability_map, AdapterOutput, CastEvent,
    CastSequenceParser, SkipReason, DEFAULT_QUICKNESS, STATUS_UNKNOWN,
};
use crate::ability_id::DROPPED_ABILITY_ID;
use crate::build_metadata::BuildMetadataRecord;

/// Top-level `rotation` phases plus `skillMap`, as written by this crate and the v4 benchmark files.
pub(super) fn parse_canonical(parser: &CastSequenceParser, document: &Value, output: &mut AdapterOutput) {
    let Some(rotation) = document.get("rotation") else {
        output.skip(0, SkipReason::UnknownFormat, "missing rotation");
        return;
    };

    parse_cast_entries(parser, primary_phase(rotation), output);
    output.abilities = read_ability_map(document.get("skillMap"), &parser.resolver);

    if let Some(metadata_value) = document.get("buildMetadata").filter(|value| value.is_object()) {
        match serde_json::from_value::<BuildMetadataRecord>(metadata_value.clone()) {
            Ok(record) => {
                output.observed_dps = record.overall_dps;
                output.build_metadata = Some(record);
            }
            Err(error) => {
                tracing::warn!(metadata_error = %error, "Ignoring malformed embedded build metadata");
            }
        }
    }
}

/// Legacy report payload: `players[i].details.rotation` with the same entry layout as canonical files.
pub(super) fn parse_report_details(parser: &CastSequenceParser, document: &Value, output: &mut AdapterOutput) {
    let Some(player) = parser.selected_player(document, output) else {
        return;
    };

    let Some(rotation) = player.pointer("/details/rotation") else {
        output.skip(parser.settings.player_index, SkipReason::MissingPlayer, "player has no rotation details");
        return;
    };

    parse_cast_entries(parser, primary_phase(rotation), output);
    output.abilities = read_ability_map(document.get("skillMap"), &parser.resolver);
}

/// Only the first phase covers the full encounter; later phases repeat a subset of it.
fn primary_phase(rotation: &Value) -> &[Value] {
    let Some(phases) = rotation.as_array() else {
        return &[];
    };

    let is_flat_entry_list = phases
        .first()
        .and_then(Value::as_array)
        .and_then(|first_entry| first_entry.first())
        .is_some_and(|first_value| !first_value.is_array());
    if is_flat_entry_list {
        return phases;
    }

    if phases.len() > 1 {
        tracing::debug!(ignored_phases = phases.len() - 1, "Using first rotation phase only");
    }

    phases
        .first()
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_cast_entries(parser: &CastSequenceParser, entries: &[Value], output: &mut AdapterOutput) {
    for (entry_index, entry) in entries.iter().enumerate() {
        let Some(fields) = entry.as_array() else {
            output.skip(entry_index, SkipReason::MalformedEntry, "cast entry is not a list");
            continue;
        };

        let Some(cast_time) = fields.first().and_then(json_number) else {
            output.skip(entry_index, SkipReason::MalformedEntry, "missing cast time");
            continue;
        };
        if !cast_time.is_finite() {
            output.skip(entry_index, SkipReason::NonFiniteTime, cast_time.to_string());
            continue;
        }

        let Some(ability_id) = fields.get(1).and_then(|value| json_ability_id(value, &parser.resolver)) else {
            output.skip(entry_index, SkipReason::MissingAbilityId, "missing ability id");
            continue;
        };
        if ability_id == DROPPED_ABILITY_ID {
            output.skip(entry_index, SkipReason::UnresolvableIdentifier, "ability id resolved to 0");
            continue;
        }

        let duration = fields
            .get(2)
            .and_then(json_number)
            .filter(|duration| duration.is_finite())
            .unwrap_or(0.0);
        let status = fields.get(3).and_then(json_integer).unwrap_or(STATUS_UNKNOWN);
        let quickness = fields
            .get(4)
            .and_then(json_number)
            .filter(|quickness| quickness.is_finite())
            .unwrap_or(DEFAULT_QUICKNESS);

        output.events.push(CastEvent {
            cast_time,
            ability_id,
            duration,
            status,
            quickness,
        });
    }
}
