use serde_json::Value;

use super::{
    json_ability_id, json_number, read_ability_map, AdapterOutput, CastEvent, CastSequenceParser,
    SkipReason, DEFAULT_QUICKNESS, STATUS_UNKNOWN,
};
use crate::ability_id::DROPPED_ABILITY_ID;

const MILLISECONDS_PER_SECOND: f64 = 1000.0;

/// Nested `{id, skills: [{castTime, duration, quickness}]}` groups with millisecond cast times.
pub(super) fn parse(parser: &CastSequenceParser, document: &Value, output: &mut AdapterOutput) {
    let Some(player) = parser.selected_player(document, output) else {
        return;
    };

    let Some(ability_groups) = player.get("rotation").and_then(Value::as_array) else {
        tracing::warn!(player_index = parser.settings.player_index, "Player has no rotation list");
        return;
    };

    // Skip indices count individual casts across all groups.
    let mut cast_index = 0_usize;
    for ability_group in ability_groups {
        let casts = ability_group
            .get("skills")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let ability_id = ability_group
            .get("id")
            .and_then(|value| json_ability_id(value, &parser.resolver));

        let Some(ability_id) = ability_id else {
            for _ in casts {
                output.skip(cast_index, SkipReason::MissingAbilityId, "ability group without id");
                cast_index += 1;
            }
            continue;
        };

        for cast in casts {
            let entry_index = cast_index;
            cast_index += 1;

            if ability_id == DROPPED_ABILITY_ID {
                output.skip(entry_index, SkipReason::UnresolvableIdentifier, "ability id resolved to 0");
                continue;
            }

            let Some(cast_time_ms) = cast.get("castTime").and_then(json_number) else {
                output.skip(entry_index, SkipReason::MalformedEntry, "missing castTime");
                continue;
            };
            if !cast_time_ms.is_finite() {
                output.skip(entry_index, SkipReason::NonFiniteTime, cast_time_ms.to_string());
                continue;
            }

            let duration = cast
                .get("duration")
                .and_then(json_number)
                .filter(|duration| duration.is_finite())
                .unwrap_or(0.0);
            let quickness = cast
                .get("quickness")
                .and_then(json_number)
                .filter(|quickness| quickness.is_finite())
                .unwrap_or(DEFAULT_QUICKNESS);

            output.events.push(CastEvent {
                cast_time: cast_time_ms / MILLISECONDS_PER_SECOND,
                ability_id,
                duration,
                status: STATUS_UNKNOWN,
                quickness,
            });
        }
    }

    output.abilities = read_ability_map(document.get("skillMap"), &parser.resolver);
}
