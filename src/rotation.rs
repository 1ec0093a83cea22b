mod canonical;
mod elite_insights;
mod html;
pub mod model;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::ability_id::{AbilityIdResolver, DROPPED_ABILITY_ID};
use crate::build_metadata::BuildMetadataRecord;
use crate::settings::ParseSettings;

pub use html::extract_overall_dps;
pub use model::{
    AbilityDescriptor, CastEvent, CastSequence, RotationBuildMetadata, RotationDocument,
    DEFAULT_QUICKNESS, STATUS_COMPLETED, STATUS_UNKNOWN, UNKNOWN_ABILITY_NAME,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactFormat {
    /// `players[i].rotation[{id, skills[{castTime, duration}]}]` with millisecond times.
    EliteInsightsJson,
    /// Legacy report payload with `players[i].details.rotation` phase lists.
    ReportDetailsJson,
    /// Top-level `rotation` + `skillMap`, second-based times.
    CanonicalJson,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    InvalidJson,
    UnknownFormat,
    MissingPlayer,
    MalformedEntry,
    MissingAbilityId,
    UnresolvableIdentifier,
    NonFiniteTime,
    MissingTooltip,
    CancelledCast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    pub index: usize,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Default)]
struct AdapterOutput {
    events: Vec<CastEvent>,
    abilities: BTreeMap<i64, AbilityDescriptor>,
    build_metadata: Option<BuildMetadataRecord>,
    observed_dps: Option<f64>,
    skipped: Vec<SkippedEntry>,
}

impl AdapterOutput {
    fn skip(&mut self, index: usize, reason: SkipReason, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::debug!(entry_index = index, skip_reason = ?reason, detail = %detail, "Skipped cast entry");
        self.skipped.push(SkippedEntry {
            index,
            reason,
            detail,
        });
    }
}

#[derive(Debug, Clone)]
pub struct ParsedArtifact {
    pub sequence: CastSequence,
    pub format: Option<ArtifactFormat>,
    pub build_metadata: Option<BuildMetadataRecord>,
    pub observed_dps: Option<f64>,
    pub skipped: Vec<SkippedEntry>,
}

impl ParsedArtifact {
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn document(&self) -> RotationDocument {
        RotationDocument::new(&self.sequence, self.build_metadata.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CastSequenceParser {
    settings: ParseSettings,
    resolver: AbilityIdResolver,
}

impl CastSequenceParser {
    pub fn new(settings: ParseSettings) -> Self {
        let resolver = AbilityIdResolver::new(settings.fallback_id_range);
        Self { settings, resolver }
    }

    pub fn settings(&self) -> &ParseSettings {
        &self.settings
    }

    pub fn parse(&self, raw_artifact: &str, format_hint: Option<ArtifactFormat>) -> CastSequence {
        self.parse_artifact(raw_artifact, format_hint, None).sequence
    }

    /// Parses one artifact and attaches the caller's build identity, if any, as the partial
    /// build record to merge.
    pub fn parse_artifact(
        &self,
        raw_artifact: &str,
        format_hint: Option<ArtifactFormat>,
        identity: Option<&BuildMetadataRecord>,
    ) -> ParsedArtifact {
        let mut output = AdapterOutput::default();
        let format = self.parse_into(raw_artifact, format_hint, &mut output);

        let AdapterOutput {
            events,
            abilities,
            build_metadata: embedded_metadata,
            observed_dps,
            skipped,
        } = output;

        let sequence = CastSequence::from_parts(events, abilities);
        let mut build_metadata = identity.cloned().or(embedded_metadata);
        if let Some(record) = build_metadata.as_mut() {
            if record.overall_dps.is_none() {
                record.overall_dps = observed_dps;
            }
        }

        if sequence.is_empty() {
            tracing::warn!(
                artifact_format = ?format,
                skipped_entries = skipped.len(),
                "Artifact produced an empty cast sequence"
            );
        } else {
            tracing::debug!(
                artifact_format = ?format,
                cast_events = sequence.len(),
                abilities = sequence.abilities().len(),
                skipped_entries = skipped.len(),
                "Parsed cast sequence"
            );
        }

        ParsedArtifact {
            sequence,
            format,
            build_metadata,
            observed_dps,
            skipped,
        }
    }

    fn parse_into(
        &self,
        raw_artifact: &str,
        format_hint: Option<ArtifactFormat>,
        output: &mut AdapterOutput,
    ) -> Option<ArtifactFormat> {
        let trimmed_artifact = raw_artifact.trim_start_matches('\u{feff}').trim();
        let looks_like_json = trimmed_artifact.starts_with('{');

        if format_hint == Some(ArtifactFormat::Html) || (format_hint.is_none() && !looks_like_json) {
            if format_hint.is_none() && !looks_like_html(trimmed_artifact) {
                output.skip(0, SkipReason::UnknownFormat, "artifact is neither JSON nor HTML");
                return None;
            }
            html::parse(self, trimmed_artifact, output);
            return Some(ArtifactFormat::Html);
        }

        let document = match serde_json::from_str::<Value>(trimmed_artifact) {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!(parse_error = %error, "Artifact is not valid JSON");
                output.skip(0, SkipReason::InvalidJson, error.to_string());
                return format_hint;
            }
        };

        let Some(format) = format_hint.or_else(|| sniff_json(&document)) else {
            tracing::warn!("JSON artifact has no recognizable rotation data");
            output.skip(0, SkipReason::UnknownFormat, "no rotation found in JSON artifact");
            return None;
        };

        self.parse_json(format, &document, output);
        Some(format)
    }

    fn parse_json(&self, format: ArtifactFormat, document: &Value, output: &mut AdapterOutput) {
        match format {
            ArtifactFormat::EliteInsightsJson => elite_insights::parse(self, document, output),
            ArtifactFormat::ReportDetailsJson => canonical::parse_report_details(self, document, output),
            ArtifactFormat::CanonicalJson => canonical::parse_canonical(self, document, output),
            ArtifactFormat::Html => {
                output.skip(0, SkipReason::UnknownFormat, "HTML hint given for a JSON artifact");
            }
        }
    }

    fn selected_player<'a>(&self, document: &'a Value, output: &mut AdapterOutput) -> Option<&'a Value> {
        let player_index = self.settings.player_index;
        let player = document
            .get("players")
            .and_then(Value::as_array)
            .and_then(|players| players.get(player_index));

        if player.is_none() {
            tracing::warn!(player_index, "Artifact has no player at the configured index");
            output.skip(player_index, SkipReason::MissingPlayer, "player index out of range");
        }
        player
    }
}

pub fn sniff_format(raw_artifact: &str) -> Option<ArtifactFormat> {
    let trimmed_artifact = raw_artifact.trim_start_matches('\u{feff}').trim();
    if !trimmed_artifact.starts_with('{') {
        return looks_like_html(trimmed_artifact).then_some(ArtifactFormat::Html);
    }

    serde_json::from_str::<Value>(trimmed_artifact)
        .ok()
        .and_then(|document| sniff_json(&document))
}

fn sniff_json(document: &Value) -> Option<ArtifactFormat> {
    if document.get("rotation").is_some_and(Value::is_array) {
        return Some(ArtifactFormat::CanonicalJson);
    }

    let first_player = document
        .get("players")
        .and_then(Value::as_array)
        .and_then(|players| players.first())?;

    if first_player.get("rotation").is_some_and(Value::is_array) {
        return Some(ArtifactFormat::EliteInsightsJson);
    }

    if first_player
        .pointer("/details/rotation")
        .is_some_and(Value::is_array)
    {
        return Some(ArtifactFormat::ReportDetailsJson);
    }

    None
}

fn looks_like_html(artifact: &str) -> bool {
    let prefix: String = artifact.chars().take(2048).collect::<String>().to_ascii_lowercase();
    prefix.starts_with('<') || prefix.contains("<html") || prefix.contains("<img")
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn json_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|float| float.fract() == 0.0).map(|float| float as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

fn json_ability_id(value: &Value, resolver: &AbilityIdResolver) -> Option<i64> {
    match value {
        Value::String(text) => {
            let trimmed_text = text.trim();
            let without_prefix = trimmed_text
                .strip_prefix('s')
                .filter(|rest| rest.chars().all(|character| character.is_ascii_digit() || character == '-'))
                .unwrap_or(trimmed_text);
            Some(resolver.resolve(without_prefix))
        }
        other => json_integer(other),
    }
}

fn read_ability_map(skill_map: Option<&Value>, resolver: &AbilityIdResolver) -> BTreeMap<i64, AbilityDescriptor> {
    let mut abilities = BTreeMap::new();
    let Some(entries) = skill_map.and_then(Value::as_object) else {
        return abilities;
    };

    for (ability_key, descriptor_value) in entries {
        let ability_id = json_ability_id(&Value::String(ability_key.clone()), resolver)
            .unwrap_or(DROPPED_ABILITY_ID);
        if ability_id == DROPPED_ABILITY_ID {
            tracing::debug!(ability_key = %ability_key, "Ignoring ability map entry without usable id");
            continue;
        }

        match serde_json::from_value::<AbilityDescriptor>(descriptor_value.clone()) {
            Ok(descriptor) => {
                abilities.insert(ability_id, descriptor);
            }
            Err(error) => {
                tracing::debug!(
                    ability_key = %ability_key,
                    descriptor_error = %error,
                    "Ignoring malformed ability map entry"
                );
            }
        }
    }

    abilities
}

#[cfg(test)]
mod tests {
    use super::{sniff_format, ArtifactFormat, CastSequenceParser, SkipReason};
    use crate::build_metadata::{BenchmarkCategory, BuildMetadataRecord};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn sniffs_each_supported_shape() {
        assert_eq!(
            sniff_format(r#"{"rotation": [[]], "skillMap": {}}"#),
            Some(ArtifactFormat::CanonicalJson)
        );
        assert_eq!(
            sniff_format(r#"{"players": [{"rotation": []}], "skillMap": {}}"#),
            Some(ArtifactFormat::EliteInsightsJson)
        );
        assert_eq!(
            sniff_format(r#"{"players": [{"details": {"rotation": [[]]}}]}"#),
            Some(ArtifactFormat::ReportDetailsJson)
        );
        assert_eq!(
            sniff_format("<!DOCTYPE html><html><body></body></html>"),
            Some(ArtifactFormat::Html)
        );
        assert_eq!(sniff_format(r#"{"players": []}"#), None);
        assert_eq!(sniff_format("plain text"), None);
    }

    #[test]
    fn invalid_json_yields_empty_sequence_with_skip_log() {
        let parser = CastSequenceParser::default();
        let parsed = parser.parse_artifact("{ \"rotation\": [", None, None);

        assert!(parsed.is_empty());
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].reason, SkipReason::InvalidJson);
    }

    #[test]
    fn unknown_json_shape_is_reported_not_raised() {
        let parser = CastSequenceParser::default();
        let parsed = parser.parse_artifact(r#"{"fightName": "Golem"}"#, None, None);

        assert!(parsed.is_empty());
        assert_eq!(parsed.format, None);
        assert_eq!(parsed.skipped[0].reason, SkipReason::UnknownFormat);
    }

    #[test]
    fn identity_is_attached_and_observed_dps_fills_unknown_value() {
        let parser = CastSequenceParser::default();
        let html = r#"<table><tr><td data-original-title="4023510 damage&lt;br&gt;100% of total">62855</td></tr></table>
            <img class="rot-icon" src="https://render.guildwars2.com/file/AAA/5526.png" data-original-title="Arc Lightning at 0.500s for 512ms">"#;
        let identity = BuildMetadataRecord::new("Power Catalyst", BenchmarkCategory::Dps);

        let parsed = parser.parse_artifact(html, None, Some(&identity));
        let record = parsed.build_metadata.expect("Expected build identity to be attached");

        assert_eq!(record.name, "Power Catalyst");
        assert_eq!(record.overall_dps, Some(62855.0));
        assert_eq!(parsed.sequence.len(), 1);
    }

    fn scrambled_canonical_artifact(cast_times: &[f64]) -> String {
        let entries: Vec<serde_json::Value> = cast_times
            .iter()
            .enumerate()
            .map(|(index, cast_time)| json!([cast_time, 100 + index as i64, 250, 1, 1.0]))
            .collect();
        json!({"rotation": [entries], "skillMap": {}}).to_string()
    }

    proptest! {
        #[test]
        fn parsed_sequences_are_sorted_by_cast_time(
            cast_times in proptest::collection::vec(-30.0_f64..600.0, 0..40)
        ) {
            let parser = CastSequenceParser::default();
            let sequence = parser.parse(&scrambled_canonical_artifact(&cast_times), None);

            prop_assert_eq!(sequence.len(), cast_times.len());
            for window in sequence.events().windows(2) {
                prop_assert!(window[0].cast_time <= window[1].cast_time);
            }
            for event in sequence.events() {
                prop_assert!(sequence.ability(event.ability_id).is_some());
            }
        }
    }
}
