use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::build_metadata::BuildMetadataRecord;

pub const STATUS_UNKNOWN: i64 = 0;
pub const STATUS_COMPLETED: i64 = 1;
pub const DEFAULT_QUICKNESS: f64 = 1.0;
pub const UNKNOWN_ABILITY_NAME: &str = "Unknown Skill";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastEvent {
    pub cast_time: f64,
    pub ability_id: i64,
    pub duration: f64,
    pub status: i64,
    pub quickness: f64,
}

impl CastEvent {
    pub fn new(cast_time: f64, ability_id: i64, duration: f64) -> Self {
        Self {
            cast_time,
            ability_id,
            duration,
            status: STATUS_UNKNOWN,
            quickness: DEFAULT_QUICKNESS,
        }
    }
}

impl Serialize for CastEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entry = serializer.serialize_seq(Some(5))?;
        entry.serialize_element(&self.cast_time)?;
        entry.serialize_element(&self.ability_id)?;
        match whole_number(self.duration) {
            Some(duration) => entry.serialize_element(&duration)?,
            None => entry.serialize_element(&self.duration)?,
        }
        entry.serialize_element(&self.status)?;
        entry.serialize_element(&self.quickness)?;
        entry.end()
    }
}

fn whole_number(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(value as i64)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(rename = "traitProc", alias = "isTraitProc", default)]
    pub trait_proc: bool,
    #[serde(rename = "gearProc", alias = "isGearProc", default)]
    pub gear_proc: bool,
}

impl AbilityDescriptor {
    pub fn new(name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            trait_proc: false,
            gear_proc: false,
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ABILITY_NAME, "")
    }
}

/// Time-ordered casts plus a descriptor for every ability they reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CastSequence {
    events: Vec<CastEvent>,
    abilities: BTreeMap<i64, AbilityDescriptor>,
}

impl CastSequence {
    pub(crate) fn from_parts(mut events: Vec<CastEvent>, mut abilities: BTreeMap<i64, AbilityDescriptor>) -> Self {
        events.sort_by(|left, right| left.cast_time.total_cmp(&right.cast_time));

        for event in &events {
            if !abilities.contains_key(&event.ability_id) {
                tracing::debug!(
                    ability_id = event.ability_id,
                    "Cast references ability without descriptor, adding placeholder"
                );
                abilities.insert(event.ability_id, AbilityDescriptor::unknown());
            }
        }

        Self { events, abilities }
    }

    pub fn events(&self) -> &[CastEvent] {
        &self.events
    }

    pub fn abilities(&self) -> &BTreeMap<i64, AbilityDescriptor> {
        &self.abilities
    }

    pub fn ability(&self, ability_id: i64) -> Option<&AbilityDescriptor> {
        self.abilities.get(&ability_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationBuildMetadata {
    pub name: String,
    pub profession: String,
    pub elite_spec: String,
    pub build_type: String,
    pub benchmark_type: String,
    pub url: String,
    pub dps_report_url: String,
    pub overall_dps: Option<f64>,
    pub skill_slots: BTreeMap<String, String>,
}

impl RotationBuildMetadata {
    pub fn from_record(record: &BuildMetadataRecord) -> Self {
        Self {
            name: record.name.clone(),
            profession: record.profession.clone(),
            elite_spec: record.elite_spec.clone(),
            build_type: record.build_type.as_str().to_string(),
            benchmark_type: record.benchmark_type.as_str().to_string(),
            url: record.preferred_url().to_string(),
            dps_report_url: record.dps_report_url.clone(),
            overall_dps: record.overall_dps,
            // Consumers read either all five slots or none.
            skill_slots: if record.is_complete() {
                record.skill_slots.clone()
            } else {
                BTreeMap::new()
            },
        }
    }
}

/// Canonical on-disk rotation shape. `rotation` keeps one extra list level for downstream readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationDocument {
    pub rotation: Vec<Vec<CastEvent>>,
    #[serde(rename = "skillMap")]
    pub skill_map: BTreeMap<String, AbilityDescriptor>,
    #[serde(rename = "buildMetadata", skip_serializing_if = "Option::is_none")]
    pub build_metadata: Option<RotationBuildMetadata>,
}

impl RotationDocument {
    pub fn new(sequence: &CastSequence, build_metadata: Option<&BuildMetadataRecord>) -> Self {
        Self {
            rotation: vec![sequence.events().to_vec()],
            skill_map: sequence
                .abilities()
                .iter()
                .map(|(ability_id, descriptor)| (format!("s{ability_id}"), descriptor.clone()))
                .collect(),
            build_metadata: build_metadata.map(RotationBuildMetadata::from_record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AbilityDescriptor, CastEvent, CastSequence, RotationDocument};
    use crate::build_metadata::{BenchmarkCategory, BuildMetadataRecord, SlotKey};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn sorts_events_stably_and_adds_placeholders() {
        let events = vec![
            CastEvent::new(2.0, 10, 100.0),
            CastEvent::new(-0.5, 20, 0.0),
            CastEvent::new(2.0, 30, 50.0),
        ];
        let mut abilities = BTreeMap::new();
        abilities.insert(10, AbilityDescriptor::new("First", "icon-10"));

        let sequence = CastSequence::from_parts(events, abilities);
        let ordered_ids: Vec<i64> = sequence.events().iter().map(|event| event.ability_id).collect();

        assert_eq!(ordered_ids, vec![20, 10, 30]);
        assert_eq!(
            sequence.ability(30).map(|descriptor| descriptor.name.as_str()),
            Some("Unknown Skill")
        );
    }

    #[test]
    fn serializes_canonical_document_shape() {
        let mut event = CastEvent::new(-1.25, 5526, 280.0);
        event.status = 1;
        let sequence = CastSequence::from_parts(
            vec![event],
            BTreeMap::from([(5526, AbilityDescriptor::new("Arc Lightning", "icon"))]),
        );

        let mut record = BuildMetadataRecord::new("Power Catalyst", BenchmarkCategory::Dps);
        record.set_slot(SlotKey::Heal, "5503");

        let document = serde_json::to_value(RotationDocument::new(&sequence, Some(&record)))
            .expect("Expected document to serialize");

        assert_eq!(document["rotation"], json!([[[-1.25, 5526, 280, 1, 1.0]]]));
        assert_eq!(document["skillMap"]["s5526"]["traitProc"], json!(false));
        assert_eq!(document["buildMetadata"]["skill_slots"], json!({}));
        assert_eq!(document["buildMetadata"]["benchmark_type"], json!("dps"));
    }
}
