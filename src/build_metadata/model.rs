use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::serde_defaults::{lenient_string_map, null_as_default};

pub const UNKNOWN_SLOT_VALUE: &str = "-1";
pub const UNKNOWN_PROFESSION: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BenchmarkCategory {
    #[default]
    #[serde(rename = "dps")]
    Dps,
    #[serde(rename = "quick", alias = "quickness")]
    Quickness,
    #[serde(rename = "alac", alias = "alacrity")]
    Alacrity,
}

impl BenchmarkCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            BenchmarkCategory::Dps => "dps",
            BenchmarkCategory::Quickness => "quick",
            BenchmarkCategory::Alacrity => "alac",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildArchetype {
    #[default]
    Power,
    Condition,
}

impl BuildArchetype {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildArchetype::Power => "power",
            BuildArchetype::Condition => "condition",
        }
    }
}

/// Persisted slot identifiers, named after the in-game keybind of each slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Heal,
    Utility1,
    Utility2,
    Utility3,
    Elite,
}

pub const REQUIRED_SLOT_KEYS: [SlotKey; 5] = [
    SlotKey::Heal,
    SlotKey::Utility1,
    SlotKey::Utility2,
    SlotKey::Utility3,
    SlotKey::Elite,
];

impl SlotKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotKey::Heal => "slot_6",
            SlotKey::Utility1 => "slot_7",
            SlotKey::Utility2 => "slot_8",
            SlotKey::Utility3 => "slot_9",
            SlotKey::Elite => "slot_0",
        }
    }
}

pub fn is_unknown_slot_value(value: &str) -> bool {
    let trimmed_value = value.trim();
    trimmed_value.is_empty() || trimmed_value == UNKNOWN_SLOT_VALUE
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildKey {
    pub name: String,
    pub benchmark_type: BenchmarkCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetadataRecord {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default)]
    pub benchmark_type: BenchmarkCategory,
    #[serde(default = "unknown_profession", deserialize_with = "null_as_default")]
    pub profession: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub elite_spec: String,
    #[serde(default)]
    pub build_type: BuildArchetype,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub url_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dps_report_url: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub sc_link_url: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub html_file_path: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub weapons: String,
    #[serde(default, deserialize_with = "lenient_string_map")]
    pub skill_slots: BTreeMap<String, String>,
    #[serde(default)]
    pub overall_dps: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn unknown_profession() -> String {
    UNKNOWN_PROFESSION.to_string()
}

impl BuildMetadataRecord {
    pub fn new(name: impl Into<String>, benchmark_type: BenchmarkCategory) -> Self {
        Self {
            name: name.into(),
            url: String::new(),
            benchmark_type,
            profession: unknown_profession(),
            elite_spec: String::new(),
            build_type: BuildArchetype::Power,
            url_name: String::new(),
            dps_report_url: String::new(),
            sc_link_url: String::new(),
            html_file_path: String::new(),
            weapons: String::new(),
            skill_slots: BTreeMap::new(),
            overall_dps: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> BuildKey {
        BuildKey {
            name: self.name.clone(),
            benchmark_type: self.benchmark_type,
        }
    }

    pub fn is_complete(&self) -> bool {
        REQUIRED_SLOT_KEYS
            .iter()
            .all(|slot_key| self.skill_slots.contains_key(slot_key.as_str()))
    }

    pub fn missing_slots(&self) -> Vec<&'static str> {
        REQUIRED_SLOT_KEYS
            .iter()
            .map(|slot_key| slot_key.as_str())
            .filter(|slot_key| !self.skill_slots.contains_key(*slot_key))
            .collect()
    }

    pub fn slot(&self, slot_key: SlotKey) -> Option<&str> {
        self.skill_slots.get(slot_key.as_str()).map(String::as_str)
    }

    pub fn set_slot(&mut self, slot_key: SlotKey, value: impl Into<String>) {
        self.skill_slots.insert(slot_key.as_str().to_string(), value.into());
    }

    /// Link written into rotation documents; a curated build page beats the scraped one.
    pub fn preferred_url(&self) -> &str {
        if self.sc_link_url.trim().is_empty() {
            &self.url
        } else {
            &self.sc_link_url
        }
    }

    pub(crate) fn has_unknown_profession(&self) -> bool {
        let profession = self.profession.trim();
        profession.is_empty() || profession.eq_ignore_ascii_case(UNKNOWN_PROFESSION)
    }
}

/// Ordered build records as persisted in the build table file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildMetadataTable {
    records: Vec<BuildMetadataRecord>,
}

impl BuildMetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildMetadataRecord> {
        self.records.iter()
    }

    pub fn get(&self, name: &str, benchmark_type: BenchmarkCategory) -> Option<&BuildMetadataRecord> {
        self.records
            .iter()
            .find(|record| record.name == name && record.benchmark_type == benchmark_type)
    }

    pub fn records(&self) -> &[BuildMetadataRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<BuildMetadataRecord> {
        &mut self.records
    }
}

impl FromIterator<BuildMetadataRecord> for BuildMetadataTable {
    fn from_iter<I: IntoIterator<Item = BuildMetadataRecord>>(records: I) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}
