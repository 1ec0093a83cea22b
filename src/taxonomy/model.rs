use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

use crate::ability_id::{NO_ABILITY_ID, RESOURCE_SWAP_ABILITY_ID, UNRESOLVED_ABILITY_ID};
use crate::serde_defaults::null_as_default;

pub const SENTINEL_ABILITY_IDS: [i64; 3] = [
    RESOURCE_SWAP_ABILITY_ID,
    NO_ABILITY_ID,
    UNRESOLVED_ABILITY_ID,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAbility {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub professions: Vec<String>,
    #[serde(default)]
    pub weapon_type: Option<String>,
    #[serde(default)]
    pub facts: Vec<RawFact>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFact {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub duration: Option<serde_json::Value>,
}

impl RawFact {
    pub(crate) fn matches(&self, kind: &str, text: &str) -> bool {
        self.kind.as_deref() == Some(kind) && self.text.as_deref() == Some(text)
    }

    pub(crate) fn numeric_value(&self) -> Option<f64> {
        self.value
            .as_ref()
            .or(self.duration.as_ref())
            .and_then(serde_json::Value::as_f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkillSlot {
    #[default]
    None,
    Weapon1,
    Weapon2,
    Weapon3,
    Weapon4,
    Weapon5,
    Heal,
    Utility1,
    Utility2,
    Utility3,
    Elite,
    Profession1,
    Profession2,
    Profession3,
    Profession4,
    Profession5,
    Profession6,
    Profession7,
}

const SKILL_SLOTS_BY_CODE: [SkillSlot; 18] = [
    SkillSlot::None,
    SkillSlot::Weapon1,
    SkillSlot::Weapon2,
    SkillSlot::Weapon3,
    SkillSlot::Weapon4,
    SkillSlot::Weapon5,
    SkillSlot::Heal,
    SkillSlot::Utility1,
    SkillSlot::Utility2,
    SkillSlot::Utility3,
    SkillSlot::Elite,
    SkillSlot::Profession1,
    SkillSlot::Profession2,
    SkillSlot::Profession3,
    SkillSlot::Profession4,
    SkillSlot::Profession5,
    SkillSlot::Profession6,
    SkillSlot::Profession7,
];

impl SkillSlot {
    pub fn code(self) -> u8 {
        SKILL_SLOTS_BY_CODE
            .iter()
            .position(|slot| *slot == self)
            .and_then(|position| u8::try_from(position).ok())
            .unwrap_or(0)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| SKILL_SLOTS_BY_CODE.get(index).copied())
    }

    pub fn weapon(position: u8) -> Option<Self> {
        (1..=5)
            .contains(&position)
            .then(|| SKILL_SLOTS_BY_CODE[usize::from(position)])
    }

    pub fn profession(position: u8) -> Option<Self> {
        (1..=7)
            .contains(&position)
            .then(|| SKILL_SLOTS_BY_CODE[usize::from(position) + 10])
    }
}

impl Serialize for SkillSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code().to_string())
    }
}

impl<'de> Deserialize<'de> for SkillSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = match NumericOrText::deserialize(deserializer)? {
            NumericOrText::Numeric(code) => code,
            NumericOrText::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| D::Error::custom(format!("invalid skill_type '{text}'")))?,
        };

        SkillSlot::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("unknown skill_type code {code}")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WeaponType {
    #[default]
    None,
    Greatsword,
    Hammer,
    Longbow,
    Rifle,
    Shortbow,
    Staff,
    Spear,
    Trident,
    HarpoonGun,
    Axe,
    Dagger,
    Mace,
    Pistol,
    Scepter,
    Sword,
    Focus,
    Shield,
    Torch,
    Warhorn,
}

const WEAPON_TYPES_BY_CODE: [(WeaponType, &str); 20] = [
    (WeaponType::None, "none"),
    (WeaponType::Greatsword, "greatsword"),
    (WeaponType::Hammer, "hammer"),
    (WeaponType::Longbow, "longbow"),
    (WeaponType::Rifle, "rifle"),
    (WeaponType::Shortbow, "shortbow"),
    (WeaponType::Staff, "staff"),
    (WeaponType::Spear, "spear"),
    (WeaponType::Trident, "trident"),
    (WeaponType::HarpoonGun, "harpoon gun"),
    (WeaponType::Axe, "axe"),
    (WeaponType::Dagger, "dagger"),
    (WeaponType::Mace, "mace"),
    (WeaponType::Pistol, "pistol"),
    (WeaponType::Scepter, "scepter"),
    (WeaponType::Sword, "sword"),
    (WeaponType::Focus, "focus"),
    (WeaponType::Shield, "shield"),
    (WeaponType::Torch, "torch"),
    (WeaponType::Warhorn, "warhorn"),
];

impl WeaponType {
    pub fn code(self) -> u8 {
        WEAPON_TYPES_BY_CODE
            .iter()
            .position(|(weapon_type, _)| *weapon_type == self)
            .and_then(|position| u8::try_from(position).ok())
            .unwrap_or(0)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| WEAPON_TYPES_BY_CODE.get(index))
            .map(|(weapon_type, _)| *weapon_type)
    }

    pub fn from_name(name: &str) -> Self {
        let normalized_name = name.trim().to_ascii_lowercase().replace('_', " ");
        WEAPON_TYPES_BY_CODE
            .iter()
            .find(|(_, label)| *label == normalized_name)
            .map(|(weapon_type, _)| *weapon_type)
            .unwrap_or_default()
    }
}

impl Serialize for WeaponType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for WeaponType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumericOrText::deserialize(deserializer)? {
            NumericOrText::Numeric(code) => WeaponType::from_code(code)
                .ok_or_else(|| D::Error::custom(format!("unknown weapon_type code {code}"))),
            NumericOrText::Text(text) => match text.trim().parse::<i64>() {
                Ok(code) => WeaponType::from_code(code)
                    .ok_or_else(|| D::Error::custom(format!("unknown weapon_type code {code}"))),
                Err(_) => Ok(WeaponType::from_name(&text)),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumericOrText {
    Numeric(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCategory {
    AutoAttack,
    WeaponSkill,
    Heal,
    Utility,
    Elite,
    ProfessionSkill,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub icon: String,
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub weapon_type: WeaponType,
    #[serde(default)]
    pub skill_type: SkillSlot,
    #[serde(default)]
    pub is_auto_attack: bool,
    #[serde(default)]
    pub is_weapon_skill: bool,
    #[serde(default)]
    pub is_utility_skill: bool,
    #[serde(default)]
    pub is_elite_skill: bool,
    #[serde(default)]
    pub is_heal_skill: bool,
    #[serde(default)]
    pub is_profession_skill: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recharge: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cast_time: f64,
}

impl AbilityRecord {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            icon: String::new(),
            id,
            name: name.into(),
            weapon_type: WeaponType::None,
            skill_type: SkillSlot::None,
            is_auto_attack: false,
            is_weapon_skill: false,
            is_utility_skill: false,
            is_elite_skill: false,
            is_heal_skill: false,
            is_profession_skill: false,
            recharge: 0.0,
            cast_time: 0.0,
        }
    }

    pub fn has_category(&self) -> bool {
        self.is_auto_attack
            || self.is_weapon_skill
            || self.is_utility_skill
            || self.is_elite_skill
            || self.is_heal_skill
            || self.is_profession_skill
    }

    pub fn category(&self) -> SlotCategory {
        if self.is_auto_attack {
            SlotCategory::AutoAttack
        } else if self.is_weapon_skill {
            SlotCategory::WeaponSkill
        } else if self.is_heal_skill {
            SlotCategory::Heal
        } else if self.is_utility_skill {
            SlotCategory::Utility
        } else if self.is_elite_skill {
            SlotCategory::Elite
        } else if self.is_profession_skill {
            SlotCategory::ProfessionSkill
        } else {
            SlotCategory::None
        }
    }
}

pub fn is_sentinel_id(ability_id: i64) -> bool {
    SENTINEL_ABILITY_IDS.contains(&ability_id)
}

pub fn sentinel_records() -> [AbilityRecord; 3] {
    [
        AbilityRecord::new(RESOURCE_SWAP_ABILITY_ID, "Weapon Swap"),
        AbilityRecord::new(NO_ABILITY_ID, "No Skill"),
        AbilityRecord::new(UNRESOLVED_ABILITY_ID, "Unknown Skill"),
    ]
}

/// Ability records keyed by id; persisted as a JSON object with stringified ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityTable {
    records: BTreeMap<i64, AbilityRecord>,
}

impl AbilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, ability_id: i64) -> Option<&AbilityRecord> {
        self.records.get(&ability_id)
    }

    pub fn contains(&self, ability_id: i64) -> bool {
        self.records.contains_key(&ability_id)
    }

    pub fn insert(&mut self, record: AbilityRecord) -> Option<AbilityRecord> {
        self.records.insert(record.id, record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbilityRecord> {
        self.records.values()
    }

    /// First record per display name in ascending id order. The table itself keeps every id.
    pub fn unique_by_name(&self) -> Vec<&AbilityRecord> {
        let mut seen_names = HashSet::new();
        self.records
            .values()
            .filter(|record| seen_names.insert(record.name.as_str()))
            .collect()
    }
}

impl FromIterator<AbilityRecord> for AbilityTable {
    fn from_iter<I: IntoIterator<Item = AbilityRecord>>(records: I) -> Self {
        let mut table = AbilityTable::new();
        for record in records {
            table.insert(record);
        }
        table
    }
}
