pub mod model;
mod overrides;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub use model::{
    is_sentinel_id, sentinel_records, AbilityRecord, AbilityTable, RawAbility, RawFact,
    SkillSlot, SlotCategory, WeaponType, SENTINEL_ABILITY_IDS,
};

const RECHARGE_FACT: (&str, &str) = ("Recharge", "Recharge");
const CAST_TIME_FACT: (&str, &str) = ("Time", "Cast Time");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonomyBuild {
    pub table: AbilityTable,
    pub uncategorized: AbilityTable,
    pub carried_forward: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyMetadata {
    pub generated_at: String,
    pub total_abilities: usize,
    pub categorized_abilities: usize,
    pub uncategorized_abilities: usize,
    pub carried_forward: usize,
}

impl TaxonomyMetadata {
    pub fn from_build(build: &TaxonomyBuild, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            total_abilities: build.table.len() + build.uncategorized.len(),
            categorized_abilities: build.table.len(),
            uncategorized_abilities: build.uncategorized.len(),
            carried_forward: build.carried_forward,
        }
    }
}

pub fn build(raw_abilities: &[RawAbility], previous_table: &AbilityTable) -> TaxonomyBuild {
    let mut batch = AbilityTable::new();
    for raw_ability in raw_abilities {
        let record = classify(raw_ability);
        if let Some(replaced) = batch.insert(record) {
            tracing::debug!(
                ability_id = replaced.id,
                "Duplicate ability id in catalog batch, keeping the later descriptor"
            );
        }
    }

    let mut carried_forward = 0_usize;
    for previous_record in previous_table.iter() {
        if batch.contains(previous_record.id) || is_sentinel_id(previous_record.id) {
            continue;
        }
        batch.insert(previous_record.clone());
        carried_forward += 1;
    }

    let mut table = AbilityTable::new();
    let mut uncategorized = AbilityTable::new();
    for record in batch.iter() {
        if is_sentinel_id(record.id) {
            continue;
        }

        if record.has_category() {
            table.insert(record.clone());
        } else {
            uncategorized.insert(record.clone());
        }
    }

    for sentinel in sentinel_records() {
        table.insert(sentinel);
    }

    tracing::info!(
        raw_abilities = raw_abilities.len(),
        categorized_abilities = table.len(),
        uncategorized_abilities = uncategorized.len(),
        carried_forward,
        "Built ability taxonomy"
    );

    TaxonomyBuild {
        table,
        uncategorized,
        carried_forward,
    }
}

pub fn classify(raw_ability: &RawAbility) -> AbilityRecord {
    let slot = raw_ability.slot.as_deref().unwrap_or("").trim();

    let mut record = AbilityRecord::new(raw_ability.id, raw_ability.name.trim());
    record.icon = raw_ability.icon.clone().unwrap_or_default();
    record.weapon_type = raw_ability
        .weapon_type
        .as_deref()
        .map(WeaponType::from_name)
        .unwrap_or_default();
    record.recharge = fact_value(raw_ability, RECHARGE_FACT).unwrap_or(0.0);
    record.cast_time = fact_value(raw_ability, CAST_TIME_FACT).unwrap_or(0.0);

    apply_slot_classification(&mut record, slot);
    if overrides::apply_downed_promotion(&mut record, &raw_ability.professions, slot) {
        tracing::debug!(ability_id = record.id, slot, "Promoted downed slot to weapon skill");
    }
    if overrides::apply_ability_override(&mut record) {
        tracing::debug!(
            ability_id = record.id,
            skill_type = record.skill_type.code(),
            "Applied ability slot override"
        );
    }

    record
}

fn fact_value(raw_ability: &RawAbility, (kind, text): (&str, &str)) -> Option<f64> {
    raw_ability
        .facts
        .iter()
        .find(|fact| fact.matches(kind, text))
        .and_then(RawFact::numeric_value)
}

fn apply_slot_classification(record: &mut AbilityRecord, slot: &str) {
    if let Some(position) = numbered_slot(slot, "Weapon_") {
        if let Some(weapon_slot) = SkillSlot::weapon(position) {
            record.skill_type = weapon_slot;
            record.is_weapon_skill = true;
            record.is_auto_attack = position == 1;
        }
        return;
    }

    if let Some(position) = numbered_slot(slot, "Profession_") {
        if let Some(profession_slot) = SkillSlot::profession(position) {
            record.skill_type = profession_slot;
            record.is_profession_skill = true;
        }
        return;
    }

    if let Some(position) = overrides::downed_slot_position(slot) {
        // Downed slots keep their weapon position but carry no category unless promoted.
        if position <= 4 {
            record.skill_type = SkillSlot::weapon(position).unwrap_or_default();
        }
        return;
    }

    match slot {
        "Weapon" => {
            record.skill_type = SkillSlot::Weapon1;
            record.is_weapon_skill = true;
        }
        "Heal" => {
            record.skill_type = SkillSlot::Heal;
            record.is_heal_skill = true;
        }
        "Utility" => {
            record.skill_type = SkillSlot::Utility1;
            record.is_utility_skill = true;
        }
        "Elite" => {
            record.skill_type = SkillSlot::Elite;
            record.is_elite_skill = true;
        }
        _ => {}
    }
}

fn numbered_slot(slot: &str, prefix: &str) -> Option<u8> {
    slot.strip_prefix(prefix)
        .and_then(|position| position.parse::<u8>().ok())
}
