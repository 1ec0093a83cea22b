use super::model::{AbilityRecord, SkillSlot};

pub(crate) struct DownedSlotPromotion {
    pub(crate) profession: &'static str,
    pub(crate) first_slot_is_auto_attack: bool,
}

// Professions whose downed-state abilities are played as ordinary weapon skills.
// Necromancer is the upstream catalog's own rule. Revenant is a local extension of it and
// never marks an auto-attack.
pub(crate) const DOWNED_SLOT_PROMOTIONS: [DownedSlotPromotion; 2] = [
    DownedSlotPromotion {
        profession: "Necromancer",
        first_slot_is_auto_attack: true,
    },
    DownedSlotPromotion {
        profession: "Revenant",
        first_slot_is_auto_attack: false,
    },
];

// Mechanist alternate-mechanic abilities, keyed by ability id. Applied after every slot rule.
pub(crate) const ABILITY_SLOT_OVERRIDES: [(i64, SkillSlot); 9] = [
    (63188, SkillSlot::Profession1),
    (63334, SkillSlot::Profession1),
    (63185, SkillSlot::Profession1),
    (63345, SkillSlot::Profession2),
    (63367, SkillSlot::Profession2),
    (63293, SkillSlot::Profession2),
    (63121, SkillSlot::Profession3),
    (63236, SkillSlot::Profession3),
    (63141, SkillSlot::Profession3),
];

pub(crate) fn downed_slot_position(slot: &str) -> Option<u8> {
    slot.strip_prefix("Downed_")
        .and_then(|position| position.parse::<u8>().ok())
        .filter(|position| (1..=5).contains(position))
}

pub(crate) fn apply_downed_promotion(record: &mut AbilityRecord, professions: &[String], slot: &str) -> bool {
    let Some(position) = downed_slot_position(slot) else {
        return false;
    };

    let Some(promotion) = DOWNED_SLOT_PROMOTIONS.iter().find(|promotion| {
        professions
            .iter()
            .any(|profession| profession.eq_ignore_ascii_case(promotion.profession))
    }) else {
        return false;
    };

    record.is_weapon_skill = true;
    if let Some(weapon_slot) = SkillSlot::weapon(position) {
        record.skill_type = weapon_slot;
    }
    if position == 1 && promotion.first_slot_is_auto_attack {
        record.is_auto_attack = true;
    }

    true
}

pub(crate) fn apply_ability_override(record: &mut AbilityRecord) -> bool {
    let Some((_, forced_slot)) = ABILITY_SLOT_OVERRIDES
        .iter()
        .find(|(ability_id, _)| *ability_id == record.id)
    else {
        return false;
    };

    record.skill_type = *forced_slot;
    record.is_profession_skill = true;
    true
}
