use serde::Deserialize;
use std::collections::BTreeMap;

use super::model::{BenchmarkCategory, BuildArchetype, BuildMetadataRecord, UNKNOWN_PROFESSION};

const ELITE_SPEC_PROFESSIONS: [(&str, &str); 50] = [
    ("dragonhunter", "guardian"),
    ("firebrand", "guardian"),
    ("willbender", "guardian"),
    ("luminary", "guardian"),
    ("guardian", "guardian"),
    ("berserker", "warrior"),
    ("spellbreaker", "warrior"),
    ("bladesworn", "warrior"),
    ("paragon", "warrior"),
    ("warrior", "warrior"),
    ("scrapper", "engineer"),
    ("holosmith", "engineer"),
    ("mechanist", "engineer"),
    ("amalgam", "engineer"),
    ("engineer", "engineer"),
    ("druid", "ranger"),
    ("soulbeast", "ranger"),
    ("untamed", "ranger"),
    ("galeshot", "ranger"),
    ("ranger", "ranger"),
    ("daredevil", "thief"),
    ("deadeye", "thief"),
    ("specter", "thief"),
    ("spectre", "thief"),
    ("antiquary", "thief"),
    ("thief", "thief"),
    ("tempest", "elementalist"),
    ("weaver", "elementalist"),
    ("catalyst", "elementalist"),
    ("evoker", "elementalist"),
    ("elementalist", "elementalist"),
    ("chronomancer", "mesmer"),
    ("mirage", "mesmer"),
    ("virtuoso", "mesmer"),
    ("troubadour", "mesmer"),
    ("mesmer", "mesmer"),
    ("reaper", "necromancer"),
    ("scourge", "necromancer"),
    ("harbinger", "necromancer"),
    ("ritualist", "necromancer"),
    ("necromancer", "necromancer"),
    ("herald", "revenant"),
    ("renegade", "revenant"),
    ("vindicator", "revenant"),
    ("conduit", "revenant"),
    ("revenant", "revenant"),
    ("chrono", "mesmer"),
    ("dh", "guardian"),
    ("fb", "guardian"),
    ("wb", "guardian"),
];

// Short community abbreviations only match as whole words.
const ABBREVIATED_SPECS: [&str; 4] = ["chrono", "dh", "fb", "wb"];

const READABLE_NAME_UPPERCASE_TOKENS: [(&str, &str); 4] =
    [("Ih", "IH"), ("Gs", "GS"), ("Lb", "LB"), ("Sb", "SB")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessionMatch {
    pub profession: String,
    pub elite_spec: String,
}

pub fn deduce_profession(build_name: &str, url_path: &str) -> Option<ProfessionMatch> {
    let lower_build_name = build_name.to_ascii_lowercase();
    let lower_url_tail = url_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut candidates: Vec<&(&str, &str)> = ELITE_SPEC_PROFESSIONS.iter().collect();
    candidates.sort_by(|left, right| right.0.len().cmp(&left.0.len()));

    candidates
        .into_iter()
        .find(|(elite_spec, _)| {
            if ABBREVIATED_SPECS.contains(elite_spec) {
                contains_word(&lower_build_name, elite_spec) || contains_word(&lower_url_tail, elite_spec)
            } else {
                lower_build_name.contains(elite_spec) || lower_url_tail.contains(elite_spec)
            }
        })
        .map(|(elite_spec, profession)| ProfessionMatch {
            profession: title_case(profession),
            elite_spec: title_case(full_spec_name(elite_spec)),
        })
}

fn full_spec_name(elite_spec: &str) -> &str {
    match elite_spec {
        "chrono" => "chronomancer",
        "dh" => "dragonhunter",
        "fb" => "firebrand",
        "wb" => "willbender",
        other => other,
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|character: char| !character.is_ascii_alphanumeric())
        .any(|token| token == word)
}

pub fn build_archetype(build_name: &str) -> BuildArchetype {
    if build_name.to_ascii_lowercase().contains("condition") {
        BuildArchetype::Condition
    } else {
        BuildArchetype::Power
    }
}

pub fn benchmark_category(build_name: &str) -> BenchmarkCategory {
    let lower_build_name = build_name.to_ascii_lowercase();
    if lower_build_name.contains("quick") {
        BenchmarkCategory::Quickness
    } else if lower_build_name.contains("alac") {
        BenchmarkCategory::Alacrity
    } else {
        BenchmarkCategory::Dps
    }
}

pub fn readable_name(url_name: &str) -> String {
    let spaced_name = url_name.replace('-', " ");
    let mut readable = title_case(&spaced_name);
    for (token, replacement) in READABLE_NAME_UPPERCASE_TOKENS {
        readable = readable.replace(token, replacement);
    }
    readable
}

pub fn name_as_file_stem(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}

fn title_case(value: &str) -> String {
    let mut titled = String::with_capacity(value.len());
    let mut at_word_start = true;
    for character in value.chars() {
        if character.is_alphabetic() {
            if at_word_start {
                titled.extend(character.to_uppercase());
            } else {
                titled.extend(character.to_lowercase());
            }
            at_word_start = false;
        } else {
            titled.push(character);
            at_word_start = true;
        }
    }
    titled
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManualLogEntry {
    ReportUrl(String),
    Links {
        #[serde(rename = "Dps.Report", default)]
        dps_report: Option<String>,
        #[serde(rename = "ScLink", default)]
        sc_link: Option<String>,
    },
}

/// Turns a hand-maintained `{ build name: report link(s) }` list into incomplete build records.
pub fn records_from_manual_list(manual_logs: &BTreeMap<String, ManualLogEntry>) -> Vec<BuildMetadataRecord> {
    let mut records = Vec::with_capacity(manual_logs.len());

    for (build_name, entry) in manual_logs {
        let (report_url, curated_url) = match entry {
            ManualLogEntry::ReportUrl(report_url) => (Some(report_url.as_str()), None),
            ManualLogEntry::Links {
                dps_report,
                sc_link,
            } => (dps_report.as_deref(), sc_link.as_deref()),
        };

        let Some(report_url) = report_url.map(str::trim).filter(|value| !value.is_empty()) else {
            tracing::warn!(build_name = %build_name, "Manual log entry has no report link, skipping");
            continue;
        };

        let mut record = BuildMetadataRecord::new(build_name.trim(), benchmark_category(build_name));
        record.build_type = build_archetype(build_name);
        record.dps_report_url = report_url.to_string();
        record.url = report_url.to_string();
        record.sc_link_url = curated_url.map(str::trim).unwrap_or_default().to_string();
        record.url_name = name_as_file_stem(build_name);

        match deduce_profession(build_name, record.sc_link_url.as_str()) {
            Some(profession_match) => {
                record.profession = profession_match.profession;
                record.elite_spec = profession_match.elite_spec;
            }
            None => record.profession = UNKNOWN_PROFESSION.to_string(),
        }

        records.push(record);
    }

    records
}
