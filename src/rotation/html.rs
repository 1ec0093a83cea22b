use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use super::{
    canonical, AbilityDescriptor, AdapterOutput, CastEvent, CastSequenceParser, SkipReason,
    DEFAULT_QUICKNESS, STATUS_COMPLETED, UNKNOWN_ABILITY_NAME,
};
use crate::ability_id::{canonical_icon_url, DROPPED_ABILITY_ID};

const ROTATION_ICON_CLASS: &str = "rot-icon";
const CANCELLED_CAST_CLASS: &str = "rot-cancelled";
const TOOLTIP_ATTRIBUTES: [&str; 3] = ["data-original-title", "data-bs-original-title", "title"];
const EMBEDDED_LOG_MARKER: &str = "_logData";
const MIN_PLAUSIBLE_DPS: f64 = 1000.0;
const MAX_PLAUSIBLE_DPS: f64 = 100_000.0;
const TOTAL_SHARE_MARKER: &str = "100% of total";

lazy_static! {
    // Quoted attribute values may hold raw `<br>` markup, so `>` only closes a tag outside quotes.
    static ref IMG_TAG: Regex =
        Regex::new(r#"(?is)<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid img tag regex");
    static ref TAG_ATTRIBUTE: Regex =
        Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("valid attribute regex");
    static ref TOOLTIP_TIME: Regex =
        Regex::new(r"\bat\s+([-+]?\d+\.?\d*)s").expect("valid tooltip time regex");
    static ref TOOLTIP_DURATION: Regex =
        Regex::new(r"for\s+(\d+\.?\d*)ms").expect("valid tooltip duration regex");
    static ref LINE_BREAK: Regex = Regex::new(r"(?i)<br\s*/?>|\n").expect("valid line break regex");
    static ref TABLE_CELL: Regex =
        Regex::new(r#"(?is)<td\b((?:[^>"']|"[^"]*"|'[^']*')*)>(.*?)</td>"#).expect("valid table cell regex");
    static ref MARKUP_TAG: Regex = Regex::new(r"(?s)<[^>]*>").expect("valid markup tag regex");
    static ref DPS_VALUE: Regex = Regex::new(r"^\d{1,6}$").expect("valid dps value regex");
}

struct TooltipLine {
    ability_name: String,
    cast_time: f64,
    duration_ms: f64,
}

pub(super) fn parse(parser: &CastSequenceParser, markup: &str, output: &mut AdapterOutput) {
    let mut rotation_icon_count = 0_usize;

    for (entry_index, tag_match) in IMG_TAG
        .find_iter(markup)
        .filter(|tag_match| has_class(&tag_attributes(tag_match.as_str()), ROTATION_ICON_CLASS))
        .enumerate()
    {
        rotation_icon_count += 1;
        parse_rotation_icon(parser, entry_index, tag_match.as_str(), output);
    }

    output.observed_dps = extract_overall_dps(markup);

    if rotation_icon_count > 0 {
        return;
    }

    match embedded_log_data(markup) {
        Some(log_data) => {
            tracing::debug!("Page has no rotation icons, reading embedded log data");
            canonical::parse_report_details(parser, &log_data, output);
        }
        None => {
            tracing::warn!("No rotation icons found in HTML artifact");
        }
    }
}

fn parse_rotation_icon(parser: &CastSequenceParser, entry_index: usize, tag: &str, output: &mut AdapterOutput) {
    let attributes = tag_attributes(tag);

    let Some(raw_tooltip) = TOOLTIP_ATTRIBUTES
        .iter()
        .find_map(|attribute_name| attributes.get(*attribute_name))
        .filter(|tooltip| !tooltip.trim().is_empty())
    else {
        output.skip(entry_index, SkipReason::MissingTooltip, "rotation icon without tooltip");
        return;
    };

    let Some(tooltip) = parse_tooltip(raw_tooltip) else {
        output.skip(entry_index, SkipReason::MalformedEntry, first_tooltip_line(raw_tooltip));
        return;
    };

    let icon_source = attributes.get("src").map(String::as_str).unwrap_or_default();
    let ability_id = parser.resolver.resolve(icon_source);
    if ability_id == DROPPED_ABILITY_ID {
        output.skip(entry_index, SkipReason::UnresolvableIdentifier, icon_source);
        return;
    }

    if has_class(&attributes, CANCELLED_CAST_CLASS)
        && !parser
            .settings
            .allows_cancelled_cast(&tooltip.ability_name, tooltip.duration_ms)
    {
        output.skip(
            entry_index,
            SkipReason::CancelledCast,
            format!("{} for {}ms", tooltip.ability_name, tooltip.duration_ms),
        );
        return;
    }

    output.events.push(CastEvent {
        cast_time: tooltip.cast_time,
        ability_id,
        duration: tooltip.duration_ms,
        status: STATUS_COMPLETED,
        quickness: DEFAULT_QUICKNESS,
    });

    output.abilities.entry(ability_id).or_insert_with(|| {
        let ability_name = if tooltip.ability_name.is_empty() {
            UNKNOWN_ABILITY_NAME.to_string()
        } else {
            tooltip.ability_name.clone()
        };
        AbilityDescriptor::new(
            ability_name,
            canonical_icon_url(icon_source, &parser.settings.report_host),
        )
    });
}

fn tag_attributes(tag: &str) -> HashMap<String, String> {
    TAG_ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|captures| {
            let attribute_name = captures.get(1)?.as_str().to_ascii_lowercase();
            let attribute_value = captures.get(2).or_else(|| captures.get(3))?.as_str();
            Some((attribute_name, attribute_value.to_string()))
        })
        .collect()
}

fn has_class(attributes: &HashMap<String, String>, class_name: &str) -> bool {
    attributes
        .get("class")
        .is_some_and(|classes| classes.split_whitespace().any(|value| value == class_name))
}

fn first_tooltip_line(raw_tooltip: &str) -> String {
    let decoded_tooltip = decode_entities(raw_tooltip);
    let first_line = LINE_BREAK.split(&decoded_tooltip).next().unwrap_or_default();
    first_line.trim().to_string()
}

/// Reads `"<name> at <±N.NNN>s for <N>ms"` from the first tooltip line.
fn parse_tooltip(raw_tooltip: &str) -> Option<TooltipLine> {
    let first_line = first_tooltip_line(raw_tooltip);

    let time_captures = TOOLTIP_TIME.captures(&first_line)?;
    let cast_time = time_captures.get(1)?.as_str().parse::<f64>().ok()?;
    if !cast_time.is_finite() {
        return None;
    }

    let ability_name = first_line
        .split_once(" at ")
        .map(|(name, _)| name)
        .unwrap_or_else(|| &first_line[..time_captures.get(0).map_or(0, |value| value.start())])
        .trim()
        .to_string();

    let duration_ms = TOOLTIP_DURATION
        .captures(&first_line)
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    Some(TooltipLine {
        ability_name,
        cast_time,
        duration_ms,
    })
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut decoded = String::with_capacity(text.len());
    let mut remainder = text;

    while let Some(ampersand_position) = remainder.find('&') {
        decoded.push_str(&remainder[..ampersand_position]);
        let candidate = &remainder[ampersand_position..];

        let replacement = candidate
            .find(';')
            .filter(|semicolon_position| *semicolon_position <= 10)
            .and_then(|semicolon_position| {
                decode_entity(&candidate[1..semicolon_position]).map(|character| (character, semicolon_position))
            });

        match replacement {
            Some((character, semicolon_position)) => {
                decoded.push(character);
                remainder = &candidate[semicolon_position + 1..];
            }
            None => {
                decoded.push('&');
                remainder = &candidate[1..];
            }
        }
    }

    decoded.push_str(remainder);
    decoded
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let code_point = match numeric.strip_prefix(['x', 'X']) {
            Some(hex_digits) => u32::from_str_radix(hex_digits, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code_point);
    }

    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Player DPS from the report's damage table: the cell marked as 100% of total,
/// otherwise the largest plausible damage cell.
pub fn extract_overall_dps(markup: &str) -> Option<f64> {
    let mut candidates = Vec::new();

    for captures in TABLE_CELL.captures_iter(markup) {
        let Some(cell_attributes) = captures.get(1).map(|value| tag_attributes(value.as_str())) else {
            continue;
        };
        let Some(tooltip) = cell_attributes
            .get("data-original-title")
            .map(|tooltip| decode_entities(tooltip))
            .filter(|tooltip| tooltip.to_ascii_lowercase().contains("damage"))
        else {
            continue;
        };

        let cell_text = captures
            .get(2)
            .map(|value| MARKUP_TAG.replace_all(value.as_str(), ""))
            .unwrap_or_default();
        let cell_text = cell_text.trim();
        if !DPS_VALUE.is_match(cell_text) {
            continue;
        }

        let Ok(dps_value) = cell_text.parse::<f64>() else {
            continue;
        };
        if !(MIN_PLAUSIBLE_DPS..=MAX_PLAUSIBLE_DPS).contains(&dps_value) {
            continue;
        }

        if tooltip.contains(TOTAL_SHARE_MARKER) {
            return Some(dps_value);
        }
        candidates.push(dps_value);
    }

    candidates.into_iter().reduce(f64::max)
}

/// Pulls the `_logData = {...}` object out of a report page script.
fn embedded_log_data(markup: &str) -> Option<Value> {
    let marker_position = markup.find(EMBEDDED_LOG_MARKER)?;
    let after_marker = &markup[marker_position + EMBEDDED_LOG_MARKER.len()..];
    let object_start = after_marker.find('{')?;
    let object_text = balanced_object(&after_marker[object_start..])?;

    match serde_json::from_str::<Value>(object_text) {
        Ok(log_data) => Some(log_data),
        Err(error) => {
            tracing::warn!(parse_error = %error, "Embedded log data is not valid JSON");
            None
        }
    }
}

fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (position, character) in text.char_indices() {
        if in_string {
            match character {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match character {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=position]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{balanced_object, decode_entities, extract_overall_dps, parse_tooltip};
    use crate::rotation::{ArtifactFormat, CastSequenceParser, SkipReason, STATUS_COMPLETED};

    fn rotation_icon(source: &str, tooltip: &str, classes: &str) -> String {
        format!(r#"<img class="{classes}" src="{source}" data-original-title="{tooltip}">"#)
    }

    #[test]
    fn short_cancelled_allow_listed_cast_is_dropped() {
        let markup = rotation_icon(
            "https://render.guildwars2.com/file/ABC/1234.png",
            "Spatial Surge at -1.250s for 280ms&lt;br&gt;Cancelled&lt;br&gt;Hit 3 times",
            "rot-icon rot-cancelled",
        );

        let parsed = CastSequenceParser::default().parse_artifact(&markup, None, None);

        assert!(parsed.is_empty());
        assert!(parsed.sequence.abilities().is_empty());
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].reason, SkipReason::CancelledCast);
    }

    #[test]
    fn cancelled_casts_survive_only_when_allow_listed_and_long_enough() {
        let markup = [
            rotation_icon(
                "https://render.guildwars2.com/file/ABC/1234.png",
                "Spatial Surge at 2.000s for 320ms",
                "rot-icon rot-cancelled",
            ),
            rotation_icon(
                "https://render.guildwars2.com/file/DEF/5678.png",
                "Mind Slash at 1.000s for 900ms",
                "rot-icon rot-cancelled",
            ),
            rotation_icon(
                "/cache/https_render.guildwars2.com_file_GHI_4321.png",
                "Mind Slash at 0.500s for 450ms",
                "rot-icon",
            ),
        ]
        .join("\n");

        let parsed = CastSequenceParser::default().parse_artifact(&markup, Some(ArtifactFormat::Html), None);
        let ids: Vec<i64> = parsed.sequence.events().iter().map(|event| event.ability_id).collect();

        assert_eq!(ids, vec![4321, 1234]);
        assert_eq!(parsed.sequence.events()[0].status, STATUS_COMPLETED);
        assert_eq!(
            parsed.sequence.ability(4321).map(|descriptor| descriptor.icon.as_str()),
            Some("https://render.guildwars2.com/file/GHI/4321.png")
        );
    }

    #[test]
    fn tooltip_uses_first_decoded_line_only() {
        let tooltip = parse_tooltip("Dragon&#39;s Maw at +12.5s for 1500ms&lt;br/&gt;at 99.000s for 1ms")
            .expect("Expected tooltip to parse");

        assert_eq!(tooltip.ability_name, "Dragon's Maw");
        assert_eq!(tooltip.cast_time, 12.5);
        assert_eq!(tooltip.duration_ms, 1500.0);
        assert!(parse_tooltip("Weapon Swap&lt;br&gt;at 1.0s").is_none());
    }

    #[test]
    fn attribute_order_and_tooltip_fallbacks_are_tolerated() {
        let markup = r#"<IMG data-bs-original-title='Glyph of Storms at 3.250s for 0ms' SRC="https://render.guildwars2.com/file/X/5516.png" class="rot-icon">
            <img src="https://render.guildwars2.com/file/X/5517.png" class="rot-icon">"#;

        let parsed = CastSequenceParser::default().parse_artifact(markup, None, None);

        assert_eq!(parsed.sequence.len(), 1);
        assert_eq!(parsed.sequence.events()[0].cast_time, 3.25);
        assert_eq!(parsed.skipped[0].reason, SkipReason::MissingTooltip);
    }

    #[test]
    fn raw_line_breaks_inside_tooltips_do_not_end_the_tag() {
        let class_first = rotation_icon(
            "https://render.guildwars2.com/file/A/5526.png",
            "Arc Lightning at 1.250s for 512ms<br>Hit 3 times<br>x",
            "rot-icon",
        );
        let class_last = r#"<img src="https://render.guildwars2.com/file/B/5539.png" data-original-title='Lightning Whip at 0.750s for 300ms<br/>Hit 1 time' class="rot-icon">"#;
        let markup = format!("{class_first}\n{class_last}");

        let parsed = CastSequenceParser::default().parse_artifact(&markup, Some(ArtifactFormat::Html), None);
        let ids: Vec<i64> = parsed.sequence.events().iter().map(|event| event.ability_id).collect();

        assert_eq!(ids, vec![5539, 5526]);
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.sequence.events()[1].duration, 512.0);
        assert_eq!(
            parsed.sequence.ability(5526).map(|descriptor| descriptor.name.as_str()),
            Some("Arc Lightning")
        );
    }

    #[test]
    fn entities_are_decoded_exactly_once() {
        let tooltip = parse_tooltip("Fire &amp;lt;Burst&amp;gt; at 1.000s for 100ms")
            .expect("Expected tooltip to parse");

        assert_eq!(tooltip.ability_name, "Fire &lt;Burst&gt;");
    }

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;br&gt; &#x41;&#66; &unknown; &"), "a & b <br> AB &unknown; &");
    }

    #[test]
    fn overall_dps_prefers_total_share_then_maximum() {
        let with_total = r#"<tr><td data-original-title="120 damage">99</td>
            <td data-original-title="9000000 damage&lt;br&gt;50% of total">70000</td>
            <td class="sorted" data-original-title="4023510 damage&lt;br&gt;100% of total">
                62855
            </td></tr>"#;
        assert_eq!(extract_overall_dps(with_total), Some(62855.0));

        let without_total = r#"<td data-original-title="damage">31000</td><td data-original-title="Damage">45000</td><td data-original-title="damage">250000</td>"#;
        assert_eq!(extract_overall_dps(without_total), Some(45000.0));
        assert_eq!(extract_overall_dps("<td>50000</td>"), None);

        let raw_break = r#"<td data-original-title="4023510 damage<br>100% of total">62855</td>"#;
        assert_eq!(extract_overall_dps(raw_break), Some(62855.0));
    }

    #[test]
    fn reads_embedded_log_data_when_page_has_no_icons() {
        let markup = r#"<html><script>var _logData = {"players": [{"details": {"rotation": [[[1.5, 40183, 300, 1, 1.0]]]}}],
            "skillMap": {"s40183": {"name": "Brace {\"quoted\"}", "icon": ""}}};</script></html>"#;

        let parsed = CastSequenceParser::default().parse_artifact(markup, None, None);

        assert_eq!(parsed.format, Some(ArtifactFormat::Html));
        assert_eq!(parsed.sequence.len(), 1);
        assert_eq!(
            parsed.sequence.ability(40183).map(|descriptor| descriptor.name.as_str()),
            Some("Brace {\"quoted\"}")
        );
        assert_eq!(balanced_object("{\"a\": \"}\"} trailing"), Some("{\"a\": \"}\"}"));
    }
}
