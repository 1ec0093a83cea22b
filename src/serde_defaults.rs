use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlotValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl SlotValue {
    fn into_text(self) -> String {
        match self {
            SlotValue::Text(text) => text,
            SlotValue::Integer(value) => value.to_string(),
            SlotValue::Float(value) => value.to_string(),
        }
    }
}

// Slot maps written by older collectors sometimes carry numeric ids instead of strings.
pub(crate) fn lenient_string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw_map = Option::<BTreeMap<String, Option<SlotValue>>>::deserialize(deserializer)?;
    Ok(raw_map
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(slot, value)| value.map(|value| (slot, value.into_text())))
        .collect())
}
