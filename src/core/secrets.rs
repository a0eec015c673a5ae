//! The `character_secrets` column holds a JSON object; imports merge keys into it.

use serde_json::{Map, Value};
use tracing::debug;

/// Parses stored secrets. Missing, invalid, or non-object JSON yields an empty object.
pub fn parse(raw: Option<&str>) -> Map<String, Value> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            debug!("Discarding unparseable character_secrets: {}", raw);
            Map::new()
        }
    }
}

/// Overlays `updates` onto the stored secrets and returns the merged object.
pub fn merge(raw: Option<&str>, updates: Map<String, Value>) -> Map<String, Value> {
    let mut secrets = parse(raw);
    for (key, value) in updates {
        secrets.insert(key, value);
    }
    secrets
}

pub fn to_text(secrets: &Map<String, Value>) -> String {
    Value::Object(secrets.clone()).to_string()
}

/// K-level recorded in secrets, as text.
pub fn klevel(secrets: &Map<String, Value>) -> Option<String> {
    match secrets.get("klevel")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
