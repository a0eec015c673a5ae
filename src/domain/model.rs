use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// One raw input row: a CSV line or a JSON object, keyed by column/field name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, Value>,
}

impl Record {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.data.into_iter().collect())
    }
}

/// Ordered column/value pairs fed to the dynamic INSERT/UPDATE builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets `column` only when `value` is present; `None` leaves the column out entirely.
    pub fn with_opt<V: Into<Value>>(mut self, column: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(column, value);
        }
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    pub fn extend(&mut self, other: &Fields) {
        for (column, value) in &other.entries {
            self.insert(column, value.clone());
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses `column=value` pairs as typed on the command line.
    /// Integers and `null` are recognised, everything else is text.
    pub fn from_assignments(assignments: &[String]) -> Option<Fields> {
        let mut fields = Fields::new();
        for assignment in assignments {
            let (column, raw) = assignment.split_once('=')?;
            let value = if raw == "null" {
                Value::Null
            } else if let Ok(number) = raw.parse::<i64>() {
                Value::from(number)
            } else {
                Value::from(raw)
            };
            fields.insert(column.trim(), value);
        }
        Some(fields)
    }
}

impl From<serde_json::Map<String, Value>> for Fields {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }
}

/// A database row keyed by column name.
pub type RowMap = serde_json::Map<String, Value>;

/// Top level of an identities JSON export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityFile {
    #[serde(default)]
    pub summary: Option<IdentitySummary>,
    #[serde(default)]
    pub identities: Vec<Identity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentitySummary {
    pub total_identities: Option<u64>,
    #[serde(default)]
    pub by_faction: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub codename: Option<String>,
    pub faction: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub colors: Option<Colors>,
    pub security: Option<Security>,
    #[serde(default)]
    pub sigils: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Colors {
    pub primary: Option<String>,
    pub accent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Security {
    #[serde(default, deserialize_with = "string_or_number")]
    pub klevel: Option<String>,
    pub verified_by: Option<String>,
}

/// K-levels show up both as `"04"` and as `4` in exports.
pub fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl Identity {
    pub fn klevel(&self) -> Option<&str> {
        self.security.as_ref().and_then(|s| s.klevel.as_deref())
    }

    pub fn verified_by(&self) -> Option<&str> {
        self.security.as_ref().and_then(|s| s.verified_by.as_deref())
    }

    pub fn codename(&self) -> Option<&str> {
        self.codename.as_deref().filter(|c| !c.is_empty())
    }
}

/// Outcome of one import, fix, or phase: counters plus human-readable lines.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeReport {
    pub name: String,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub notes: Vec<String>,
    pub totals: Vec<(String, i64)>,
}

impl ChangeReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.notes.push(line.into());
    }

    pub fn total(&mut self, label: &str, value: i64) {
        self.totals.push((label.to_string(), value));
    }

    pub fn total_for(&self, label: &str) -> Option<i64> {
        self.totals
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| *value)
    }

    pub fn records_affected(&self) -> usize {
        self.imported + self.updated
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "{}", self.name.to_uppercase())?;
        writeln!(f, "{}", rule)?;

        for line in &self.notes {
            writeln!(f, "  {}", line)?;
        }
        if !self.notes.is_empty() {
            writeln!(f)?;
        }

        writeln!(f, "✓ Imported: {}", self.imported)?;
        writeln!(f, "↻ Updated:  {}", self.updated)?;
        writeln!(f, "⚠ Skipped:  {}", self.skipped)?;
        writeln!(f, "✗ Errors:   {}", self.errors.len())?;

        if !self.totals.is_empty() {
            writeln!(f, "─────────────────────────────")?;
            for (label, value) in &self.totals {
                writeln!(f, "  {:<28} {}", format!("{}:", label), value)?;
            }
        }

        if !self.errors.is_empty() {
            writeln!(f, "\nErrors:")?;
            for error in &self.errors {
                writeln!(f, "  • {}", error)?;
            }
        }

        write!(f, "{}", rule)
    }
}
