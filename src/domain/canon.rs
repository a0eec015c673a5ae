use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NEXUS_ENRAENRA: &str = "Nexus Enraenra";
pub const CONSTANTINE_MERIDIAN_MEDIA: &str = "Constantine Meridian Media";
/// Name CMM carried before the corporate structure fix.
pub const LEGACY_CMM_NAME: &str = "Corporate Memory Management";
pub const AETHOS_MILITARY_GROUP: &str = "Aethos Military Group";

pub const SHADOW_CORE: &str = "Shadow Core";
pub const IRON_SULTURA: &str = "Iron Sultura";

pub const DEFAULT_KLEVEL: &str = "01";

/// Canon data that imports and fixes consult. Overridable from the `[canon]`
/// section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Canon {
    /// Faction name -> corporation that operatives of the faction are affiliated with.
    pub faction_corporations: BTreeMap<String, String>,
    /// Old character name -> canonical character name.
    pub renames: BTreeMap<String, String>,
    /// Characters imported by `import-identities --top`.
    pub selected_characters: Vec<String>,
    /// Lower-case fragments marking generic roster entries.
    pub placeholder_names: Vec<String>,
    /// Display order for public executive positions.
    pub executive_order: Vec<String>,
}

impl Default for Canon {
    fn default() -> Self {
        let faction_corporations = [
            (SHADOW_CORE, NEXUS_ENRAENRA),
            (IRON_SULTURA, LEGACY_CMM_NAME),
        ]
        .into_iter()
        .map(|(faction, corp)| (faction.to_string(), corp.to_string()))
        .collect();

        let renames = [
            ("Kyra Constantine", "Kyra Eve Constantine"),
            ("Voss Tarran", "Voss Harland"),
            ("Darius Vale", "Darius Kael"),
            ("Krayne Solari", "Krayne Towers"),
            ("Rhea Takeda", "Rhea Caldwell"),
            ("Mara Nakai", "Mara D'Angelo"),
            ("Kaori Mizuno", "Kaori Fujimura"),
        ]
        .into_iter()
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect();

        Self {
            faction_corporations,
            renames,
            selected_characters: to_strings(&[
                "Reika Hyōka Frost",
                "Kage Ishigawa",
                "Akira Miyara",
                "Ayana Miyara",
                "Kazuo Hoshinaga",
                "Kenji Hoshinaga",
                "Aaster Mythril",
                "Ren Kael",
                "Haruto Frost",
            ]),
            placeholder_names: to_strings(&[
                "commander 1",
                "commander 2",
                "commander 3",
                "director 1",
                "director 2",
                "director 3",
                "analyst 1",
                "analyst 2",
                "analyst 3",
                "captain 1",
                "captain 2",
                "captain 3",
                "liaison 1",
                "liaison 2",
                "specialist 1",
                "specialist 2",
                "unknown chair",
                "department head",
            ]),
            executive_order: to_strings(&[
                "CEO",
                "COO",
                "CFO",
                "CTO",
                "CMO",
                "CHRO",
                "General Counsel",
            ]),
        }
    }
}

impl Canon {
    pub fn corporation_for_faction(&self, faction: &str) -> Option<&str> {
        self.faction_corporations.get(faction).map(String::as_str)
    }

    pub fn is_placeholder(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.placeholder_names
            .iter()
            .any(|fragment| lower.contains(fragment.as_str()))
    }

    /// Sort key for an executive position; unknown positions sort last.
    pub fn executive_rank(&self, position: &str) -> usize {
        self.executive_order
            .iter()
            .position(|p| p == position)
            .unwrap_or(self.executive_order.len())
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_faction_map() {
        let canon = Canon::default();
        assert_eq!(canon.corporation_for_faction(SHADOW_CORE), Some(NEXUS_ENRAENRA));
        assert_eq!(canon.corporation_for_faction(IRON_SULTURA), Some(LEGACY_CMM_NAME));
        assert_eq!(canon.corporation_for_faction("Unknown"), None);
    }

    #[test]
    fn test_placeholder_detection_is_case_insensitive() {
        let canon = Canon::default();
        assert!(canon.is_placeholder("Shadow Commander 2"));
        assert!(canon.is_placeholder("UNKNOWN CHAIR"));
        assert!(!canon.is_placeholder("Reika Hyōka Frost"));
    }

    #[test]
    fn test_executive_rank() {
        let canon = Canon::default();
        assert_eq!(canon.executive_rank("CEO"), 0);
        assert_eq!(canon.executive_rank("General Counsel"), 6);
        assert_eq!(canon.executive_rank("Janitor"), 7);
    }

    #[test]
    fn test_partial_canon_section_keeps_defaults() {
        let canon: Canon = toml::from_str(
            r#"
selected_characters = ["Ren Kael"]
"#,
        )
        .unwrap();
        assert_eq!(canon.selected_characters, vec!["Ren Kael".to_string()]);
        assert_eq!(canon.renames.len(), 7);
    }
}
