use crate::config::toml_config::substitute_env_vars;
use crate::domain::canon::Canon;
use crate::utils::error::{Result, UniverseError};
use crate::utils::validation::{validate_non_empty_string, validate_path, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub sequence: SequenceInfo,
    pub phases: Vec<PhaseDefinition>,
    pub monitoring: Option<MonitoringConfig>,
    pub error_handling: Option<ErrorHandlingConfig>,
    pub canon: Option<Canon>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub execution_order: Vec<String>,
}

/// What a phase does; each kind maps onto one library operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseKind {
    Initialize,
    LoadSampleData,
    AddCorporations,
    ImportIdentities,
    PostImportAdjustments,
    AddMitsukoFrost,
    FixCorporateStructure,
    ImportRoster,
    ImportCmmKlevels,
    ImportResonance,
    ImportCorporateStructure,
    Verify,
}

impl PhaseKind {
    /// Kinds that read an input file or directory and cannot run without one.
    pub fn requires_input(&self) -> bool {
        matches!(
            self,
            PhaseKind::ImportIdentities
                | PhaseKind::ImportRoster
                | PhaseKind::ImportCmmKlevels
                | PhaseKind::ImportResonance
                | PhaseKind::ImportCorporateStructure
        )
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseKind::Initialize => "initialize",
            PhaseKind::LoadSampleData => "load-sample-data",
            PhaseKind::AddCorporations => "add-corporations",
            PhaseKind::ImportIdentities => "import-identities",
            PhaseKind::PostImportAdjustments => "post-import-adjustments",
            PhaseKind::AddMitsukoFrost => "add-mitsuko-frost",
            PhaseKind::FixCorporateStructure => "fix-corporate-structure",
            PhaseKind::ImportRoster => "import-roster",
            PhaseKind::ImportCmmKlevels => "import-cmm-klevels",
            PhaseKind::ImportResonance => "import-resonance",
            PhaseKind::ImportCorporateStructure => "import-corporate-structure",
            PhaseKind::Verify => "verify",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDefinition {
    pub name: String,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub kind: PhaseKind,
    /// Input file or directory for import phases, SQL script for `load-sample-data`.
    pub input: Option<String>,
    /// Character names for `import-identities`; the canon selection when absent.
    pub selected: Option<Vec<String>>,
    pub force: Option<bool>,
    pub dependencies: Option<Vec<String>>,
}

impl PhaseDefinition {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn dependencies(&self) -> &[String] {
        self.dependencies.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub export_metrics: Option<bool>,
    pub metrics_file: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// "stop" (default) or "continue"
    pub on_phase_failure: Option<String>,
}

impl SequenceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(UniverseError::MissingInput {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| UniverseError::ConfigValidationError {
            field: "sequence_toml_parsing".to_string(),
            message: format!("Sequence TOML parsing error: {}", e),
        })
    }

    pub fn get_phase(&self, name: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Enabled phases in execution order.
    pub fn get_enabled_phases(&self) -> Vec<&PhaseDefinition> {
        self.sequence
            .execution_order
            .iter()
            .filter_map(|name| self.get_phase(name))
            .filter(|phase| phase.is_enabled())
            .collect()
    }

    pub fn continue_on_failure(&self) -> bool {
        self.error_handling
            .as_ref()
            .and_then(|e| e.on_phase_failure.as_deref())
            == Some("continue")
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn metrics_file(&self) -> Option<&str> {
        let monitoring = self.monitoring.as_ref()?;
        if monitoring.export_metrics.unwrap_or(false) {
            Some(monitoring.metrics_file.as_deref().unwrap_or("phase_metrics.json"))
        } else {
            None
        }
    }

    fn validate_phase(&self, phase: &PhaseDefinition, names: &HashSet<&str>) -> Result<()> {
        validate_non_empty_string("phases.name", &phase.name)?;

        match &phase.input {
            Some(input) => validate_path(&format!("phases.{}.input", phase.name), input)?,
            None if phase.kind.requires_input() => {
                return Err(UniverseError::MissingConfigError {
                    field: format!("phases.{}.input", phase.name),
                });
            }
            None => {}
        }

        for dep in phase.dependencies() {
            if !names.contains(dep.as_str()) {
                return Err(UniverseError::ConfigValidationError {
                    field: format!("phases.{}.dependencies", phase.name),
                    message: format!("Dependency phase '{}' not found", dep),
                });
            }
        }
        Ok(())
    }

    fn has_circular_dependency(
        &self,
        phase_name: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
    ) -> bool {
        visited.insert(phase_name.to_string());
        rec_stack.insert(phase_name.to_string());

        if let Some(phase) = self.get_phase(phase_name) {
            for dep in phase.dependencies() {
                if !visited.contains(dep) {
                    if self.has_circular_dependency(dep, visited, rec_stack) {
                        return true;
                    }
                } else if rec_stack.contains(dep) {
                    return true;
                }
            }
        }

        rec_stack.remove(phase_name);
        false
    }

    fn validate_dependencies(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for phase in &self.phases {
            if !visited.contains(&phase.name)
                && self.has_circular_dependency(&phase.name, &mut visited, &mut rec_stack)
            {
                return Err(UniverseError::ConfigValidationError {
                    field: "phases.dependencies".to_string(),
                    message: "Circular dependency detected in phase configuration".to_string(),
                });
            }
        }

        let position = |name: &str| self.sequence.execution_order.iter().position(|n| n == name);
        for phase in &self.phases {
            let Some(own) = position(&phase.name) else {
                continue;
            };
            for dep in phase.dependencies() {
                if let Some(dep_position) = position(dep) {
                    if dep_position > own {
                        return Err(UniverseError::ConfigValidationError {
                            field: "sequence.execution_order".to_string(),
                            message: format!(
                                "Phase '{}' runs before its dependency '{}'",
                                phase.name, dep
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Validate for SequenceConfig {
    fn validate(&self) -> Result<()> {
        let names: HashSet<&str> = self.phases.iter().map(|p| p.name.as_str()).collect();
        if names.len() != self.phases.len() {
            return Err(UniverseError::ConfigValidationError {
                field: "phases".to_string(),
                message: "Phase names must be unique".to_string(),
            });
        }

        for phase_name in &self.sequence.execution_order {
            if !names.contains(phase_name.as_str()) {
                return Err(UniverseError::ConfigValidationError {
                    field: "sequence.execution_order".to_string(),
                    message: format!(
                        "Phase '{}' in execution order not found in phases definition",
                        phase_name
                    ),
                });
            }
        }

        for phase in &self.phases {
            self.validate_phase(phase, &names)?;
        }

        if let Some(policy) = self
            .error_handling
            .as_ref()
            .and_then(|e| e.on_phase_failure.as_deref())
        {
            if policy != "stop" && policy != "continue" {
                return Err(UniverseError::InvalidConfigValueError {
                    field: "error_handling.on_phase_failure".to_string(),
                    value: policy.to_string(),
                    reason: "Expected \"stop\" or \"continue\"".to_string(),
                });
            }
        }

        self.validate_dependencies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
[sequence]
name = "master-import"
description = "Initialize and import"
version = "1.0.0"
execution_order = ["init", "identities"]

[[phases]]
name = "init"
kind = "initialize"
force = true

[[phases]]
name = "identities"
kind = "import-identities"
input = "identities.json"
dependencies = ["init"]

[error_handling]
on_phase_failure = "continue"
"#;

    #[test]
    fn test_sequence_config_parsing() {
        let config = SequenceConfig::from_toml_str(BASIC).unwrap();
        assert_eq!(config.sequence.name, "master-import");
        assert_eq!(config.phases.len(), 2);
        assert_eq!(config.phases[1].kind, PhaseKind::ImportIdentities);
        assert!(config.continue_on_failure());
        assert!(config.validate().is_ok());
        assert_eq!(config.get_enabled_phases().len(), 2);
    }

    #[test]
    fn test_circular_dependency_detection() {
        let config = SequenceConfig::from_toml_str(
            r#"
[sequence]
name = "circular"
execution_order = ["a", "b"]

[[phases]]
name = "a"
kind = "verify"
dependencies = ["b"]

[[phases]]
name = "b"
kind = "verify"
dependencies = ["a"]
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Circular dependency"));
    }

    #[test]
    fn test_dependency_must_run_first() {
        let config = SequenceConfig::from_toml_str(
            r#"
[sequence]
name = "backwards"
execution_order = ["verify", "init"]

[[phases]]
name = "init"
kind = "initialize"

[[phases]]
name = "verify"
kind = "verify"
dependencies = ["init"]
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("runs before its dependency"));
    }

    #[test]
    fn test_import_phase_requires_input() {
        let config = SequenceConfig::from_toml_str(
            r#"
[sequence]
name = "no-input"
execution_order = ["roster"]

[[phases]]
name = "roster"
kind = "import-roster"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(UniverseError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_unknown_names_rejected() {
        let config = SequenceConfig::from_toml_str(
            r#"
[sequence]
name = "typo"
execution_order = ["init", "missing"]

[[phases]]
name = "init"
kind = "initialize"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        assert!(SequenceConfig::from_toml_str(
            "[sequence]\nname = \"x\"\nexecution_order = []\n[[phases]]\nname = \"p\"\nkind = \"teleport\"\n"
        )
        .is_err());
    }

    #[test]
    fn test_disabled_phases_filtered() {
        let mut config = SequenceConfig::from_toml_str(BASIC).unwrap();
        config.phases[1].enabled = Some(false);
        let enabled: Vec<_> = config.get_enabled_phases().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(enabled, vec!["init"]);
    }

    #[test]
    fn test_shipped_configs_validate() {
        for file in ["configs/phase4.toml", "configs/phase5.toml"] {
            let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(file);
            let config = SequenceConfig::from_file(&path).unwrap();
            config.validate().unwrap();
        }
    }
}
