use crate::domain::canon::Canon;
use crate::utils::error::{Result, UniverseError};
use crate::utils::validation::{validate_path, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DATABASE: &str = "universe.db";

/// `universe.toml`: every section is optional and falls back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub canon: Canon,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub sample_data: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DATABASE.to_string(),
            sample_data: crate::app::fixes::sample_data::DEFAULT_SAMPLE_DATA.to_string(),
        }
    }
}

/// Input locations used when a subcommand is given no explicit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub identities: String,
    pub cmm_dir: String,
    pub resonance_dir: String,
    pub structure_dir: String,
    pub export_path: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            identities: "identities.json".to_string(),
            cmm_dir: "cmm".to_string(),
            resonance_dir: "shadowcore".to_string(),
            structure_dir: ".".to_string(),
            export_path: "universe_snapshot.zip".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    pub verbose: bool,
}

/// Replaces `${VAR}` with the environment value; unknown variables are left as written.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| UniverseError::ConfigValidationError {
        field: "env_substitution".to_string(),
        message: e.to_string(),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

impl UniverseConfig {
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
        let processed = substitute_env_vars(content)?;

        let config: Self = toml::from_str(&processed).map_err(|e| UniverseError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl Validate for UniverseConfig {
    fn validate(&self) -> Result<()> {
        validate_path("database.path", &self.database.path)?;
        validate_path("database.sample_data", &self.database.sample_data)?;
        validate_path("import.identities", &self.import.identities)?;
        validate_path("import.cmm_dir", &self.import.cmm_dir)?;
        validate_path("import.resonance_dir", &self.import.resonance_dir)?;
        validate_path("import.structure_dir", &self.import.structure_dir)?;
        validate_path("import.export_path", &self.import.export_path)?;

        for (old, new) in &self.canon.renames {
            if new.trim().is_empty() {
                return Err(UniverseError::InvalidConfigValueError {
                    field: format!("canon.renames.{}", old),
                    value: new.clone(),
                    reason: "Rename target cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
