use crate::config::toml_config::{ImportConfig, UniverseConfig};
use crate::config::CliConfig;
use crate::domain::canon::Canon;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, Validate};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "universe.toml";

/// Settings after merging the optional TOML file with the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: String,
    pub sample_data: String,
    pub import: ImportConfig,
    pub canon: Canon,
    pub verbose: bool,
    pub log_json: bool,
    pub assume_yes: bool,
}

impl Settings {
    pub fn resolve(cli: &CliConfig) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => UniverseConfig::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                UniverseConfig::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => UniverseConfig::default(),
        };
        let settings = Self::merge(cli, file);
        settings.validate()?;
        Ok(settings)
    }

    /// Command line values win over file values.
    pub fn merge(cli: &CliConfig, file: UniverseConfig) -> Self {
        Self {
            database: cli.db.clone().unwrap_or(file.database.path),
            sample_data: file.database.sample_data,
            import: file.import,
            canon: file.canon,
            verbose: cli.verbose || file.logging.verbose,
            log_json: cli.log_json || file.logging.json,
            assume_yes: cli.yes,
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_path("database.path", &self.database)?;
        validate_path("database.sample_data", &self.sample_data)
    }
}

impl ConfigProvider for Settings {
    fn database_path(&self) -> &str {
        &self.database
    }

    fn canon(&self) -> &Canon {
        &self.canon
    }

    fn assume_yes(&self) -> bool {
        self.assume_yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_file_values() {
        let file = UniverseConfig::from_toml_str(
            "[database]\npath = \"from_file.db\"\n[logging]\njson = true\n",
        )
        .unwrap();
        let cli = CliConfig::parse_from(["universe-db", "--db", "cli.db", "--yes", "stats"]);

        let settings = Settings::merge(&cli, file);
        assert_eq!(settings.database_path(), "cli.db");
        assert!(settings.log_json);
        assert!(settings.assume_yes());
    }

    #[test]
    fn test_file_values_used_without_flags() {
        let file = UniverseConfig::from_toml_str("[database]\npath = \"from_file.db\"\n").unwrap();
        let cli = CliConfig::parse_from(["universe-db", "explore"]);
        let cli = CliConfig { db: None, ..cli };

        let settings = Settings::merge(&cli, file);
        assert_eq!(settings.database, "from_file.db");
        assert!(!settings.assume_yes);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_query_subcommand() {
        let cli = CliConfig::parse_from(["universe-db", "query", "profile", "Reika Frost"]);
        assert!(matches!(
            cli.command,
            crate::config::Command::Query(crate::config::QueryCommand::Profile { ref name })
                if name == "Reika Frost"
        ));
    }
}
