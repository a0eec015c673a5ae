//! Phase implementations for the configured import sequence.

use crate::app::fixes::{self, sample_data};
use crate::app::importers::{
    CmmKlevelImporter, CorporateStructureImporter, IdentityImporter, ResonanceImporter,
    RosterImporter,
};
use crate::config::sequence_config::{PhaseDefinition, PhaseKind};
use crate::core::etl::EtlEngine;
use crate::core::sequence::{Phase, PhaseContext};
use crate::db::{builder, maintenance, repo, schema, Database, Table};
use crate::domain::canon::Canon;
use crate::domain::model::ChangeReport;
use crate::utils::error::{Result, UniverseError};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct ConfiguredPhase {
    definition: PhaseDefinition,
    canon: Canon,
    /// Dependencies scheduled in this run; the phase is skipped unless each succeeded.
    gating: Vec<String>,
}

impl ConfiguredPhase {
    pub fn new(definition: PhaseDefinition, canon: Canon) -> Self {
        let gating = definition.dependencies().to_vec();
        Self {
            definition,
            canon,
            gating,
        }
    }

    /// Drops dependencies that are not part of the current run, e.g. under `--only`.
    pub fn gate_on(mut self, scheduled: &[String]) -> Self {
        self.gating.retain(|dep| scheduled.contains(dep));
        self
    }

    pub fn kind(&self) -> PhaseKind {
        self.definition.kind
    }

    fn input(&self) -> Result<PathBuf> {
        self.definition
            .input
            .as_ref()
            .map(PathBuf::from)
            .ok_or_else(|| UniverseError::MissingConfigError {
                field: format!("phases.{}.input", self.definition.name),
            })
    }

    fn force(&self) -> bool {
        self.definition.force.unwrap_or(false)
    }
}

fn initialize(db: &Database, force: bool) -> Result<ChangeReport> {
    let mut report = ChangeReport::new("Initialize Database");
    if force {
        let cleared = maintenance::reset(db)?;
        report.note(cleared.to_string());
    }
    let init = schema::initialize(db)?;
    for status in &init.tables {
        report.total(status.table.name(), status.rows);
    }
    if !init.all_present() {
        return Err(UniverseError::ValidationError {
            message: "Some tables are missing after initialization".to_string(),
        });
    }
    report.note(format!(
        "Created {} tables and {} indexes",
        init.tables_created, init.indexes_created
    ));
    Ok(report)
}

/// Final counts plus the character list.
pub fn verify(db: &Database) -> Result<ChangeReport> {
    let mut report = ChangeReport::new("Verification");
    let conn = db.conn();
    report.total("Characters", repo::count(conn, Table::Characters)?);
    report.total("Corporations", repo::count(conn, Table::Corporations)?);
    report.total("Affiliations", repo::count(conn, Table::Affiliations)?);

    for row in builder::query_maps(
        conn,
        "SELECT character_name, faction, status FROM characters ORDER BY character_name",
        [],
    )? {
        report.note(format!(
            "• {} ({}) - {}",
            repo::text(&row, "character_name").unwrap_or_default(),
            repo::text(&row, "faction").unwrap_or("No faction"),
            repo::text(&row, "status").unwrap_or("Unknown")
        ));
    }
    Ok(report)
}

#[async_trait(?Send)]
impl Phase for ConfiguredPhase {
    fn name(&self) -> &str {
        &self.definition.name
    }

    async fn run(&self, db: &Database, _context: &PhaseContext) -> Result<ChangeReport> {
        match self.definition.kind {
            PhaseKind::Initialize => initialize(db, self.force()),
            PhaseKind::LoadSampleData => {
                let script = self
                    .definition
                    .input
                    .clone()
                    .unwrap_or_else(|| sample_data::DEFAULT_SAMPLE_DATA.to_string());
                sample_data::load_sample_data(db, &PathBuf::from(script), self.force()).await
            }
            PhaseKind::AddCorporations => fixes::add_corporations(db),
            PhaseKind::ImportIdentities => {
                let selection = self
                    .definition
                    .selected
                    .clone()
                    .unwrap_or_else(|| self.canon.selected_characters.clone());
                let importer = IdentityImporter::new(self.input()?, self.canon.clone())
                    .with_selection(selection);
                EtlEngine::new(importer).run(db).await
            }
            PhaseKind::PostImportAdjustments => fixes::apply_adjustments(db),
            PhaseKind::AddMitsukoFrost => fixes::add_mitsuko_frost(db),
            PhaseKind::FixCorporateStructure => fixes::fix_corporate_structure(db),
            PhaseKind::ImportRoster => EtlEngine::new(RosterImporter::new(self.input()?)).run(db).await,
            PhaseKind::ImportCmmKlevels => {
                EtlEngine::new(CmmKlevelImporter::new(self.input()?)).run(db).await
            }
            PhaseKind::ImportResonance => {
                EtlEngine::new(ResonanceImporter::new(self.input()?)).run(db).await
            }
            PhaseKind::ImportCorporateStructure => {
                EtlEngine::new(CorporateStructureImporter::new(self.input()?, self.canon.clone()))
                    .run(db)
                    .await
            }
            PhaseKind::Verify => verify(db),
        }
    }

    fn should_execute(&self, context: &PhaseContext) -> bool {
        self.gating.iter().all(|dep| context.has_succeeded(dep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sequence_config::SequenceConfig;
    use crate::core::sequence::PhaseSequence;
    use crate::domain::model::Fields;

    fn definition(name: &str, kind: PhaseKind, deps: &[&str]) -> PhaseDefinition {
        PhaseDefinition {
            name: name.to_string(),
            description: None,
            enabled: None,
            kind,
            input: None,
            selected: None,
            force: None,
            dependencies: Some(deps.iter().map(|d| d.to_string()).collect()),
        }
    }

    #[tokio::test]
    async fn test_structure_phases_run_in_order() {
        let db = Database::in_memory().unwrap();
        let mut sequence = PhaseSequence::new("test-run".to_string());
        for def in [
            definition("init", PhaseKind::Initialize, &[]),
            definition("corporations", PhaseKind::AddCorporations, &["init"]),
            definition("structure", PhaseKind::FixCorporateStructure, &["corporations"]),
            definition("mitsuko", PhaseKind::AddMitsukoFrost, &["corporations"]),
            definition("verify", PhaseKind::Verify, &[]),
        ] {
            sequence.add_phase(Box::new(ConfiguredPhase::new(def, Canon::default())));
        }

        let results = sequence.execute_all(&db).await.unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.succeeded));

        let verification = &results[4].report;
        assert_eq!(verification.total_for("Characters"), Some(1));
        assert_eq!(verification.total_for("Corporations"), Some(3));
        assert!(verification.notes[0].contains("Mitsuko Frost"));
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_dependents() {
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        let mut missing = definition("roster", PhaseKind::ImportRoster, &[]);
        missing.input = Some("/nonexistent/identities.json".to_string());

        let mut sequence = PhaseSequence::new("test-run".to_string()).continue_on_failure(true);
        sequence.add_phase(Box::new(ConfiguredPhase::new(missing, Canon::default())));
        sequence.add_phase(Box::new(ConfiguredPhase::new(
            definition("adjust", PhaseKind::PostImportAdjustments, &["roster"]),
            Canon::default(),
        )));

        let results = sequence.execute_all(&db).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].succeeded);
    }

    #[test]
    fn test_gate_on_ignores_unscheduled_dependencies() {
        let phase = ConfiguredPhase::new(
            definition("adjust", PhaseKind::PostImportAdjustments, &["import"]),
            Canon::default(),
        )
        .gate_on(&["adjust".to_string()]);
        assert!(phase.should_execute(&PhaseContext::new("x".to_string())));
    }

    #[tokio::test]
    async fn test_force_initialize_clears_rows() {
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        repo::add_character(db.conn(), "Reika Frost", &Fields::new()).unwrap();

        let report = initialize(&db, true).unwrap();
        assert_eq!(report.total_for("characters"), Some(0));
    }

    #[test]
    fn test_definitions_from_config_build_phases() {
        let config = SequenceConfig::from_toml_str(
            "[sequence]\nname = \"s\"\nexecution_order = [\"v\"]\n[[phases]]\nname = \"v\"\nkind = \"verify\"\n",
        )
        .unwrap();
        let phase = ConfiguredPhase::new(config.phases[0].clone(), Canon::default());
        assert_eq!(phase.kind(), PhaseKind::Verify);
        assert_eq!(phase.name(), "v");
    }
}
