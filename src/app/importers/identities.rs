//! Insert-only import of identities from the canon JSON export.

use crate::app::importers::sources::read_json_document;
use crate::core::names::{matches_selection, normalize_identity_name};
use crate::db::{repo, Database};
use crate::domain::canon::{Canon, DEFAULT_KLEVEL};
use crate::domain::model::{ChangeReport, Fields, Identity, IdentityFile};
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

pub struct IdentityImporter {
    path: PathBuf,
    selection: Option<Vec<String>>,
    preview: bool,
    canon: Canon,
}

pub struct StagedIdentities {
    pub identities: Vec<Identity>,
    pub requested: Option<usize>,
}

enum Plan {
    Skip(String),
    Insert { name: String, fields: Fields },
}

impl IdentityImporter {
    pub fn new(path: impl Into<PathBuf>, canon: Canon) -> Self {
        Self {
            path: path.into(),
            selection: None,
            preview: false,
            canon,
        }
    }

    /// Restricts the import to the named characters.
    pub fn with_selection(mut self, names: Vec<String>) -> Self {
        self.selection = Some(names);
        self
    }

    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    fn plan(&self, conn: &Connection, identity: &Identity) -> Result<Plan> {
        let name = normalize_identity_name(&identity.name, &identity.id);
        if name.is_empty() {
            return Ok(Plan::Skip(format!("identity '{}' has no name", identity.id)));
        }
        if repo::character_id(conn, &name)?.is_some() {
            return Ok(Plan::Skip(format!("{} (already exists)", name)));
        }

        let joined = |items: &[String]| {
            if items.is_empty() {
                Value::Null
            } else {
                Value::from(items.join(", "))
            }
        };

        let mut fields = Fields::new()
            .with("codename", identity.codename())
            .with("faction", identity.faction.as_deref())
            .with("primary_role", identity.role.as_deref())
            .with("status", identity.status.as_deref().unwrap_or("Active"))
            .with("aliases", joined(&identity.aliases))
            .with("story_tags", joined(&identity.tags));

        if identity.security.is_some() {
            let colors = identity
                .colors
                .as_ref()
                .map(|c| json!(c))
                .unwrap_or_else(|| json!({}));
            let secrets = json!({
                "klevel": identity.klevel(),
                "verified_by": identity.verified_by(),
                "colors": colors,
            });
            fields.insert("character_secrets", secrets.to_string());
        }

        Ok(Plan::Insert { name, fields })
    }

    fn insert(&self, conn: &Connection, identity: &Identity, name: &str, fields: &Fields) -> Result<()> {
        let character = repo::add_character(conn, name, fields)?;

        let corp = match identity
            .faction
            .as_deref()
            .and_then(|f| self.canon.corporation_for_faction(f))
        {
            Some(corp_name) => repo::resolve_corporation(conn, corp_name)?,
            None => None,
        };

        if let Some(corp) = corp {
            let clearance = format!("K-Level {}", identity.klevel().unwrap_or(DEFAULT_KLEVEL));
            repo::insert_affiliation(
                conn,
                character,
                corp,
                &Fields::new()
                    .with("affiliation_type", "Operative")
                    .with("clearance_level", clearance)
                    .with("is_current", 1),
            )?;
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Pipeline for IdentityImporter {
    type Source = IdentityFile;
    type Staged = StagedIdentities;

    fn name(&self) -> &str {
        "Character Import"
    }

    async fn extract(&self) -> Result<IdentityFile> {
        let document = read_json_document(&self.path).await?;
        let file: IdentityFile = serde_json::from_value(document)?;

        let total = file
            .summary
            .as_ref()
            .and_then(|s| s.total_identities)
            .unwrap_or(file.identities.len() as u64);
        info!("✓ Loaded JSON: {} ({} identities)", self.path.display(), total);
        Ok(file)
    }

    fn transform(&self, source: IdentityFile) -> Result<StagedIdentities> {
        let Some(targets) = &self.selection else {
            return Ok(StagedIdentities {
                identities: source.identities,
                requested: None,
            });
        };

        let identities: Vec<Identity> = source
            .identities
            .into_iter()
            .filter(|identity| {
                targets
                    .iter()
                    .any(|target| matches_selection(&identity.name, &identity.id, target))
            })
            .collect();
        info!("Found {}/{} characters in JSON", identities.len(), targets.len());

        Ok(StagedIdentities {
            identities,
            requested: Some(targets.len()),
        })
    }

    fn load(&self, db: &Database, staged: StagedIdentities) -> Result<ChangeReport> {
        let mut report = ChangeReport::new(self.name());
        if let Some(requested) = staged.requested {
            report.note(format!(
                "Found {}/{} characters in JSON",
                staged.identities.len(),
                requested
            ));
        }

        if self.preview {
            report.note("PREVIEW MODE - No data will be imported");
            for identity in &staged.identities {
                match self.plan(db.conn(), identity)? {
                    Plan::Skip(reason) => {
                        report.note(format!("⚠ Skipping {}", reason));
                        report.skipped += 1;
                    }
                    Plan::Insert { name, fields } => {
                        let shown = |column: &str| match fields.get(column) {
                            Some(Value::String(s)) => s.clone(),
                            _ => "None".to_string(),
                        };
                        report.note(format!(
                            "Preview: {} | Codename: {} | Faction: {} | Role: {} | Status: {}",
                            name,
                            shown("codename"),
                            shown("faction"),
                            shown("primary_role"),
                            shown("status")
                        ));
                    }
                }
            }
            return Ok(report);
        }

        db.with_transaction(|tx| {
            for identity in &staged.identities {
                let planned = self.plan(tx, identity);
                let outcome = planned.and_then(|plan| match plan {
                    Plan::Skip(reason) => {
                        warn!("⚠ Skipping {}", reason);
                        Ok(false)
                    }
                    Plan::Insert { name, fields } => {
                        self.insert(tx, identity, &name, &fields)?;
                        info!("✓ Imported: {}", name);
                        Ok(true)
                    }
                });

                match outcome {
                    Ok(true) => report.imported += 1,
                    Ok(false) => report.skipped += 1,
                    Err(e) => {
                        let name = normalize_identity_name(&identity.name, &identity.id);
                        warn!("✗ Error importing {}: {}", name, e);
                        report.errors.push(format!("{}: {}", name, e));
                    }
                }
            }
            Ok(())
        })?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::etl::EtlEngine;
    use crate::db::{schema, Table};
    use crate::domain::canon::{LEGACY_CMM_NAME, NEXUS_ENRAENRA};
    use tempfile::TempDir;

    const IDENTITIES: &str = r##"{
        "summary": {"total_identities": 3, "by_faction": {"Shadow Core": 2, "Unknown": 1}},
        "identities": [
            {"id": "reika_frost", "name": "Reika Hyōka Frost", "codename": "Hyōka",
             "faction": "Shadow Core", "role": "Heir", "aliases": ["Ice Queen", "R"],
             "tags": ["protagonist"], "colors": {"primary": "#fff", "accent": "#0ff"},
             "security": {"klevel": "05", "verified_by": "archive"}},
            {"id": "kage_ishigawa", "name": "kage_ishigawa", "codename": "",
             "faction": "Shadow Core", "role": "Blade"},
            {"id": "nameless", "name": "", "faction": "Unknown"}
        ]
    }"##;

    fn setup() -> (TempDir, PathBuf, Database) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identities.json");
        std::fs::write(&path, IDENTITIES).unwrap();

        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        repo::add_corporation(db.conn(), NEXUS_ENRAENRA, &Fields::new()).unwrap();
        (dir, path, db)
    }

    #[tokio::test]
    async fn test_import_all_inserts_and_affiliates() {
        let (_dir, path, db) = setup();
        let report = EtlEngine::new(IdentityImporter::new(&path, Canon::default()))
            .run(&db)
            .await
            .unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 1);
        assert!(report.errors.is_empty());

        let reika = repo::get_character(db.conn(), "Reika Hyōka Frost").unwrap().unwrap();
        assert_eq!(repo::text(&reika, "aliases"), Some("Ice Queen, R"));
        let secrets: Value =
            serde_json::from_str(repo::text(&reika, "character_secrets").unwrap()).unwrap();
        assert_eq!(secrets["klevel"], json!("05"));
        assert_eq!(secrets["colors"]["accent"], json!("#0ff"));

        let kage = repo::get_character(db.conn(), "Kage Ishigawa").unwrap().unwrap();
        assert_eq!(kage["codename"], Value::Null);
        assert_eq!(kage["character_secrets"], Value::Null);

        let employees = repo::get_corporation_employees(db.conn(), NEXUS_ENRAENRA, true).unwrap();
        assert_eq!(employees.len(), 2);
        let clearances: Vec<_> = employees
            .iter()
            .filter_map(|e| repo::text(e, "clearance_level"))
            .collect();
        assert!(clearances.contains(&"K-Level 05"));
        assert!(clearances.contains(&"K-Level 01"));
    }

    #[tokio::test]
    async fn test_second_run_skips_existing() {
        let (_dir, path, db) = setup();
        let engine = EtlEngine::new(IdentityImporter::new(&path, Canon::default()));
        engine.run(&db).await.unwrap();
        let report = engine.run(&db).await.unwrap();

        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 3);
        assert_eq!(repo::count(db.conn(), Table::Characters).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_selection_and_preview_write_nothing() {
        let (_dir, path, db) = setup();
        let importer = IdentityImporter::new(&path, Canon::default())
            .with_selection(vec!["Kage Ishigawa".to_string(), "Mitsuko Frost".to_string()])
            .with_preview(true);
        let report = EtlEngine::new(importer).run(&db).await.unwrap();

        assert_eq!(report.notes[0], "Found 1/2 characters in JSON");
        assert!(report.notes.iter().any(|n| n.starts_with("Preview: Kage Ishigawa")));
        assert_eq!(repo::count(db.conn(), Table::Characters).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_security_block_still_writes_secrets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identities.json");
        std::fs::write(
            &path,
            r#"{"identities": [{"id": "aiko", "name": "Aiko Tanabe", "security": {}}]}"#,
        )
        .unwrap();
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();

        EtlEngine::new(IdentityImporter::new(&path, Canon::default()))
            .run(&db)
            .await
            .unwrap();

        let aiko = repo::get_character(db.conn(), "Aiko Tanabe").unwrap().unwrap();
        let secrets: Value =
            serde_json::from_str(repo::text(&aiko, "character_secrets").unwrap()).unwrap();
        assert_eq!(secrets["klevel"], Value::Null);
        assert_eq!(secrets["colors"], json!({}));
    }

    #[tokio::test]
    async fn test_legacy_cmm_name_still_links_iron_sultura() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identities.json");
        std::fs::write(
            &path,
            r#"{"identities": [{"id": "ren_kael", "name": "Ren Kael", "faction": "Iron Sultura"}]}"#,
        )
        .unwrap();
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        repo::add_corporation(db.conn(), LEGACY_CMM_NAME, &Fields::new()).unwrap();

        EtlEngine::new(IdentityImporter::new(&path, Canon::default()))
            .run(&db)
            .await
            .unwrap();
        assert_eq!(
            repo::get_corporation_employees(db.conn(), LEGACY_CMM_NAME, true)
                .unwrap()
                .len(),
            1
        );
    }
}
