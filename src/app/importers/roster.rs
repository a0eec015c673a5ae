//! Full roster import: creates or updates every identity in the canon JSON and
//! places it in its faction's division.

use crate::app::importers::sources::{file_name, read_json_document};
use crate::core::names::non_empty;
use crate::core::secrets;
use crate::db::{repo, Database, Table};
use crate::domain::canon::{CONSTANTINE_MERIDIAN_MEDIA, IRON_SULTURA, NEXUS_ENRAENRA, SHADOW_CORE};
use crate::domain::model::{ChangeReport, Fields, Identity, IdentityFile};
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub struct RosterImporter {
    path: PathBuf,
}

/// Corporation and division ids resolved once per run.
#[derive(Debug, Clone, Copy, Default)]
struct Placement {
    nexus: Option<i64>,
    cmm: Option<i64>,
    shadow_core: Option<i64>,
    iron_sultura: Option<i64>,
}

impl Placement {
    fn resolve(conn: &Connection) -> Result<Self> {
        Ok(Self {
            nexus: repo::corporation_id(conn, NEXUS_ENRAENRA)?,
            cmm: repo::corporation_id(conn, CONSTANTINE_MERIDIAN_MEDIA)?,
            shadow_core: repo::division_id(conn, SHADOW_CORE, None)?,
            iron_sultura: repo::division_id(conn, IRON_SULTURA, None)?,
        })
    }
}

impl RosterImporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn secrets_update(identity: &Identity) -> Map<String, Value> {
        let colors = identity.colors.clone().unwrap_or_default();
        let mut update = Map::new();
        update.insert("klevel".into(), json!(identity.klevel()));
        update.insert(
            "colors".into(),
            json!({"primary": colors.primary, "accent": colors.accent}),
        );
        update.insert("verified_by".into(), json!(identity.verified_by()));
        update.insert("sigils".into(), json!(identity.sigils));
        update
    }

    /// Creates or updates the character. Returns its id and whether it was created.
    fn upsert_character(&self, conn: &Connection, identity: &Identity) -> Result<(i64, bool)> {
        let fields = Fields::new()
            .with("codename", identity.codename())
            .with("faction", non_empty(identity.faction.as_deref()))
            .with("primary_role", non_empty(identity.role.as_deref()))
            .with("status", identity.status.as_deref().unwrap_or("Active"));

        match repo::character_id(conn, &identity.name)? {
            Some(id) => {
                let stored = repo::character_secrets(conn, id)?;
                let merged = secrets::merge(stored.as_deref(), Self::secrets_update(identity));
                let mut updates = fields;
                updates.insert("character_secrets", secrets::to_text(&merged));
                repo::update_character_by_id(conn, id, &updates)?;
                debug!("Updated existing character {} (ID: {})", identity.name, id);
                Ok((id, false))
            }
            None => {
                let mut created = Self::secrets_update(identity);
                created.insert("imported_from".into(), json!(file_name(&self.path)));
                let mut all = fields;
                all.insert("character_secrets", secrets::to_text(&created));
                let id = repo::add_character(conn, &identity.name, &all)?;
                debug!("Created character {} (ID: {})", identity.name, id);
                Ok((id, true))
            }
        }
    }

    fn place(&self, conn: &Connection, placement: &Placement, identity: &Identity, character: i64) -> Result<()> {
        let faction = identity.faction.as_deref().unwrap_or("");
        match (faction, placement) {
            (SHADOW_CORE, Placement { nexus: Some(nexus), shadow_core: Some(division), .. }) => {
                let fields = Fields::new()
                    .with("division_id", *division)
                    .with("clearance_level", identity.klevel());
                let mut insert = fields.clone();
                insert.insert("is_current", 1);
                repo::upsert_affiliations(conn, character, *nexus, &fields, &insert)?;
                debug!("Affiliation → Nexus (Shadow Core)");
            }
            (IRON_SULTURA, Placement { cmm: Some(cmm), iron_sultura: Some(division), .. }) => {
                let fields = Fields::new().with("division_id", *division);
                let mut insert = fields.clone();
                insert.insert("is_current", 1);
                repo::upsert_affiliations(conn, character, *cmm, &fields, &insert)?;
                debug!("Affiliation → CMM (Iron Sultura)");
            }
            ("Unknown", _) => {
                warn!("⚠ {}: faction 'Unknown' - no affiliation created", identity.name);
            }
            _ => {
                warn!("⚠ {}: no affiliation created (faction: {})", identity.name, faction);
            }
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Pipeline for RosterImporter {
    type Source = IdentityFile;
    type Staged = Vec<Identity>;

    fn name(&self) -> &str {
        "Full Roster Import"
    }

    async fn extract(&self) -> Result<IdentityFile> {
        let document = read_json_document(&self.path).await?;
        let file: IdentityFile = serde_json::from_value(document)?;
        if let Some(summary) = &file.summary {
            info!(
                "📊 JSON Summary: {} identities, by faction {}",
                summary.total_identities.unwrap_or(file.identities.len() as u64),
                serde_json::Value::Object(summary.by_faction.clone())
            );
        }
        Ok(file)
    }

    fn transform(&self, source: IdentityFile) -> Result<Vec<Identity>> {
        info!("📊 Found {} identities to import", source.identities.len());
        Ok(source.identities)
    }

    fn load(&self, db: &Database, identities: Vec<Identity>) -> Result<ChangeReport> {
        let mut report = ChangeReport::new(self.name());

        db.with_transaction(|tx| {
            let placement = Placement::resolve(tx)?;
            report.note(format!(
                "Nexus Enraenra: {:?} | Constantine Meridian Media: {:?} | Shadow Core: {:?} | Iron Sultura: {:?}",
                placement.nexus, placement.cmm, placement.shadow_core, placement.iron_sultura
            ));

            for identity in &identities {
                if identity.name.is_empty() {
                    report.skipped += 1;
                    continue;
                }
                info!(
                    "📝 Processing: {} ({})",
                    identity.name,
                    identity.codename().unwrap_or("")
                );

                let (character, created) = self.upsert_character(tx, identity)?;
                if created {
                    report.imported += 1;
                } else {
                    report.updated += 1;
                }
                self.place(tx, &placement, identity, character)?;
            }

            report.total("Total in Database", repo::count(tx, Table::Characters)?);
            for (label, faction) in [
                ("Shadow Core", SHADOW_CORE),
                ("Iron Sultura", IRON_SULTURA),
                ("Unknown Faction", "Unknown"),
            ] {
                let n = repo::count_where(
                    tx,
                    "SELECT COUNT(*) FROM characters WHERE faction = ?1",
                    [faction],
                )?;
                report.total(label, n);
            }
            report.total("Total Affiliations", repo::count(tx, Table::Affiliations)?);
            Ok(())
        })?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::etl::EtlEngine;
    use crate::db::schema;
    use tempfile::TempDir;

    fn setup(json: &str) -> (TempDir, PathBuf, Database) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, json).unwrap();

        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        let conn = db.conn();
        let nexus = repo::add_corporation(conn, NEXUS_ENRAENRA, &Fields::new()).unwrap();
        let cmm = repo::add_corporation(conn, CONSTANTINE_MERIDIAN_MEDIA, &Fields::new()).unwrap();
        crate::db::builder::insert(
            conn,
            Table::Divisions,
            &Fields::new().with("division_name", SHADOW_CORE).with("corp_id", nexus),
        )
        .unwrap();
        crate::db::builder::insert(
            conn,
            Table::Divisions,
            &Fields::new().with("division_name", IRON_SULTURA).with("corp_id", cmm),
        )
        .unwrap();
        (dir, path, db)
    }

    #[tokio::test]
    async fn test_roster_creates_updates_and_places() {
        let (_dir, path, db) = setup(
            r#"{"identities": [
                {"id": "kage", "name": "Kage Ishigawa", "faction": "Shadow Core",
                 "security": {"klevel": "03"}, "sigils": ["moon"]},
                {"id": "kyra", "name": "Kyra Eve Constantine", "faction": "Iron Sultura"},
                {"id": "drifter", "name": "Drifter", "faction": "Unknown"}
            ]}"#,
        );
        repo::add_character(
            db.conn(),
            "Kage Ishigawa",
            &Fields::new().with("character_secrets", r#"{"notes":"keep me"}"#),
        )
        .unwrap();

        let report = EtlEngine::new(RosterImporter::new(&path))
            .run(&db)
            .await
            .unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.total_for("Total in Database"), Some(3));
        assert_eq!(report.total_for("Shadow Core"), Some(1));
        assert_eq!(report.total_for("Unknown Faction"), Some(1));
        assert_eq!(report.total_for("Total Affiliations"), Some(2));

        let kage = repo::get_character(db.conn(), "Kage Ishigawa").unwrap().unwrap();
        let merged = secrets::parse(repo::text(&kage, "character_secrets"));
        assert_eq!(merged["notes"], json!("keep me"));
        assert_eq!(merged["klevel"], json!("03"));
        assert_eq!(merged["sigils"], json!(["moon"]));

        let kyra = repo::get_character(db.conn(), "Kyra Eve Constantine").unwrap().unwrap();
        let created = secrets::parse(repo::text(&kyra, "character_secrets"));
        assert_eq!(created["imported_from"], json!("roster.json"));

        let nexus = repo::get_corporation_employees(db.conn(), NEXUS_ENRAENRA, true).unwrap();
        assert_eq!(nexus.len(), 1);
        assert_eq!(repo::text(&nexus[0], "clearance_level"), Some("03"));
    }

    #[tokio::test]
    async fn test_rerun_moves_existing_affiliation() {
        let (_dir, path, db) = setup(
            r#"{"identities": [{"id": "ren", "name": "Ren Kael", "faction": "Iron Sultura"}]}"#,
        );
        let ren = repo::add_character(db.conn(), "Ren Kael", &Fields::new()).unwrap();
        let nexus = repo::corporation_id(db.conn(), NEXUS_ENRAENRA).unwrap().unwrap();
        repo::insert_affiliation(db.conn(), ren, nexus, &Fields::new()).unwrap();

        EtlEngine::new(RosterImporter::new(&path))
            .run(&db)
            .await
            .unwrap();

        assert!(repo::affiliation_ids(db.conn(), ren, Some(nexus)).unwrap().is_empty());
        let cmm = repo::get_corporation_employees(db.conn(), CONSTANTINE_MERIDIAN_MEDIA, false).unwrap();
        assert_eq!(cmm.len(), 1);
    }
}
