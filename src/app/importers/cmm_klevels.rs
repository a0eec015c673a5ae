//! Constantine Meridian Media K-level import from the CMM CSV export.

use crate::app::importers::sources::{read_csv_records, typed};
use crate::core::names::non_empty;
use crate::core::secrets;
use crate::db::{repo, Database};
use crate::domain::canon::{CONSTANTINE_MERIDIAN_MEDIA, IRON_SULTURA};
use crate::domain::model::{ChangeReport, Fields, Record};
use crate::domain::ports::Pipeline;
use crate::utils::error::{Result, UniverseError};
use async_trait::async_trait;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

pub const IDENTITIES_FILE: &str = "identities.csv";
pub const LEVELS_FILE: &str = "identities_levels.csv";
pub const EPOCHS_FILE: &str = "identities_epochs.csv";
pub const CROSSREFS_FILE: &str = "identities_crossrefs.csv";

/// K-levels whose holders sit in the Iron Sultura division.
const IRON_SULTURA_KLEVELS: [&str; 2] = ["04", "05"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CmmIdentityRow {
    pub id: String,
    pub name: String,
    pub codename: String,
    pub faction: String,
    pub role: String,
    pub status: String,
    pub notes: String,
    pub military_rank: String,
    pub designation: String,
    pub command_priority: String,
}

#[derive(Debug, Deserialize)]
struct LevelRow {
    identity_id: String,
    #[serde(default)]
    klevel: String,
}

#[derive(Debug, Deserialize)]
struct EpochRow {
    identity_id: String,
    #[serde(default)]
    epoch_range: String,
}

#[derive(Debug, Deserialize)]
struct CrossrefRow {
    identity_id: String,
    #[serde(default, rename = "ref")]
    reference: String,
}

pub struct CmmSource {
    identities: Vec<Record>,
    levels: Vec<Record>,
    epochs: Vec<Record>,
    crossrefs: Vec<Record>,
}

#[derive(Debug, Clone)]
pub struct CmmIdentity {
    pub row: CmmIdentityRow,
    pub klevel: String,
    pub epoch_range: String,
    pub crossref: String,
}

pub struct CmmKlevelImporter {
    dir: PathBuf,
}

impl CmmKlevelImporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn upsert_character(conn: &Connection, identity: &CmmIdentity) -> Result<(i64, bool)> {
        let row = &identity.row;
        let fields = Fields::new()
            .with("codename", non_empty(Some(row.codename.as_str())))
            .with("faction", non_empty(Some(row.faction.as_str())))
            .with("primary_role", non_empty(Some(row.role.as_str())))
            .with("status", non_empty(Some(row.status.as_str())).unwrap_or("Active"));

        let mut update = Map::new();
        update.insert("klevel".into(), json!(identity.klevel));
        update.insert("cmm_designation".into(), json!(row.designation));
        update.insert("command_priority".into(), json!(row.command_priority));
        update.insert("epoch_range".into(), json!(identity.epoch_range));
        update.insert("crossref".into(), json!(identity.crossref));
        update.insert("notes".into(), json!(row.notes));

        match repo::character_id(conn, &row.name)? {
            Some(id) => {
                let stored = repo::character_secrets(conn, id)?;
                let mut all = fields;
                all.insert(
                    "character_secrets",
                    secrets::to_text(&secrets::merge(stored.as_deref(), update)),
                );
                repo::update_character_by_id(conn, id, &all)?;
                Ok((id, false))
            }
            None => {
                update.insert("imported_from".into(), json!(IDENTITIES_FILE));
                let mut all = fields;
                all.insert("character_secrets", secrets::to_text(&update));
                Ok((repo::add_character(conn, &row.name, &all)?, true))
            }
        }
    }
}

fn lookup<T, F>(records: Vec<Record>, split: F) -> Result<HashMap<String, String>>
where
    T: serde::de::DeserializeOwned,
    F: Fn(T) -> (String, String),
{
    records
        .into_iter()
        .map(|record| typed::<T>(record).map(&split))
        .collect()
}

#[async_trait(?Send)]
impl Pipeline for CmmKlevelImporter {
    type Source = CmmSource;
    type Staged = Vec<CmmIdentity>;

    fn name(&self) -> &str {
        "CMM K-Level Import"
    }

    async fn extract(&self) -> Result<CmmSource> {
        for file in [IDENTITIES_FILE, LEVELS_FILE, EPOCHS_FILE, CROSSREFS_FILE] {
            let path = self.dir.join(file);
            if !path.is_file() {
                return Err(UniverseError::MissingInput {
                    path: path.display().to_string(),
                });
            }
        }

        let source = CmmSource {
            identities: read_csv_records(&self.dir.join(IDENTITIES_FILE)).await?,
            levels: read_csv_records(&self.dir.join(LEVELS_FILE)).await?,
            epochs: read_csv_records(&self.dir.join(EPOCHS_FILE)).await?,
            crossrefs: read_csv_records(&self.dir.join(CROSSREFS_FILE)).await?,
        };
        info!(
            "✓ Loaded {} identities, {} klevel assignments, {} epoch ranges, {} crossrefs",
            source.identities.len(),
            source.levels.len(),
            source.epochs.len(),
            source.crossrefs.len()
        );
        Ok(source)
    }

    fn transform(&self, source: CmmSource) -> Result<Vec<CmmIdentity>> {
        let levels = lookup(source.levels, |r: LevelRow| (r.identity_id, r.klevel))?;
        let epochs = lookup(source.epochs, |r: EpochRow| (r.identity_id, r.epoch_range))?;
        let crossrefs = lookup(source.crossrefs, |r: CrossrefRow| (r.identity_id, r.reference))?;

        source
            .identities
            .into_iter()
            .map(|record| {
                let row: CmmIdentityRow = typed(record)?;
                Ok(CmmIdentity {
                    klevel: levels.get(&row.id).cloned().unwrap_or_default(),
                    epoch_range: epochs.get(&row.id).cloned().unwrap_or_default(),
                    crossref: crossrefs.get(&row.id).cloned().unwrap_or_default(),
                    row,
                })
            })
            .collect()
    }

    fn load(&self, db: &Database, identities: Vec<CmmIdentity>) -> Result<ChangeReport> {
        let mut report = ChangeReport::new(self.name());

        db.with_transaction(|tx| {
            let cmm = repo::corporation_id(tx, CONSTANTINE_MERIDIAN_MEDIA)?
                .ok_or_else(|| UniverseError::not_found("Corporation", CONSTANTINE_MERIDIAN_MEDIA))?;
            report.note(format!("CMM Corporation ID: {}", cmm));

            for identity in &identities {
                if identity.row.name.is_empty() {
                    report.skipped += 1;
                    continue;
                }
                info!(
                    "🔹 {} ({}) K-Level: {}",
                    identity.row.name, identity.row.codename, identity.klevel
                );

                let (character, created) = Self::upsert_character(tx, identity)?;
                if created {
                    report.imported += 1;
                } else {
                    report.updated += 1;
                }

                let division = if IRON_SULTURA_KLEVELS.contains(&identity.klevel.as_str()) {
                    repo::division_id(tx, IRON_SULTURA, Some(cmm))?
                } else {
                    None
                };

                let fields = Fields::new()
                    .with("division_id", division)
                    .with("clearance_level", non_empty(Some(identity.klevel.as_str())))
                    .with("military_rank", non_empty(Some(identity.row.military_rank.as_str())))
                    .with("position_title", non_empty(Some(identity.row.designation.as_str())));
                let mut insert = fields.clone();
                insert.insert("is_current", 1);
                let updated = repo::upsert_affiliations(tx, character, cmm, &fields, &insert)?;
                debug!(
                    "{} affiliation for {}",
                    if updated { "Updated" } else { "Created" },
                    identity.row.name
                );
            }

            report.total(
                "Total CMM",
                repo::count_where(tx, "SELECT COUNT(*) FROM characters WHERE faction = 'CMM'", [])?,
            );

            let mut stmt = tx.prepare(
                "SELECT clearance_level, COUNT(*)
                 FROM character_corporate_affiliations ca
                 JOIN characters c ON ca.character_id = c.character_id
                 WHERE c.faction = 'CMM'
                 GROUP BY clearance_level
                 ORDER BY clearance_level DESC",
            )?;
            let breakdown = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (level, n) in breakdown {
                report.total(&format!("K{}", level.unwrap_or_default()), n);
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
    use crate::db::{builder, schema, Table};
    use tempfile::TempDir;

    fn write_inputs(dir: &std::path::Path) {
        std::fs::write(
            dir.join(IDENTITIES_FILE),
            "id,name,codename,faction,role,status,notes,military_rank,designation,command_priority\n\
             kyra,Kyra Eve Constantine,Sovereign,CMM,Chair,Active,Founder line,General,Sovereign Prime,1\n\
             vale,Darius Kael,Ledger,CMM,Analyst,Active,,,,\n",
        )
        .unwrap();
        std::fs::write(dir.join(LEVELS_FILE), "identity_id,klevel\nkyra,05\nvale,02\n").unwrap();
        std::fs::write(dir.join(EPOCHS_FILE), "identity_id,epoch_range\nkyra,E1-E4\n").unwrap();
        std::fs::write(dir.join(CROSSREFS_FILE), "identity_id,ref\nkyra,PROTOCOL-9\n").unwrap();
    }

    fn db_with_cmm() -> Database {
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        let cmm = repo::add_corporation(db.conn(), CONSTANTINE_MERIDIAN_MEDIA, &Fields::new()).unwrap();
        builder::insert(
            db.conn(),
            Table::Divisions,
            &Fields::new().with("division_name", IRON_SULTURA).with("corp_id", cmm),
        )
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(IDENTITIES_FILE), "id,name\n").unwrap();

        let err = EtlEngine::new(CmmKlevelImporter::new(dir.path()))
            .run(&db_with_cmm())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, UniverseError::MissingInput { ref path } if path.ends_with(LEVELS_FILE)));
    }

    #[tokio::test]
    async fn test_cmm_must_exist() {
        let dir = TempDir::new().unwrap();
        write_inputs(dir.path());
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();

        let err = EtlEngine::new(CmmKlevelImporter::new(dir.path()))
            .run(&db)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, UniverseError::NotFound { .. }));
        assert_eq!(repo::count(db.conn(), Table::Characters).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_import_joins_lookups_and_assigns_division() {
        let dir = TempDir::new().unwrap();
        write_inputs(dir.path());
        let db = db_with_cmm();

        let report = EtlEngine::new(CmmKlevelImporter::new(dir.path()))
            .run(&db)
            .await
            .unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.total_for("Total CMM"), Some(2));
        assert_eq!(report.totals[1].0, "K05");

        let kyra = repo::get_character(db.conn(), "Kyra Eve Constantine").unwrap().unwrap();
        let stored = secrets::parse(repo::text(&kyra, "character_secrets"));
        assert_eq!(stored["epoch_range"], json!("E1-E4"));
        assert_eq!(stored["crossref"], json!("PROTOCOL-9"));
        assert_eq!(stored["imported_from"], json!(IDENTITIES_FILE));

        let employees =
            repo::get_corporation_employees(db.conn(), CONSTANTINE_MERIDIAN_MEDIA, true).unwrap();
        let kyra_affiliation = employees
            .iter()
            .find(|e| repo::text(e, "character_name") == Some("Kyra Eve Constantine"))
            .unwrap();
        assert_ne!(kyra_affiliation["division_id"], Value::Null);
        assert_eq!(repo::text(kyra_affiliation, "position_title"), Some("Sovereign Prime"));

        let darius = employees
            .iter()
            .find(|e| repo::text(e, "character_name") == Some("Darius Kael"))
            .unwrap();
        assert_eq!(darius["division_id"], Value::Null);

        // second run updates instead of creating
        let again = EtlEngine::new(CmmKlevelImporter::new(dir.path()))
            .run(&db)
            .await
            .unwrap();
        assert_eq!(again.updated, 2);
        assert_eq!(repo::count(db.conn(), Table::Affiliations).unwrap(), 2);
    }
}
