//! Corporate structure reconciliation: canonical renames, then public and
//! operational positions from the Shadow Core and CMM structure sheets.

use crate::app::importers::sources::{first_existing, read_csv_records, typed};
use crate::core::names::parenthesized;
use crate::db::{builder, repo, Database, Table};
use crate::domain::canon::{Canon, CONSTANTINE_MERIDIAN_MEDIA, IRON_SULTURA, NEXUS_ENRAENRA, SHADOW_CORE};
use crate::domain::model::{ChangeReport, Fields, Record};
use crate::domain::ports::Pipeline;
use crate::utils::error::{Result, UniverseError};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructureRow {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Corp", default)]
    pub corp: String,
}

/// Which organisation a `Corp` cell points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    NexusPublic,
    ShadowCore,
    Cmm { iron_sultura: bool },
}

impl Placement {
    pub fn classify(corp: &str) -> Option<Self> {
        if corp.contains(NEXUS_ENRAENRA) {
            Some(Placement::NexusPublic)
        } else if corp.contains(SHADOW_CORE) {
            Some(Placement::ShadowCore)
        } else if corp.contains("CMM") {
            Some(Placement::Cmm {
                iron_sultura: corp.contains(IRON_SULTURA),
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct Position {
    pub name: String,
    pub placement: Placement,
    pub title: String,
}

pub struct StructureSources {
    pub shadow_core: PathBuf,
    pub cmm: PathBuf,
}

impl StructureSources {
    pub fn locate(base: &Path) -> Result<Self> {
        let shadow_core = first_existing(&[
            base.join("shadowcore").join("corporate_structure.csv"),
            base.join("shadowcore").join("identities_shadow_core.csv"),
            base.join("corporate_structure.csv"),
        ])
        .ok_or_else(|| UniverseError::MissingInput {
            path: format!("{}/shadowcore/corporate_structure.csv", base.display()),
        })?;
        let cmm = first_existing(&[
            base.join("cmm").join("corporate_structure_cmm.csv"),
            base.join("cmm").join("identities.csv"),
            base.join("corporate_structure_cmm.csv"),
        ])
        .ok_or_else(|| UniverseError::MissingInput {
            path: format!("{}/cmm/corporate_structure_cmm.csv", base.display()),
        })?;
        Ok(Self { shadow_core, cmm })
    }
}

/// Resolved ids for the organisations a position can land in.
#[derive(Debug, Clone, Copy)]
struct Targets {
    nexus: Option<i64>,
    cmm: Option<i64>,
    shadow_core: Option<i64>,
    iron_sultura: Option<i64>,
}

impl Targets {
    fn resolve(conn: &Connection) -> Result<Self> {
        let nexus = repo::corporation_id(conn, NEXUS_ENRAENRA)?;
        let cmm = repo::corporation_id(conn, CONSTANTINE_MERIDIAN_MEDIA)?;
        Ok(Self {
            nexus,
            cmm,
            shadow_core: repo::division_id(conn, SHADOW_CORE, nexus)?,
            iron_sultura: repo::division_id(conn, IRON_SULTURA, cmm)?,
        })
    }

    fn place(&self, placement: Placement) -> (Option<i64>, Option<i64>) {
        match placement {
            Placement::NexusPublic => (self.nexus, None),
            Placement::ShadowCore => (self.nexus, self.shadow_core),
            Placement::Cmm { iron_sultura } => {
                (self.cmm, if iron_sultura { self.iron_sultura } else { None })
            }
        }
    }
}

pub struct CorporateStructureImporter {
    base: PathBuf,
    canon: Canon,
}

impl CorporateStructureImporter {
    pub fn new(base: impl Into<PathBuf>, canon: Canon) -> Self {
        Self {
            base: base.into(),
            canon,
        }
    }

    fn reconcile_names(&self, conn: &Connection, report: &mut ChangeReport) -> Result<i64> {
        let mut reconciled = 0;
        for (old, new) in &self.canon.renames {
            let Some(id) = repo::character_id(conn, old)? else {
                debug!("⚠ Not found: {} (may not be imported yet)", old);
                continue;
            };
            if repo::character_id(conn, new)?.is_some() {
                warn!("⚠ Cannot rename {} → {}: name already taken", old, new);
                continue;
            }
            conn.execute(
                "UPDATE characters SET character_name = ?1 WHERE character_id = ?2",
                params![new, id],
            )?;
            info!("✓ Updated: {} → {}", old, new);
            report.note(format!("Renamed {} → {}", old, new));
            reconciled += 1;
        }
        Ok(reconciled)
    }

    fn structure_notes(&self, conn: &Connection, report: &mut ChangeReport) -> Result<()> {
        let mut public = builder::query_maps(
            conn,
            "SELECT c.character_name, ca.position_title
             FROM characters c
             JOIN character_corporate_affiliations ca ON c.character_id = ca.character_id
             JOIN corporations corp ON ca.corp_id = corp.corp_id
             WHERE corp.corp_name = ?1 AND ca.division_id IS NULL",
            [NEXUS_ENRAENRA],
        )?;
        public.sort_by_key(|row| {
            self.canon
                .executive_rank(repo::text(row, "position_title").unwrap_or_default())
        });

        report.note(format!("{} Public Structure:", NEXUS_ENRAENRA));
        for row in &public {
            report.note(format!(
                "  • {}: {}",
                repo::text(row, "position_title").unwrap_or_default(),
                repo::text(row, "character_name").unwrap_or_default()
            ));
        }

        let operational = builder::query_maps(
            conn,
            "SELECT c.character_name, ca.position_title
             FROM characters c
             JOIN character_corporate_affiliations ca ON c.character_id = ca.character_id
             JOIN divisions d ON ca.division_id = d.division_id
             WHERE d.division_name = ?1
             ORDER BY c.character_name",
            [SHADOW_CORE],
        )?;
        report.note(format!("{} Operational Roles:", SHADOW_CORE));
        for row in &operational {
            let name = repo::text(row, "character_name").unwrap_or_default();
            match repo::text(row, "position_title").filter(|p| !p.is_empty()) {
                Some(position) => report.note(format!("  • {}: {}", name, position)),
                None => report.note(format!("  • {}", name)),
            }
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Pipeline for CorporateStructureImporter {
    type Source = Vec<Record>;
    type Staged = Vec<Position>;

    fn name(&self) -> &str {
        "Corporate Structure Reconciliation"
    }

    async fn extract(&self) -> Result<Vec<Record>> {
        let sources = StructureSources::locate(&self.base)?;
        info!("Shadow Core: {}", sources.shadow_core.display());
        info!("CMM: {}", sources.cmm.display());

        let mut rows = read_csv_records(&sources.shadow_core).await?;
        rows.extend(read_csv_records(&sources.cmm).await?);
        Ok(rows)
    }

    fn transform(&self, records: Vec<Record>) -> Result<Vec<Position>> {
        let mut positions = Vec::new();
        let mut placeholders = 0;
        for record in records {
            let row: StructureRow = typed(record)?;
            if row.name.is_empty() || row.name == "---" {
                continue;
            }
            if self.canon.is_placeholder(&row.name) {
                placeholders += 1;
                continue;
            }
            let Some(placement) = Placement::classify(&row.corp) else {
                debug!("Skipping {}: unrecognised corporation '{}'", row.name, row.corp);
                continue;
            };
            positions.push(Position {
                title: parenthesized(&row.corp).unwrap_or_default().to_string(),
                name: row.name,
                placement,
            });
        }
        info!(
            "✓ Loaded {} corporate positions ({} generic placeholders filtered)",
            positions.len(),
            placeholders
        );
        Ok(positions)
    }

    fn load(&self, db: &Database, positions: Vec<Position>) -> Result<ChangeReport> {
        let mut report = ChangeReport::new(self.name());

        db.with_transaction(|tx| {
            let reconciled = self.reconcile_names(tx, &mut report)?;
            let targets = Targets::resolve(tx)?;
            let mut positions_set = 0;

            for position in &positions {
                let (corp, division) = targets.place(position.placement);
                let Some(corp) = corp else {
                    warn!("⚠ {}: corporation for {:?} not found", position.name, position.placement);
                    report.skipped += 1;
                    continue;
                };
                let Some(character) = repo::character_id(tx, &position.name)? else {
                    warn!("📋 {}: character not found in database", position.name);
                    report.skipped += 1;
                    continue;
                };

                let fields = Fields::new()
                    .with("position_title", position.title.as_str())
                    .with("division_id", division);
                match repo::affiliation_ids(tx, character, Some(corp))?.first() {
                    Some(&affiliation) => {
                        repo::update_affiliation(tx, affiliation, &fields)?;
                        report.updated += 1;
                    }
                    None => {
                        let mut insert = fields;
                        insert.insert("is_current", 1);
                        repo::insert_affiliation(tx, character, corp, &insert)?;
                        report.imported += 1;
                    }
                }
                debug!("📋 {} → {}", position.name, position.title);
                positions_set += 1;
            }

            report.total("Names Reconciled", reconciled);
            report.total("Corporate Positions Set", positions_set);
            self.structure_notes(tx, &mut report)
        })?;

        Ok(report)
    }
}
