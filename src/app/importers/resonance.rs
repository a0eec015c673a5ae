//! Shadow Core resonance tiers and sigils.

use crate::app::importers::sources::{read_csv_records, typed};
use crate::core::names::snake_to_title;
use crate::core::secrets;
use crate::db::{repo, Database};
use crate::domain::canon::{NEXUS_ENRAENRA, SHADOW_CORE};
use crate::domain::model::{ChangeReport, Fields, Record};
use crate::domain::ports::Pipeline;
use crate::utils::error::{Result, UniverseError};
use async_trait::async_trait;
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Map};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

pub const LEVELS_FILE: &str = "resonance_levels.csv";
pub const HOLDERS_FILE: &str = "resonance_level_holders.csv";
pub const SIGILS_FILE: &str = "sigils_codex.csv";

#[derive(Debug, Clone, Deserialize)]
struct LevelRow {
    tier: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Clone, Deserialize)]
struct HolderRow {
    holder_id: String,
    #[serde(default)]
    tier: String,
    #[serde(default)]
    rrl_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Sigil {
    pub id: String,
    pub bearer_id: String,
    pub kanji: String,
    pub aspect: String,
    pub orchid: String,
    pub power: String,
    pub curse: String,
}

pub struct ResonanceSource {
    levels: Vec<Record>,
    holders: Vec<Record>,
    sigils: Vec<Record>,
}

#[derive(Debug, Clone)]
pub struct ResonanceHolder {
    pub holder_id: String,
    pub name: String,
    pub tier: std::result::Result<i64, String>,
    pub rrl_code: String,
    pub title: String,
    pub sigil: Option<Sigil>,
}

pub struct ResonanceImporter {
    dir: PathBuf,
}

impl ResonanceImporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Zero-padded clearance text for a tier: `3` -> `"03"`.
pub fn tier_clearance(tier: i64) -> String {
    format!("{:02}", tier)
}

#[async_trait(?Send)]
impl Pipeline for ResonanceImporter {
    type Source = ResonanceSource;
    type Staged = Vec<ResonanceHolder>;

    fn name(&self) -> &str {
        "Shadow Core Resonance Import"
    }

    async fn extract(&self) -> Result<ResonanceSource> {
        let source = ResonanceSource {
            levels: read_csv_records(&self.dir.join(LEVELS_FILE)).await?,
            holders: read_csv_records(&self.dir.join(HOLDERS_FILE)).await?,
            sigils: read_csv_records(&self.dir.join(SIGILS_FILE)).await?,
        };
        info!(
            "✓ Loaded {} tiers, {} holders, {} Sigils",
            source.levels.len(),
            source.holders.len(),
            source.sigils.len()
        );
        Ok(source)
    }

    fn transform(&self, source: ResonanceSource) -> Result<Vec<ResonanceHolder>> {
        let levels = source
            .levels
            .into_iter()
            .map(typed::<LevelRow>)
            .collect::<Result<Vec<_>>>()?;
        let mut sigils: HashMap<String, Sigil> = HashMap::new();
        for record in source.sigils {
            let sigil: Sigil = typed(record)?;
            sigils.insert(sigil.bearer_id.clone(), sigil);
        }

        source
            .holders
            .into_iter()
            .map(|record| {
                let holder: HolderRow = typed(record)?;
                let tier = holder
                    .tier
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| format!("{}: invalid tier '{}'", holder.holder_id, holder.tier));
                let title = tier
                    .as_ref()
                    .ok()
                    .and_then(|t| levels.iter().find(|l| l.tier == t.to_string()))
                    .map(|l| l.title.clone())
                    .unwrap_or_default();
                Ok(ResonanceHolder {
                    name: snake_to_title(&holder.holder_id),
                    sigil: sigils.get(&holder.holder_id).cloned(),
                    holder_id: holder.holder_id,
                    tier,
                    rrl_code: holder.rrl_code,
                    title,
                })
            })
            .collect()
    }

    fn load(&self, db: &Database, holders: Vec<ResonanceHolder>) -> Result<ChangeReport> {
        let mut report = ChangeReport::new(self.name());

        db.with_transaction(|tx| {
            let nexus = repo::corporation_id(tx, NEXUS_ENRAENRA)?
                .ok_or_else(|| UniverseError::not_found("Corporation", NEXUS_ENRAENRA))?;
            repo::division_id(tx, SHADOW_CORE, Some(nexus))?
                .ok_or_else(|| UniverseError::not_found("Division", SHADOW_CORE))?;

            for holder in &holders {
                let tier = match &holder.tier {
                    Ok(tier) => *tier,
                    Err(message) => {
                        warn!("⚠ {}", message);
                        report.errors.push(message.clone());
                        report.skipped += 1;
                        continue;
                    }
                };

                info!("🌸 {} - RRL Tier {}", holder.name, tier);
                if let Some(sigil) = &holder.sigil {
                    info!("   Sigil: {} ({}) Aspect: {}", sigil.id, sigil.kanji, sigil.aspect);
                }

                let Some(character) = repo::character_id(tx, &holder.name)? else {
                    warn!("   ⚠ {} not found, import the roster first", holder.name);
                    report.skipped += 1;
                    continue;
                };

                let mut update = Map::new();
                update.insert("rrl_tier".into(), json!(tier));
                update.insert("rrl_code".into(), json!(holder.rrl_code));
                update.insert("rrl_title".into(), json!(holder.title));
                if let Some(sigil) = &holder.sigil {
                    update.insert(
                        "sigil".into(),
                        json!({
                            "id": sigil.id,
                            "kanji": sigil.kanji,
                            "aspect": sigil.aspect,
                            "orchid": sigil.orchid,
                            "power": sigil.power,
                            "curse": sigil.curse,
                        }),
                    );
                }
                let stored = repo::character_secrets(tx, character)?;
                repo::update_character_by_id(
                    tx,
                    character,
                    &Fields::new().with(
                        "character_secrets",
                        secrets::to_text(&secrets::merge(stored.as_deref(), update)),
                    ),
                )?;

                tx.execute(
                    "UPDATE character_corporate_affiliations SET clearance_level = ?1
                     WHERE character_id = ?2",
                    params![tier_clearance(tier), character],
                )?;
                report.updated += 1;
            }
            Ok(())
        })?;

        Ok(report)
    }
}
