//! Hand-curated corrections applied after the identity import.

use crate::db::{repo, Database};
use crate::domain::canon::{CONSTANTINE_MERIDIAN_MEDIA, IRON_SULTURA, LEGACY_CMM_NAME, NEXUS_ENRAENRA, SHADOW_CORE};
use crate::domain::model::{ChangeReport, Fields};
use crate::utils::error::Result;
use rusqlite::Connection;
use tracing::info;

pub const MITSUKO_FROST: &str = "Mitsuko Frost";

fn adjust_haruto(conn: &Connection) -> Result<Option<String>> {
    let changed = repo::update_character(
        conn,
        "Haruto Frost",
        &Fields::new()
            .with("status", "Deceased")
            .with("faction", SHADOW_CORE)
            .with("primary_role", "Founder")
            .with(
                "backstory",
                "Founder of Shadow Core. Deceased under mysterious circumstances.",
            ),
    )?;
    Ok(changed.then(|| "✓ Updated Haruto Frost: Deceased, Shadow Core Founder".to_string()))
}

fn adjust_ren_kael(conn: &Connection) -> Result<Option<String>> {
    let Some(ren) = repo::character_id(conn, "Ren Kael")? else {
        return Ok(None);
    };
    repo::update_character_by_id(conn, ren, &Fields::new().with("faction", IRON_SULTURA))?;

    let cmm = match repo::corporation_id(conn, LEGACY_CMM_NAME)? {
        Some(id) => Some(id),
        None => repo::corporation_id(conn, CONSTANTINE_MERIDIAN_MEDIA)?,
    };
    if let Some(cmm) = cmm {
        if repo::affiliation_ids(conn, ren, Some(cmm))?.is_empty() {
            repo::insert_affiliation(
                conn,
                ren,
                cmm,
                &Fields::new()
                    .with("affiliation_type", "Operative")
                    .with("is_current", 1),
            )?;
        }
    }
    Ok(Some(
        "✓ Updated Ren Kael: Iron Sultura faction, CMM affiliation".to_string(),
    ))
}

fn adjust_reika(conn: &Connection) -> Result<Option<String>> {
    let Some(reika) = repo::character_id_like(conn, "Reika%Frost")? else {
        return Ok(None);
    };
    repo::update_character_by_id(
        conn,
        reika,
        &Fields::new()
            .with("narrative_importance", "Protagonist")
            .with("character_archetype", "The Leader"),
    )?;
    Ok(Some("✓ Updated Reika Frost: Marked as Protagonist".to_string()))
}

pub fn apply_adjustments(db: &Database) -> Result<ChangeReport> {
    let mut report = ChangeReport::new("Applying Post-Import Adjustments");

    db.with_transaction(|tx| {
        for adjustment in [adjust_haruto, adjust_ren_kael, adjust_reika] {
            if let Some(line) = adjustment(tx)? {
                info!("  {}", line);
                report.note(line);
                report.updated += 1;
            }
        }
        Ok(())
    })?;

    if report.notes.is_empty() {
        info!("  No adjustments needed");
        report.note("No adjustments needed");
    }
    Ok(report)
}

/// Mitsuko Frost has no identity record; she is added by hand.
pub fn add_mitsuko_frost(db: &Database) -> Result<ChangeReport> {
    let mut report = ChangeReport::new("Adding Mitsuko Frost");

    db.with_transaction(|tx| {
        if repo::character_id(tx, MITSUKO_FROST)?.is_some() {
            info!("  ⚠ {} already exists", MITSUKO_FROST);
            report.note(format!("⚠ {} already exists", MITSUKO_FROST));
            report.skipped += 1;
            return Ok(());
        }

        let mitsuko = repo::add_character(
            tx,
            MITSUKO_FROST,
            &Fields::new()
                .with("faction", SHADOW_CORE)
                .with("primary_role", "Unknown")
                .with("status", "Missing")
                .with("relationship_status", "Married")
                .with(
                    "family_notes",
                    "Wife of Haruto Frost (deceased), mother of Reika Frost",
                )
                .with("narrative_importance", "Supporting"),
        )?;
        report.imported += 1;
        report.note(format!("✓ Added {} (Missing status)", MITSUKO_FROST));

        if let Some(nexus) = repo::corporation_id(tx, NEXUS_ENRAENRA)? {
            repo::insert_affiliation(
                tx,
                mitsuko,
                nexus,
                &Fields::new()
                    .with("affiliation_type", "Former Associate")
                    .with("is_current", 0)
                    .with("affiliation_notes", "Missing since founding era"),
            )?;
            report.note(format!("✓ Linked to {}", NEXUS_ENRAENRA));
        }
        Ok(())
    })?;

    Ok(report)
}
