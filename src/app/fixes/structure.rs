//! Folds the legacy corporation layout into the current one: CMM under its
//! current name, Iron Sultura as a CMM division, Shadow Core under Nexus.

use crate::db::{builder, repo, schema, Database, Table};
use crate::domain::canon::{CONSTANTINE_MERIDIAN_MEDIA, IRON_SULTURA, NEXUS_ENRAENRA, SHADOW_CORE};
use crate::domain::model::{ChangeReport, Fields};
use crate::utils::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

const CMM_MISSION: &str = "A ruthless media conglomerate led by Kyra Eve Constantine, dedicated to dismantling Nexus Enraenra through information warfare, cyber operations, and military contracting.";
const CMM_ORIGIN: &str = "Founded in Chicago (2023) as a vehicle for generational vendetta.";
const CMM_SECRET_AGENDA: &str = "Founded in Chicago (2023) as a vehicle for generational vendetta against Reika Frost and Nexus Enraenra.";
const CMM_INDUSTRY: &str = "Media & Intelligence";
const CMM_SECTOR: &str = "Information Warfare";

const IRON_SULTURA_DESCRIPTION: &str = "CMM's militarized executive board - a ruthless cadre marked by military emblems (Skull, Trident, Shield, Talon, Crescent, Blade) operating from Chicago. Executes Kyra's vendetta with brutal precision.";
const IRON_SULTURA_EMBLEM: &str = "Skull, Trident, Shield, Talon, Crescent, Blade";
const SHADOW_CORE_DESCRIPTION: &str = "Nexus Enraenra's covert reaction force - elite operatives marked by unique sigils, operating in shadows to protect corporate interests and maintain global stability.";

/// Step 1: returns the CMM id, renaming or creating the corporation as needed.
fn ensure_cmm(conn: &Connection, report: &mut ChangeReport) -> Result<i64> {
    if let Some(legacy) = repo::corporation_id_like(conn, "%Corporate Memory%")? {
        builder::update(
            conn,
            Table::Corporations,
            &Fields::new()
                .with("corp_name", CONSTANTINE_MERIDIAN_MEDIA)
                .with("mission_statement", format!("{} {}", CMM_MISSION, CMM_ORIGIN))
                .with("industry", CMM_INDUSTRY)
                .with("sector", CMM_SECTOR),
            "corp_id",
            legacy,
        )?;
        info!("✓ Renamed Corporate Memory Management to {} (ID: {})", CONSTANTINE_MERIDIAN_MEDIA, legacy);
        report.note(format!("Renamed legacy CMM → {}", CONSTANTINE_MERIDIAN_MEDIA));
        report.updated += 1;
        return Ok(legacy);
    }

    if let Some(existing) = repo::corporation_id(conn, CONSTANTINE_MERIDIAN_MEDIA)? {
        info!("✓ {} already exists (ID: {})", CONSTANTINE_MERIDIAN_MEDIA, existing);
        return Ok(existing);
    }

    let id = repo::add_corporation(
        conn,
        CONSTANTINE_MERIDIAN_MEDIA,
        &Fields::new()
            .with("legal_name", "Constantine Meridian Media LLC")
            .with("industry", CMM_INDUSTRY)
            .with("sector", CMM_SECTOR)
            .with("mission_statement", CMM_MISSION)
            .with("secret_agenda", CMM_SECRET_AGENDA)
            .with("status", "Active"),
    )?;
    info!("➕ Created {} (ID: {})", CONSTANTINE_MERIDIAN_MEDIA, id);
    report.note(format!("Created {}", CONSTANTINE_MERIDIAN_MEDIA));
    report.imported += 1;
    Ok(id)
}

/// Step 3: moves affiliations and divisions off a stand-alone Iron Sultura corporation.
fn dissolve_iron_sultura_corporation(conn: &Connection, cmm: i64) -> Result<usize> {
    let Some(corp) = repo::corporation_id_like(conn, "%Iron Sultura%")? else {
        info!("✓ Iron Sultura not found as corporation");
        return Ok(0);
    };
    warn!("⚠ Iron Sultura found as separate corporation (ID: {})", corp);

    let migrated = conn.execute(
        "UPDATE character_corporate_affiliations SET corp_id = ?1 WHERE corp_id = ?2",
        params![cmm, corp],
    )?;
    conn.execute(
        "UPDATE divisions SET corp_id = ?1 WHERE corp_id = ?2",
        params![cmm, corp],
    )?;
    conn.execute("DELETE FROM corporations WHERE corp_id = ?1", [corp])?;
    info!("✓ Migrated {} affiliation(s) to CMM and removed the corporation", migrated);
    Ok(migrated)
}

fn ensure_division(
    conn: &Connection,
    name: &str,
    corp: i64,
    leader_pattern: &str,
    fields: Fields,
) -> Result<(i64, bool)> {
    if let Some(existing) = repo::division_id(conn, name, Some(corp))? {
        info!("ℹ {} division already exists (ID: {})", name, existing);
        return Ok((existing, false));
    }
    let leader = repo::character_id_like(conn, leader_pattern)?;
    let mut row = Fields::new()
        .with("division_name", name)
        .with("corp_id", corp)
        .with("leader_character_id", leader);
    row.extend(&fields);
    let id = builder::insert(conn, Table::Divisions, &row)?;
    info!("✓ Created {} division (ID: {})", name, id);
    Ok((id, true))
}

/// Step 6: every Iron Sultura character ends up in the CMM division.
fn assign_iron_sultura_characters(conn: &Connection, cmm: i64, division: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT character_id, character_name FROM characters WHERE faction = ?1 ORDER BY character_id",
    )?;
    let characters = stmt
        .query_map([IRON_SULTURA], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let fields = Fields::new().with("division_id", division);
    let insert = Fields::new().with("division_id", division).with("is_current", 1);
    let mut updated = Vec::new();
    for (id, name) in characters {
        let existed = repo::upsert_affiliations(conn, id, cmm, &fields, &insert)?;
        info!(
            "✓ {} {} → CMM ({} division)",
            if existed { "Updated" } else { "Created affiliation for" },
            name,
            IRON_SULTURA
        );
        updated.push(name);
    }
    Ok(updated)
}

pub fn fix_corporate_structure(db: &Database) -> Result<ChangeReport> {
    let mut report = ChangeReport::new("Corporate Structure Fix");

    db.with_transaction(|tx| {
        let cmm = ensure_cmm(tx, &mut report)?;
        report.note(format!("CMM ID: {}", cmm));

        // divisions must exist before Iron Sultura's rows move to CMM
        if schema::ensure_divisions(tx)? {
            report.note("Created divisions table");
        }

        let migrated = dissolve_iron_sultura_corporation(tx, cmm)?;
        report.total("Affiliations Migrated", migrated as i64);

        let mut divisions_created = 0;
        let (iron_sultura, created) = ensure_division(
            tx,
            IRON_SULTURA,
            cmm,
            "%Kyra%Constantine%",
            Fields::new()
                .with("description", IRON_SULTURA_DESCRIPTION)
                .with("emblem", IRON_SULTURA_EMBLEM)
                .with("headquarters", "Chicago, USA"),
        )?;
        divisions_created += created as i64;

        if let Some(nexus) = repo::corporation_id(tx, NEXUS_ENRAENRA)? {
            let (_, created) = ensure_division(
                tx,
                SHADOW_CORE,
                nexus,
                "%Reika%Frost%",
                Fields::new()
                    .with("description", SHADOW_CORE_DESCRIPTION)
                    .with("headquarters", "Tokyo, Japan"),
            )?;
            divisions_created += created as i64;
        } else {
            warn!("⚠ {} not found, Shadow Core division not created", NEXUS_ENRAENRA);
        }
        report.total("Divisions Created", divisions_created);

        let updated = assign_iron_sultura_characters(tx, cmm, iron_sultura)?;
        report.updated += updated.len();
        for name in &updated {
            report.note(format!("{} → CMM ({})", name, IRON_SULTURA));
        }

        report.total(
            "Iron Sultura Characters",
            repo::count_where(tx, "SELECT COUNT(*) FROM characters WHERE faction = ?1", [IRON_SULTURA])?,
        );
        report.total(
            "Iron Sultura Affiliations",
            repo::count_where(
                tx,
                "SELECT COUNT(*) FROM character_corporate_affiliations ca
                 JOIN divisions d ON ca.division_id = d.division_id
                 WHERE d.division_name = ?1",
                [IRON_SULTURA],
            )?,
        );

        let division_home: Option<String> = tx
            .query_row(
                "SELECT c.corp_name FROM divisions d JOIN corporations c ON d.corp_id = c.corp_id
                 WHERE d.division_id = ?1",
                [iron_sultura],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(home) = division_home {
            report.note(format!("{} Division under {}", IRON_SULTURA, home));
        }
        Ok(())
    })?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::canon::LEGACY_CMM_NAME;

    fn fresh() -> Database {
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        db
    }

    #[test]
    fn test_renames_legacy_cmm_and_dissolves_iron_sultura() {
        let db = fresh();
        let conn = db.conn();
        let legacy = repo::add_corporation(conn, LEGACY_CMM_NAME, &Fields::new()).unwrap();
        let iron = repo::add_corporation(conn, IRON_SULTURA, &Fields::new()).unwrap();
        repo::add_corporation(conn, NEXUS_ENRAENRA, &Fields::new()).unwrap();
        let voss = repo::add_character(conn, "Voss Harland", &Fields::new().with("faction", IRON_SULTURA)).unwrap();
        repo::add_character(conn, "Kyra Eve Constantine", &Fields::new()).unwrap();
        repo::add_character(conn, "Reika Frost", &Fields::new()).unwrap();
        repo::insert_affiliation(conn, voss, iron, &Fields::new()).unwrap();

        let report = fix_corporate_structure(&db).unwrap();

        assert_eq!(repo::corporation_id(conn, CONSTANTINE_MERIDIAN_MEDIA).unwrap(), Some(legacy));
        assert!(repo::corporation_id(conn, IRON_SULTURA).unwrap().is_none());
        assert_eq!(report.total_for("Affiliations Migrated"), Some(1));
        assert_eq!(report.total_for("Divisions Created"), Some(2));
        assert_eq!(report.total_for("Iron Sultura Affiliations"), Some(1));

        let leader: Option<i64> = conn
            .query_row(
                "SELECT leader_character_id FROM divisions WHERE division_name = ?1",
                [IRON_SULTURA],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leader, repo::character_id(conn, "Kyra Eve Constantine").unwrap());
    }

    #[test]
    fn test_fixes_database_without_divisions() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        for table in [Table::Locations, Table::Corporations, Table::Characters] {
            conn.execute_batch(&schema::create_table_sql(table)).unwrap();
        }
        conn.execute_batch(
            "CREATE TABLE character_corporate_affiliations (
                affiliation_id INTEGER PRIMARY KEY AUTOINCREMENT,
                character_id INTEGER NOT NULL,
                corp_id INTEGER NOT NULL,
                affiliation_type VARCHAR(50),
                position_title VARCHAR(200),
                start_date VARCHAR(50),
                is_current BOOLEAN DEFAULT 1,
                FOREIGN KEY (character_id) REFERENCES characters(character_id),
                FOREIGN KEY (corp_id) REFERENCES corporations(corp_id)
            )",
        )
        .unwrap();

        let legacy = repo::add_corporation(conn, LEGACY_CMM_NAME, &Fields::new()).unwrap();
        let iron = repo::add_corporation(conn, IRON_SULTURA, &Fields::new()).unwrap();
        let voss = repo::add_character(conn, "Voss Harland", &Fields::new().with("faction", IRON_SULTURA)).unwrap();
        repo::insert_affiliation(conn, voss, iron, &Fields::new()).unwrap();

        let report = fix_corporate_structure(&db).unwrap();

        assert!(report.notes.iter().any(|n| n == "Created divisions table"));
        assert_eq!(repo::corporation_id(conn, CONSTANTINE_MERIDIAN_MEDIA).unwrap(), Some(legacy));
        assert!(repo::corporation_id(conn, IRON_SULTURA).unwrap().is_none());
        assert_eq!(report.total_for("Affiliations Migrated"), Some(1));
        assert_eq!(report.total_for("Divisions Created"), Some(1));
        assert_eq!(report.total_for("Iron Sultura Affiliations"), Some(1));

        let employees = repo::get_corporation_employees(conn, CONSTANTINE_MERIDIAN_MEDIA, true).unwrap();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0]["character_name"], serde_json::Value::from("Voss Harland"));
    }

    #[test]
    fn test_creates_cmm_and_inserts_missing_affiliations() {
        let db = fresh();
        let conn = db.conn();
        repo::add_character(conn, "Ren Kael", &Fields::new().with("faction", IRON_SULTURA)).unwrap();

        let report = fix_corporate_structure(&db).unwrap();
        let cmm = repo::corporation_id(conn, CONSTANTINE_MERIDIAN_MEDIA).unwrap().unwrap();
        assert_eq!(report.imported, 1);
        // no Nexus, so only Iron Sultura is created
        assert_eq!(report.total_for("Divisions Created"), Some(1));

        let employees = repo::get_corporation_employees(conn, CONSTANTINE_MERIDIAN_MEDIA, true).unwrap();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0]["corp_id"], serde_json::Value::from(cmm));

        // a second run changes nothing structural
        let again = fix_corporate_structure(&db).unwrap();
        assert_eq!(again.total_for("Divisions Created"), Some(0));
        assert_eq!(repo::count(conn, Table::Affiliations).unwrap(), 1);
    }
}
