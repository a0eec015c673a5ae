//! Common lookups and writes shared by the importers, fixes and the CLI.

use crate::db::builder::{self, query_maps};
use crate::db::Table;
use crate::domain::canon::{CONSTANTINE_MERIDIAN_MEDIA, LEGACY_CMM_NAME};
use crate::domain::model::{Fields, RowMap};
use crate::utils::error::{Result, UniverseError};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

pub fn count(conn: &Connection, table: Table) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

pub fn count_where<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<i64> {
    Ok(conn.query_row(sql, params, |row| row.get(0))?)
}

fn lookup_id(conn: &Connection, sql: &str, key: &str) -> Result<Option<i64>> {
    Ok(conn.query_row(sql, [key], |row| row.get(0)).optional()?)
}

pub fn character_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    lookup_id(
        conn,
        "SELECT character_id FROM characters WHERE character_name = ?1",
        name,
    )
}

/// First character (lowest id) whose name matches a LIKE pattern.
pub fn character_id_like(conn: &Connection, pattern: &str) -> Result<Option<i64>> {
    lookup_id(
        conn,
        "SELECT character_id FROM characters WHERE character_name LIKE ?1 ORDER BY character_id LIMIT 1",
        pattern,
    )
}

pub fn corporation_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    lookup_id(conn, "SELECT corp_id FROM corporations WHERE corp_name = ?1", name)
}

pub fn corporation_id_like(conn: &Connection, pattern: &str) -> Result<Option<i64>> {
    lookup_id(
        conn,
        "SELECT corp_id FROM corporations WHERE corp_name LIKE ?1 ORDER BY corp_id LIMIT 1",
        pattern,
    )
}

/// Constantine Meridian Media, whichever of its two names the database uses.
pub fn cmm_corporation_id(conn: &Connection) -> Result<Option<i64>> {
    match corporation_id(conn, CONSTANTINE_MERIDIAN_MEDIA)? {
        Some(id) => Ok(Some(id)),
        None => corporation_id(conn, LEGACY_CMM_NAME),
    }
}

/// Looks up a corporation by name, treating CMM's legacy and current names as one.
pub fn resolve_corporation(conn: &Connection, name: &str) -> Result<Option<i64>> {
    if name == CONSTANTINE_MERIDIAN_MEDIA || name == LEGACY_CMM_NAME {
        return cmm_corporation_id(conn);
    }
    corporation_id(conn, name)
}

pub fn location_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    lookup_id(
        conn,
        "SELECT location_id FROM locations WHERE location_name = ?1",
        name,
    )
}

pub fn division_id(conn: &Connection, name: &str, corp_id: Option<i64>) -> Result<Option<i64>> {
    let id = match corp_id {
        Some(corp_id) => conn
            .query_row(
                "SELECT division_id FROM divisions WHERE division_name = ?1 AND corp_id = ?2",
                params![name, corp_id],
                |row| row.get(0),
            )
            .optional()?,
        None => lookup_id(
            conn,
            "SELECT division_id FROM divisions WHERE division_name = ?1",
            name,
        )?,
    };
    Ok(id)
}

fn require(id: Option<i64>, entity: &str, name: &str) -> Result<i64> {
    id.ok_or_else(|| UniverseError::not_found(entity, name))
}

pub fn add_character(conn: &Connection, name: &str, fields: &Fields) -> Result<i64> {
    let mut all = Fields::new().with("character_name", name);
    all.extend(fields);
    builder::insert(conn, Table::Characters, &all)
}

pub fn get_character(conn: &Connection, name: &str) -> Result<Option<RowMap>> {
    let mut rows = query_maps(
        conn,
        "SELECT * FROM characters WHERE character_name = ?1",
        [name],
    )?;
    Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
}

pub fn search_characters(conn: &Connection, filters: &Fields) -> Result<Vec<RowMap>> {
    builder::select_where(conn, Table::Characters, filters, Some("character_id"))
}

/// Updates the named character and stamps `updated_at`. Returns whether a row changed.
pub fn update_character(conn: &Connection, name: &str, updates: &Fields) -> Result<bool> {
    if updates.is_empty() {
        return Ok(false);
    }
    let mut fields = updates.clone();
    fields.insert("updated_at", current_timestamp(conn)?);
    let changed = builder::update(conn, Table::Characters, &fields, "character_name", name)?;
    Ok(changed > 0)
}

/// Bulk-import update; leaves `updated_at` alone.
pub fn update_character_by_id(conn: &Connection, id: i64, updates: &Fields) -> Result<bool> {
    if updates.is_empty() {
        return Ok(false);
    }
    let changed = builder::update(conn, Table::Characters, updates, "character_id", id)?;
    Ok(changed > 0)
}

fn current_timestamp(conn: &Connection) -> Result<String> {
    Ok(conn.query_row("SELECT CURRENT_TIMESTAMP", [], |row| row.get(0))?)
}

#[derive(Debug, Clone, Default)]
pub struct NewEvent<'a> {
    pub character_name: &'a str,
    pub event_year: i64,
    pub description: &'a str,
    pub event_type: Option<&'a str>,
    pub event_date: Option<&'a str>,
    pub location_name: Option<&'a str>,
}

/// Adds an event. The character must exist; an unknown location is stored as NULL.
pub fn add_event(conn: &Connection, event: &NewEvent<'_>) -> Result<i64> {
    let character = require(
        character_id(conn, event.character_name)?,
        "Character",
        event.character_name,
    )?;
    let location = match event.location_name {
        Some(name) => location_id(conn, name)?,
        None => None,
    };

    let fields = Fields::new()
        .with("character_id", character)
        .with("event_year", event.event_year)
        .with("description", event.description)
        .with_opt("event_type", event.event_type)
        .with_opt("event_date", event.event_date)
        .with("location_id", location);
    builder::insert(conn, Table::CharacterEvents, &fields)
}

pub fn get_character_timeline(conn: &Connection, name: &str) -> Result<Vec<RowMap>> {
    query_maps(
        conn,
        "SELECT e.*, l.location_name
         FROM character_events e
         JOIN characters c ON e.character_id = c.character_id
         LEFT JOIN locations l ON e.location_id = l.location_id
         WHERE c.character_name = ?1
         ORDER BY e.event_year, e.event_date",
        [name],
    )
}

pub fn add_corporation(conn: &Connection, name: &str, fields: &Fields) -> Result<i64> {
    let mut all = Fields::new().with("corp_name", name);
    all.extend(fields);
    builder::insert(conn, Table::Corporations, &all)
}

pub fn get_corporation_employees(
    conn: &Connection,
    corp_name: &str,
    current_only: bool,
) -> Result<Vec<RowMap>> {
    let mut sql = String::from(
        "SELECT c.character_name, a.*
         FROM character_corporate_affiliations a
         JOIN characters c ON a.character_id = c.character_id
         JOIN corporations corp ON a.corp_id = corp.corp_id
         WHERE corp.corp_name = ?1",
    );
    if current_only {
        sql.push_str(" AND a.is_current = 1");
    }
    sql.push_str(" ORDER BY a.is_current DESC, a.start_date");
    query_maps(conn, &sql, [corp_name])
}

pub fn add_location(conn: &Connection, name: &str, fields: &Fields) -> Result<i64> {
    let mut all = Fields::new().with("location_name", name);
    all.extend(fields);
    builder::insert(conn, Table::Locations, &all)
}

/// Links a character to a corporation; both must already exist.
pub fn add_affiliation(
    conn: &Connection,
    character_name: &str,
    corp_name: &str,
    affiliation_type: Option<&str>,
    fields: &Fields,
) -> Result<i64> {
    let character = require(character_id(conn, character_name)?, "Character", character_name)?;
    let corp = require(corporation_id(conn, corp_name)?, "Corporation", corp_name)?;

    let mut all = Fields::new()
        .with("character_id", character)
        .with("corp_id", corp)
        .with("affiliation_type", affiliation_type.unwrap_or("Employee"));
    all.extend(fields);
    builder::insert(conn, Table::Affiliations, &all)
}

/// Inserts an affiliation from already-resolved ids.
pub fn insert_affiliation(conn: &Connection, character: i64, corp: i64, fields: &Fields) -> Result<i64> {
    let mut all = Fields::new()
        .with("character_id", character)
        .with("corp_id", corp);
    all.extend(fields);
    builder::insert(conn, Table::Affiliations, &all)
}

pub fn affiliation_ids(conn: &Connection, character: i64, corp: Option<i64>) -> Result<Vec<i64>> {
    let ids = match corp {
        Some(corp) => {
            let mut stmt = conn.prepare(
                "SELECT affiliation_id FROM character_corporate_affiliations
                 WHERE character_id = ?1 AND corp_id = ?2 ORDER BY affiliation_id",
            )?;
            let ids = stmt
                .query_map(params![character, corp], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            ids
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT affiliation_id FROM character_corporate_affiliations
                 WHERE character_id = ?1 ORDER BY affiliation_id",
            )?;
            let ids = stmt
                .query_map([character], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            ids
        }
    };
    Ok(ids)
}

pub fn update_affiliation(conn: &Connection, affiliation: i64, fields: &Fields) -> Result<usize> {
    builder::update(conn, Table::Affiliations, fields, "affiliation_id", affiliation)
}

/// Applies `fields` to every affiliation of `character`; inserts `insert_fields`
/// as a new affiliation with `corp` when the character has none.
/// Returns true when rows were updated rather than inserted.
pub fn upsert_affiliations(
    conn: &Connection,
    character: i64,
    corp: i64,
    fields: &Fields,
    insert_fields: &Fields,
) -> Result<bool> {
    let existing = affiliation_ids(conn, character, None)?;
    if existing.is_empty() {
        insert_affiliation(conn, character, corp, insert_fields)?;
        return Ok(false);
    }

    let mut updates = Fields::new().with("corp_id", corp);
    updates.extend(fields);
    for id in existing {
        update_affiliation(conn, id, &updates)?;
    }
    Ok(true)
}

pub fn character_secrets(conn: &Connection, character: i64) -> Result<Option<String>> {
    let secrets: Option<Option<String>> = conn
        .query_row(
            "SELECT character_secrets FROM characters WHERE character_id = ?1",
            [character],
            |row| row.get(0),
        )
        .optional()?;
    Ok(secrets.flatten())
}

pub fn get_database_stats(conn: &Connection) -> Result<Vec<(Table, i64)>> {
    Table::ALL
        .into_iter()
        .map(|table| -> Result<(Table, i64)> { Ok((table, count(conn, table)?)) })
        .collect()
}

/// Text value of a row column, if present and non-null.
pub fn text<'a>(row: &'a RowMap, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{schema, Database};

    fn db() -> Database {
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        db
    }

    #[test]
    fn test_update_by_id_keeps_updated_at() {
        let db = db();
        let conn = db.conn();
        let id = add_character(conn, "Mitsuko Frost", &Fields::new()).unwrap();
        conn.execute("UPDATE characters SET updated_at = NULL WHERE character_id = ?1", [id])
            .unwrap();

        assert!(update_character_by_id(conn, id, &Fields::new().with("status", "Missing")).unwrap());
        let row = get_character(conn, "Mitsuko Frost").unwrap().unwrap();
        assert_eq!(text(&row, "status"), Some("Missing"));
        assert_eq!(row["updated_at"], serde_json::Value::Null);

        assert!(update_character(conn, "Mitsuko Frost", &Fields::new().with("status", "Active")).unwrap());
        let row = get_character(conn, "Mitsuko Frost").unwrap().unwrap();
        assert!(text(&row, "updated_at").is_some());
    }

    #[test]
    fn test_character_round_trip() {
        let db = db();
        let conn = db.conn();
        let id = add_character(
            conn,
            "Shion",
            &Fields::new().with("faction", "Shadow Core").with("age", 27),
        )
        .unwrap();

        assert_eq!(character_id(conn, "Shion").unwrap(), Some(id));
        let row = get_character(conn, "Shion").unwrap().unwrap();
        assert_eq!(text(&row, "faction"), Some("Shadow Core"));
        assert_eq!(text(&row, "status"), Some("Active"));

        assert!(update_character(conn, "Shion", &Fields::new().with("status", "Missing")).unwrap());
        assert!(!update_character(conn, "Nobody", &Fields::new().with("status", "Missing")).unwrap());

        let found = search_characters(conn, &Fields::new().with("status", "Missing")).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_add_event_requires_character() {
        let db = db();
        let event = NewEvent {
            character_name: "Ghost",
            event_year: 2031,
            description: "Vanished",
            ..NewEvent::default()
        };
        let err = add_event(db.conn(), &event).err().unwrap();
        assert!(matches!(err, UniverseError::NotFound { .. }));
    }

    #[test]
    fn test_event_with_unknown_location_is_null() {
        let db = db();
        let conn = db.conn();
        add_character(conn, "Shion", &Fields::new()).unwrap();
        add_event(
            conn,
            &NewEvent {
                character_name: "Shion",
                event_year: 2030,
                description: "Joined",
                location_name: Some("Atlantis"),
                ..NewEvent::default()
            },
        )
        .unwrap();
        add_event(
            conn,
            &NewEvent {
                character_name: "Shion",
                event_year: 2020,
                description: "Born",
                ..NewEvent::default()
            },
        )
        .unwrap();

        let timeline = get_character_timeline(conn, "Shion").unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(text(&timeline[0], "description"), Some("Born"));
        assert_eq!(timeline[1]["location_id"], Value::Null);
    }

    #[test]
    fn test_affiliation_and_employees() {
        let db = db();
        let conn = db.conn();
        add_character(conn, "Shion", &Fields::new()).unwrap();
        add_character(conn, "Kenji", &Fields::new()).unwrap();
        add_corporation(conn, "Nexus Enraenra", &Fields::new()).unwrap();

        add_affiliation(conn, "Shion", "Nexus Enraenra", None, &Fields::new()).unwrap();
        add_affiliation(
            conn,
            "Kenji",
            "Nexus Enraenra",
            Some("Contractor"),
            &Fields::new().with("is_current", 0),
        )
        .unwrap();

        let all = get_corporation_employees(conn, "Nexus Enraenra", false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(text(&all[0], "character_name"), Some("Shion"));
        assert_eq!(text(&all[0], "affiliation_type"), Some("Employee"));

        let current = get_corporation_employees(conn, "Nexus Enraenra", true).unwrap();
        assert_eq!(current.len(), 1);

        let err = add_affiliation(conn, "Shion", "Nobody Inc", None, &Fields::new())
            .err()
            .unwrap();
        assert!(matches!(err, UniverseError::NotFound { .. }));
    }

    #[test]
    fn test_upsert_affiliations() {
        let db = db();
        let conn = db.conn();
        let character = add_character(conn, "Shion", &Fields::new()).unwrap();
        let nexus = add_corporation(conn, "Nexus Enraenra", &Fields::new()).unwrap();
        let cmm = add_corporation(conn, "Constantine Meridian Media", &Fields::new()).unwrap();

        let updated = upsert_affiliations(
            conn,
            character,
            nexus,
            &Fields::new(),
            &Fields::new().with("affiliation_type", "Operative"),
        )
        .unwrap();
        assert!(!updated);

        let updated = upsert_affiliations(
            conn,
            character,
            cmm,
            &Fields::new().with("clearance_level", "04"),
            &Fields::new(),
        )
        .unwrap();
        assert!(updated);
        assert_eq!(affiliation_ids(conn, character, Some(cmm)).unwrap().len(), 1);
        assert!(affiliation_ids(conn, character, Some(nexus)).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_corporation_accepts_either_cmm_name() {
        let db = db();
        let conn = db.conn();
        let id = add_corporation(conn, LEGACY_CMM_NAME, &Fields::new()).unwrap();

        assert_eq!(resolve_corporation(conn, CONSTANTINE_MERIDIAN_MEDIA).unwrap(), Some(id));
        assert_eq!(resolve_corporation(conn, LEGACY_CMM_NAME).unwrap(), Some(id));
        assert_eq!(resolve_corporation(conn, "Nexus Enraenra").unwrap(), None);
    }

    #[test]
    fn test_database_stats_cover_every_table() {
        let db = db();
        let stats = get_database_stats(db.conn()).unwrap();
        assert_eq!(stats.len(), Table::ALL.len());
        assert!(stats.iter().all(|(_, n)| *n == 0));
    }
}
