//! Canned queries for browsing the universe from the command line.

use crate::db::{builder, repo, Database};
use crate::domain::model::RowMap;
use crate::utils::error::Result;
use serde::Serialize;
use serde_json::Value;

fn header(out: &mut Vec<String>, title: &str) {
    out.push(String::new());
    out.push("=".repeat(60));
    out.push(title.to_uppercase());
    out.push("=".repeat(60));
}

fn present(row: &RowMap, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn shown(row: &RowMap, column: &str) -> String {
    present(row, column).unwrap_or_else(|| "None".to_string())
}

fn is_current(row: &RowMap) -> bool {
    row.get("is_current").and_then(Value::as_i64).unwrap_or(0) != 0
}

pub fn all_characters(db: &Database) -> Result<Vec<String>> {
    let mut out = Vec::new();
    header(&mut out, "All Characters");
    let rows = builder::query_maps(
        db.conn(),
        "SELECT character_name, codename, age, primary_role, faction, status
         FROM characters ORDER BY character_name",
        [],
    )?;
    if rows.is_empty() {
        out.push("No characters found.".to_string());
    }
    for row in &rows {
        out.push(format!("Name: {}", shown(row, "character_name")));
        if let Some(codename) = present(row, "codename") {
            out.push(format!("  Codename: {}", codename));
        }
        if let Some(age) = present(row, "age") {
            out.push(format!("  Age: {}", age));
        }
        out.push(format!("  Role: {}", shown(row, "primary_role")));
        out.push(format!("  Faction: {}", shown(row, "faction")));
        out.push(format!("  Status: {}", shown(row, "status")));
        out.push(String::new());
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationNode {
    pub id: i64,
    pub name: String,
    pub location_type: Option<String>,
    pub children: Vec<LocationNode>,
}

fn children_of(db: &Database, parent: Option<i64>) -> Result<Vec<LocationNode>> {
    let rows = builder::query_maps(
        db.conn(),
        "SELECT location_id, location_name, location_type FROM locations
         WHERE parent_location_id IS ?1 ORDER BY location_name",
        [parent],
    )?;
    rows.into_iter()
        .map(|row| {
            let id = row["location_id"].as_i64().unwrap_or_default();
            Ok(LocationNode {
                id,
                name: shown(&row, "location_name"),
                location_type: present(&row, "location_type"),
                children: children_of(db, Some(id))?,
            })
        })
        .collect()
}

/// Locations as a forest rooted at those without a parent.
pub fn location_tree(db: &Database) -> Result<Vec<LocationNode>> {
    children_of(db, None)
}

fn render_children(out: &mut Vec<String>, nodes: &[LocationNode], indent: usize) {
    for node in nodes {
        out.push(format!(
            "{}  └─ {} ({})",
            "  ".repeat(indent),
            node.name,
            node.location_type.as_deref().unwrap_or("None")
        ));
        render_children(out, &node.children, indent + 1);
    }
}

pub fn location_hierarchy(db: &Database) -> Result<Vec<String>> {
    let mut out = Vec::new();
    header(&mut out, "Location Hierarchy");
    for root in location_tree(db)? {
        out.push(format!(
            "📍 {} ({})",
            root.name,
            root.location_type.as_deref().unwrap_or("None")
        ));
        render_children(&mut out, &root.children, 1);
    }
    Ok(out)
}

fn render_event(out: &mut Vec<String>, row: &RowMap) {
    out.push(format!(
        "  {} ({})",
        present(row, "event_date").unwrap_or_else(|| "Unknown date".to_string()),
        shown(row, "event_type")
    ));
    out.push(format!("  {}", shown(row, "description")));
    if let Some(location) = present(row, "location_name") {
        out.push(format!("  Location: {}", location));
    }
}

/// Timeline for one character, or every character's events when `character` is `None`.
pub fn timeline(db: &Database, character: Option<&str>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let rows = match character {
        Some(name) => {
            header(&mut out, &format!("Timeline for {}", name));
            repo::get_character_timeline(db.conn(), name)?
        }
        None => {
            header(&mut out, "Cross-Character Timeline");
            builder::query_maps(
                db.conn(),
                "SELECT c.character_name, e.event_year, e.event_date, e.event_type,
                        e.description, l.location_name
                 FROM character_events e
                 JOIN characters c ON e.character_id = c.character_id
                 LEFT JOIN locations l ON e.location_id = l.location_id
                 ORDER BY e.event_year, e.event_date",
                [],
            )?
        }
    };

    if rows.is_empty() {
        out.push("No events found.".to_string());
    }
    let mut current_year: Option<Value> = None;
    for row in &rows {
        let year = row.get("event_year").cloned().unwrap_or(Value::Null);
        if current_year.as_ref() != Some(&year) {
            out.push(format!("━━━ {} ━━━", year));
            current_year = Some(year);
        }
        if character.is_none() {
            out.push(format!("[{}]", shown(row, "character_name")));
        }
        render_event(&mut out, row);
    }
    Ok(out)
}

pub fn corporation_employees(db: &Database, corp_name: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    header(&mut out, &format!("Employees at {}", corp_name));
    let rows = repo::get_corporation_employees(db.conn(), corp_name, false)?;
    if rows.is_empty() {
        out.push(format!("No employees found for {}.", corp_name));
    }
    for row in &rows {
        let status = if is_current(row) { "✓ Current" } else { "✗ Former" };
        out.push(format!("{} - {}", status, shown(row, "character_name")));
        out.push(format!("  Position: {}", shown(row, "position_title")));
        if let Some(department) = present(row, "department") {
            out.push(format!("  Department: {}", department));
        }
        if let Some(clearance) = present(row, "clearance_level") {
            out.push(format!("  Clearance: {}", clearance));
        }
        out.push(format!("  Started: {}", shown(row, "start_date")));
        out.push(String::new());
    }
    Ok(out)
}

/// Character row plus resolved birth, residence and current location names.
pub fn profile_row(db: &Database, name: &str) -> Result<Option<RowMap>> {
    let mut rows = builder::query_maps(
        db.conn(),
        "SELECT c.*,
                birth_loc.location_name AS birth_location,
                res_loc.location_name AS residence_location,
                curr_loc.location_name AS current_location
         FROM characters c
         LEFT JOIN locations birth_loc ON c.place_of_birth_id = birth_loc.location_id
         LEFT JOIN locations res_loc ON c.current_residence_id = res_loc.location_id
         LEFT JOIN locations curr_loc ON c.current_location_id = curr_loc.location_id
         WHERE c.character_name = ?1",
        [name],
    )?;
    Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
}

fn section(out: &mut Vec<String>, title: &str, body: Option<String>) {
    if let Some(body) = body {
        out.push(String::new());
        out.push(format!("━━━ {} ━━━", title));
        out.push(body);
    }
}

pub fn full_profile(db: &Database, name: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    header(&mut out, &format!("Full Profile: {}", name));
    let Some(character) = profile_row(db, name)? else {
        out.push(format!("Character '{}' not found.", name));
        return Ok(out);
    };

    out.push("━━━ IDENTITY ━━━".to_string());
    out.push(format!("Name: {}", shown(&character, "character_name")));
    for (label, column) in [("Legal Name", "legal_name"), ("Codename", "codename"), ("Pronouns", "pronouns")] {
        if let Some(value) = present(&character, column) {
            out.push(format!("{}: {}", label, value));
        }
    }

    if present(&character, "age").is_some() || present(&character, "date_of_birth").is_some() {
        out.push(String::new());
        out.push("━━━ BIOGRAPHICAL ━━━".to_string());
        for (label, column) in [
            ("Age", "age"),
            ("Date of Birth", "date_of_birth"),
            ("Place of Birth", "birth_location"),
            ("Nationality", "nationality"),
        ] {
            if let Some(value) = present(&character, column) {
                out.push(format!("{}: {}", label, value));
            }
        }
    }

    let residence = present(&character, "residence_location");
    let current = present(&character, "current_location");
    if residence.is_some() || current.is_some() {
        out.push(String::new());
        out.push("━━━ WHEREABOUTS ━━━".to_string());
        if let Some(residence) = residence {
            out.push(format!("Residence: {}", residence));
        }
        if let Some(current) = current {
            out.push(format!("Current Location: {}", current));
        }
    }

    section(&mut out, "PHYSICAL DESCRIPTION", present(&character, "physical_description"));

    if present(&character, "primary_role").is_some() || present(&character, "faction").is_some() {
        out.push(String::new());
        out.push("━━━ ROLE & FACTION ━━━".to_string());
        for (label, column) in [("Role", "primary_role"), ("Faction", "faction"), ("Allegiance", "allegiance")] {
            if let Some(value) = present(&character, column) {
                out.push(format!("{}: {}", label, value));
            }
        }
    }

    section(&mut out, "PERSONALITY", present(&character, "personality_summary"));
    section(&mut out, "BACKSTORY", present(&character, "backstory"));
    section(&mut out, "CURRENT ARC", present(&character, "current_arc"));
    section(&mut out, "GOALS", present(&character, "goals"));

    let affiliations = builder::query_maps(
        db.conn(),
        "SELECT corp.corp_name, a.position_title, a.affiliation_type, a.is_current
         FROM character_corporate_affiliations a
         JOIN corporations corp ON a.corp_id = corp.corp_id
         WHERE a.character_id = ?1",
        [character["character_id"].as_i64()],
    )?;
    if !affiliations.is_empty() {
        out.push(String::new());
        out.push("━━━ CORPORATE AFFILIATIONS ━━━".to_string());
        for affiliation in &affiliations {
            out.push(format!(
                "• {} ({})",
                shown(affiliation, "corp_name"),
                if is_current(affiliation) { "Current" } else { "Former" }
            ));
            out.push(format!(
                "  {} - {}",
                shown(affiliation, "position_title"),
                shown(affiliation, "affiliation_type")
            ));
        }
    }
    Ok(out)
}

pub fn events_in_year(db: &Database, year: i64) -> Result<Vec<String>> {
    let mut out = Vec::new();
    header(&mut out, &format!("Events in {}", year));
    let rows = builder::query_maps(
        db.conn(),
        "SELECT c.character_name, e.event_date, e.event_type, e.description, l.location_name
         FROM character_events e
         JOIN characters c ON e.character_id = c.character_id
         LEFT JOIN locations l ON e.location_id = l.location_id
         WHERE e.event_year = ?1
         ORDER BY e.event_date",
        [year],
    )?;
    if rows.is_empty() {
        out.push(format!("No events found in {}.", year));
    }
    for row in &rows {
        out.push(format!("[{}]", shown(row, "character_name")));
        render_event(&mut out, row);
        out.push(String::new());
    }
    Ok(out)
}
