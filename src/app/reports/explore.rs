//! Read-only tour of the database: counts, roster, structure, affiliations and secrets.

use crate::core::secrets;
use crate::db::{builder, repo, Database, Table};
use crate::domain::model::RowMap;
use crate::utils::error::Result;
use serde_json::Value;

const RULE_WIDTH: usize = 70;

fn header(out: &mut Vec<String>, title: &str) {
    out.push(String::new());
    out.push("=".repeat(RULE_WIDTH));
    out.push(format!("  {}", title));
    out.push("=".repeat(RULE_WIDTH));
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("N/A")
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        format!("{}...", text.chars().take(limit).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Renders a JSON scalar the way it reads in the report; `null` becomes `N/A`.
fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(Value::String(_)) => "N/A".to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn statistics(db: &Database) -> Result<Vec<String>> {
    let conn = db.conn();
    let mut out = Vec::new();
    header(&mut out, "DATABASE STATISTICS");
    out.push(format!("📊 Total Characters:     {}", repo::count(conn, Table::Characters)?));
    out.push(format!("🏢 Total Corporations:   {}", repo::count(conn, Table::Corporations)?));
    out.push(format!("🔹 Total Divisions:      {}", repo::count(conn, Table::Divisions)?));
    out.push(format!("🔗 Total Affiliations:   {}", repo::count(conn, Table::Affiliations)?));
    out.push(String::new());
    out.push("Character Status:".to_string());
    for row in builder::query_maps(
        conn,
        "SELECT status, COUNT(*) AS count FROM characters GROUP BY status ORDER BY status",
        [],
    )? {
        out.push(format!("   • {}: {}", or_na(repo::text(&row, "status")), row["count"]));
    }
    Ok(out)
}

pub fn roster_by_faction(db: &Database) -> Result<Vec<String>> {
    let conn = db.conn();
    let mut out = Vec::new();
    header(&mut out, "CHARACTER ROSTER BY FACTION");

    let factions = builder::query_maps(
        conn,
        "SELECT faction, COUNT(*) AS count FROM characters GROUP BY faction ORDER BY count DESC, faction",
        [],
    )?;
    out.push("📊 Faction Summary:".to_string());
    for row in &factions {
        out.push(format!(
            "   • {}: {} characters",
            or_na(repo::text(row, "faction")),
            row["count"]
        ));
    }

    for faction in &factions {
        let name = repo::text(faction, "faction");
        out.push(String::new());
        out.push(format!("🔷 {}", or_na(name)));
        out.push("-".repeat(RULE_WIDTH));

        let characters = builder::query_maps(
            conn,
            "SELECT character_name, codename, primary_role, status, character_secrets
             FROM characters WHERE faction IS ?1 ORDER BY character_name",
            [name],
        )?;
        for row in &characters {
            let icon = if repo::text(row, "status") == Some("Active") { "✓" } else { "✗" };
            let klevel = secrets::klevel(&secrets::parse(repo::text(row, "character_secrets")))
                .map(|k| format!(" [K{}]", k))
                .unwrap_or_default();
            out.push(format!(
                "   {} {:25} | {:20} | {}{}",
                icon,
                or_na(repo::text(row, "character_name")),
                or_na(repo::text(row, "codename")),
                or_na(repo::text(row, "primary_role")),
                klevel
            ));
        }
    }
    Ok(out)
}

pub fn corporate_structure(db: &Database) -> Result<Vec<String>> {
    let conn = db.conn();
    let mut out = Vec::new();
    header(&mut out, "CORPORATE STRUCTURE");

    let corporations = builder::query_maps(
        conn,
        "SELECT corp_id, corp_name, industry, sector, status FROM corporations ORDER BY corp_name",
        [],
    )?;
    for corp in &corporations {
        out.push(String::new());
        out.push(format!("🏢 {}", or_na(repo::text(corp, "corp_name"))));
        out.push(format!("   Industry: {}", or_na(repo::text(corp, "industry"))));
        out.push(format!("   Sector: {}", or_na(repo::text(corp, "sector"))));
        out.push(format!("   Status: {}", or_na(repo::text(corp, "status"))));

        let divisions = builder::query_maps(
            conn,
            "SELECT d.division_name, d.description, d.headquarters,
                    (SELECT COUNT(*) FROM character_corporate_affiliations ca
                     WHERE ca.division_id = d.division_id) AS members
             FROM divisions d WHERE d.corp_id = ?1 ORDER BY d.division_name",
            [corp["corp_id"].as_i64()],
        )?;
        if divisions.is_empty() {
            out.push("   No divisions".to_string());
            continue;
        }
        out.push("   Divisions:".to_string());
        for division in &divisions {
            out.push(format!("      🔹 {}", or_na(repo::text(division, "division_name"))));
            if let Some(hq) = repo::text(division, "headquarters") {
                out.push(format!("         HQ: {}", hq));
            }
            if let Some(description) = repo::text(division, "description") {
                out.push(format!("         {}", truncate(description, 80)));
            }
            out.push(format!("         Members: {}", division["members"]));
        }
    }
    Ok(out)
}

fn affiliation_line(row: &RowMap) -> String {
    let current = matches!(row.get("is_current").and_then(Value::as_i64), Some(1));
    let mut line = format!(
        "   {} {:25} ({:15})",
        if current { "✓" } else { "✗" },
        or_na(repo::text(row, "character_name")),
        or_na(repo::text(row, "codename"))
    );
    if let Some(clearance) = repo::text(row, "clearance_level").filter(|c| !c.is_empty()) {
        line.push_str(&format!(" | Clearance: K{}", clearance));
    }
    if let Some(position) = repo::text(row, "position_title").filter(|p| !p.is_empty()) {
        line.push_str(&format!(" | {}", position));
    }
    if let Some(rank) = repo::text(row, "military_rank").filter(|r| !r.is_empty()) {
        line.push_str(&format!(" | Rank: {}", rank));
    }
    line
}

pub fn affiliations_detail(db: &Database) -> Result<Vec<String>> {
    let mut out = Vec::new();
    header(&mut out, "CHARACTER AFFILIATIONS & CLEARANCE");

    let rows = builder::query_maps(
        db.conn(),
        "SELECT c.character_name, c.codename, corp.corp_name, d.division_name,
                ca.clearance_level, ca.position_title, ca.military_rank, ca.is_current
         FROM characters c
         LEFT JOIN character_corporate_affiliations ca ON c.character_id = ca.character_id
         LEFT JOIN corporations corp ON ca.corp_id = corp.corp_id
         LEFT JOIN divisions d ON ca.division_id = d.division_id
         ORDER BY corp.corp_name, d.division_name, c.character_name",
        [],
    )?;

    let mut current_corp: Option<String> = None;
    let mut current_division: Option<String> = None;
    for row in &rows {
        let corp = repo::text(row, "corp_name").unwrap_or("No Corporation").to_string();
        if current_corp.as_deref() != Some(corp.as_str()) {
            out.push(String::new());
            out.push(format!("🏢 {}", corp));
            out.push("-".repeat(RULE_WIDTH));
            current_corp = Some(corp);
            current_division = None;
        }
        let division = repo::text(row, "division_name").map(str::to_string);
        if division != current_division {
            if let Some(name) = &division {
                out.push(format!("   🔹 {}", name));
            }
            current_division = division;
        }
        out.push(affiliation_line(row));
    }
    Ok(out)
}

pub fn secrets_metadata(db: &Database) -> Result<Vec<String>> {
    let mut out = Vec::new();
    header(&mut out, "CHARACTER METADATA (Colors, Sigils, K-Levels)");

    let rows = builder::query_maps(
        db.conn(),
        "SELECT character_name, codename, faction, character_secrets
         FROM characters WHERE character_secrets IS NOT NULL
         ORDER BY faction, character_name",
        [],
    )?;

    let mut current_faction: Option<Option<String>> = None;
    for row in &rows {
        let faction = repo::text(row, "faction").map(str::to_string);
        if current_faction.as_ref() != Some(&faction) {
            out.push(String::new());
            out.push(format!("🔷 {}", or_na(faction.as_deref())));
            out.push("-".repeat(RULE_WIDTH));
            current_faction = Some(faction);
        }

        let name = or_na(repo::text(row, "character_name"));
        let codename = or_na(repo::text(row, "codename"));
        let raw = repo::text(row, "character_secrets").unwrap_or_default();
        let parsed: Option<serde_json::Map<String, Value>> = serde_json::from_str(raw).ok();
        let Some(parsed) = parsed else {
            out.push(format!("   {} ({}): [Unable to parse secrets]", name, codename));
            continue;
        };

        let colors = parsed.get("colors");
        out.push(format!("   {} ({})", name, codename));
        out.push(format!("      K-Level: {}", display_value(parsed.get("klevel"))));
        out.push(format!(
            "      Colors: {} / {}",
            display_value(colors.and_then(|c| c.get("primary"))),
            display_value(colors.and_then(|c| c.get("accent")))
        ));
        out.push(format!("      Verified: {}", display_value(parsed.get("verified_by"))));
        let sigils: Vec<&str> = parsed
            .get("sigils")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if !sigils.is_empty() {
            out.push(format!("      Sigils: {}", sigils.join(", ")));
        }
    }
    Ok(out)
}

/// Every explorer section, in display order.
pub fn explore(db: &Database) -> Result<String> {
    let mut out = vec![
        "=".repeat(RULE_WIDTH),
        "  RESONANCEVAULT DATABASE EXPLORER".to_string(),
        "=".repeat(RULE_WIDTH),
    ];
    out.extend(statistics(db)?);
    out.extend(roster_by_faction(db)?);
    out.extend(corporate_structure(db)?);
    out.extend(affiliations_detail(db)?);
    out.extend(secrets_metadata(db)?);
    Ok(out.join("\n"))
}
