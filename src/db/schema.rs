use crate::db::{builder, Database};
use crate::utils::error::Result;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Table {
    Locations,
    Corporations,
    Characters,
    Divisions,
    CharacterEvents,
    Affiliations,
}

impl Table {
    /// Creation order; referenced tables come first.
    pub const ALL: [Table; 6] = [
        Table::Locations,
        Table::Corporations,
        Table::Characters,
        Table::Divisions,
        Table::CharacterEvents,
        Table::Affiliations,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Locations => "locations",
            Table::Corporations => "corporations",
            Table::Characters => "characters",
            Table::Divisions => "divisions",
            Table::CharacterEvents => "character_events",
            Table::Affiliations => "character_corporate_affiliations",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            Table::Locations => "location_id",
            Table::Corporations => "corp_id",
            Table::Characters => "character_id",
            Table::Divisions => "division_id",
            Table::CharacterEvents => "event_id",
            Table::Affiliations => "affiliation_id",
        }
    }

    /// Human-readable name column, for tables whose rows have one.
    pub fn display_column(&self) -> Option<&'static str> {
        match self {
            Table::Locations => Some("location_name"),
            Table::Corporations => Some("corp_name"),
            Table::Characters => Some("character_name"),
            Table::Divisions => Some("division_name"),
            Table::CharacterEvents | Table::Affiliations => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn columns(&self) -> &'static [ColumnSpec] {
        match self {
            Table::Locations => LOCATION_COLUMNS,
            Table::Corporations => CORPORATION_COLUMNS,
            Table::Characters => CHARACTER_COLUMNS,
            Table::Divisions => DIVISION_COLUMNS,
            Table::CharacterEvents => EVENT_COLUMNS,
            Table::Affiliations => AFFILIATION_COLUMNS,
        }
    }

    pub fn constraints(&self) -> &'static [&'static str] {
        match self {
            Table::Locations => &["FOREIGN KEY (parent_location_id) REFERENCES locations(location_id)"],
            Table::Corporations => &[
                "FOREIGN KEY (parent_corp_id) REFERENCES corporations(corp_id)",
                "FOREIGN KEY (acquired_by_corp_id) REFERENCES corporations(corp_id)",
                "FOREIGN KEY (headquarters_location_id) REFERENCES locations(location_id)",
            ],
            Table::Characters => &[
                "FOREIGN KEY (place_of_birth_id) REFERENCES locations(location_id)",
                "FOREIGN KEY (current_residence_id) REFERENCES locations(location_id)",
                "FOREIGN KEY (current_location_id) REFERENCES locations(location_id)",
            ],
            Table::Divisions => &[
                "FOREIGN KEY (corp_id) REFERENCES corporations(corp_id)",
                "FOREIGN KEY (leader_character_id) REFERENCES characters(character_id)",
            ],
            Table::CharacterEvents => &[
                "FOREIGN KEY (character_id) REFERENCES characters(character_id)",
                "FOREIGN KEY (location_id) REFERENCES locations(location_id)",
            ],
            Table::Affiliations => &[
                "FOREIGN KEY (character_id) REFERENCES characters(character_id)",
                "FOREIGN KEY (corp_id) REFERENCES corporations(corp_id)",
                "FOREIGN KEY (division_id) REFERENCES divisions(division_id)",
            ],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub decl: &'static str,
}

const fn col(name: &'static str, decl: &'static str) -> ColumnSpec {
    ColumnSpec { name, decl }
}

const PK: &str = "INTEGER PRIMARY KEY AUTOINCREMENT";
const STAMP: &str = "TIMESTAMP DEFAULT CURRENT_TIMESTAMP";
const STATUS: &str = "VARCHAR(50) DEFAULT 'Active'";

const LOCATION_COLUMNS: &[ColumnSpec] = &[
    col("location_id", PK),
    col("location_name", "VARCHAR(200) NOT NULL"),
    col("location_type", "VARCHAR(50)"),
    col("parent_location_id", "INTEGER"),
    col("city", "VARCHAR(100)"),
    col("state_province", "VARCHAR(100)"),
    col("country", "VARCHAR(100)"),
    col("latitude", "DECIMAL(10, 8)"),
    col("longitude", "DECIMAL(11, 8)"),
    col("description", "TEXT"),
    col("significance", "TEXT"),
    col("status", STATUS),
    col("created_at", STAMP),
    col("updated_at", STAMP),
];

const CORPORATION_COLUMNS: &[ColumnSpec] = &[
    col("corp_id", PK),
    col("corp_name", "VARCHAR(200) NOT NULL UNIQUE"),
    col("legal_name", "VARCHAR(200)"),
    col("industry", "VARCHAR(100)"),
    col("sector", "VARCHAR(100)"),
    col("net_worth_range", "VARCHAR(50)"),
    col("market_cap_usd", "DECIMAL(20, 2)"),
    col("annual_revenue_usd", "DECIMAL(20, 2)"),
    col("nasdaq_symbol", "VARCHAR(10)"),
    col("stock_exchange", "VARCHAR(20)"),
    col("is_public", "BOOLEAN DEFAULT 0"),
    col("parent_corp_id", "INTEGER"),
    col("acquired_by_corp_id", "INTEGER"),
    col("acquisition_date", "DATE"),
    col("employee_count", "INTEGER"),
    col("founding_date", "DATE"),
    col("headquarters_location_id", "INTEGER"),
    col("mission_statement", "TEXT"),
    col("public_reputation", "VARCHAR(50)"),
    col("secret_agenda", "TEXT"),
    col("website_url", "VARCHAR(255)"),
    col("logo_description", "TEXT"),
    col("status", STATUS),
    col("created_at", STAMP),
    col("updated_at", STAMP),
];

const CHARACTER_COLUMNS: &[ColumnSpec] = &[
    col("character_id", PK),
    col("character_name", "VARCHAR(200) NOT NULL"),
    col("legal_name", "VARCHAR(200)"),
    col("codename", "VARCHAR(100)"),
    col("aliases", "TEXT"),
    col("pronouns", "VARCHAR(50)"),
    col("date_of_birth", "DATE"),
    col("age", "INTEGER"),
    col("place_of_birth_id", "INTEGER"),
    col("current_residence_id", "INTEGER"),
    col("nationality", "VARCHAR(100)"),
    col("ethnicity", "VARCHAR(100)"),
    col("languages_spoken", "TEXT"),
    col("height_cm", "INTEGER"),
    col("weight_kg", "INTEGER"),
    col("build", "VARCHAR(50)"),
    col("hair_color", "VARCHAR(50)"),
    col("hair_style", "VARCHAR(100)"),
    col("eye_color", "VARCHAR(50)"),
    col("skin_tone", "VARCHAR(50)"),
    col("distinguishing_features", "TEXT"),
    col("physical_description", "TEXT"),
    col("primary_role", "VARCHAR(100)"),
    col("faction", "VARCHAR(100)"),
    col("allegiance", "TEXT"),
    col("personality_summary", "TEXT"),
    col("core_values", "TEXT"),
    col("fears", "TEXT"),
    col("motivations", "TEXT"),
    col("flaws", "TEXT"),
    col("strengths", "TEXT"),
    col("skill_set", "TEXT"),
    col("special_abilities", "TEXT"),
    col("education_background", "TEXT"),
    col("certifications", "TEXT"),
    col("backstory", "TEXT"),
    col("current_arc", "TEXT"),
    col("character_secrets", "TEXT"),
    col("goals", "TEXT"),
    col("medical_history", "TEXT"),
    col("current_medications", "TEXT"),
    col("allergies", "TEXT"),
    col("blood_type", "VARCHAR(10)"),
    col("cybernetic_implants", "TEXT"),
    col("genetic_modifications", "TEXT"),
    col("mental_health_notes", "TEXT"),
    col("criminal_record", "TEXT"),
    col("legal_status", "VARCHAR(100)"),
    col("crimes_committed", "TEXT"),
    col("online_handles", "TEXT"),
    col("digital_footprint", "TEXT"),
    col("hacker_reputation", "VARCHAR(100)"),
    col("social_media_presence", "VARCHAR(50)"),
    col("email_addresses", "TEXT"),
    col("family_notes", "TEXT"),
    col("relationship_status", "VARCHAR(50)"),
    col("emergency_contact", "TEXT"),
    col("status", STATUS),
    col("date_of_death", "DATE"),
    col("cause_of_death", "TEXT"),
    col("current_location_id", "INTEGER"),
    col("portrait_description", "TEXT"),
    col("voice_description", "TEXT"),
    col("fashion_style", "TEXT"),
    col("narrative_importance", "VARCHAR(50)"),
    col("character_archetype", "VARCHAR(100)"),
    col("story_tags", "TEXT"),
    col("created_at", STAMP),
    col("updated_at", STAMP),
];

const DIVISION_COLUMNS: &[ColumnSpec] = &[
    col("division_id", PK),
    col("division_name", "TEXT NOT NULL"),
    col("corp_id", "INTEGER NOT NULL"),
    col("description", "TEXT"),
    col("leader_character_id", "INTEGER"),
    col("emblem", "TEXT"),
    col("headquarters", "TEXT"),
];

const EVENT_COLUMNS: &[ColumnSpec] = &[
    col("event_id", PK),
    col("character_id", "INTEGER NOT NULL"),
    col("event_year", "INTEGER NOT NULL"),
    col("event_date", "TEXT"),
    col("event_type", "VARCHAR(50)"),
    col("description", "TEXT NOT NULL"),
    col("location_id", "INTEGER"),
    col("created_at", STAMP),
    col("updated_at", STAMP),
];

const AFFILIATION_COLUMNS: &[ColumnSpec] = &[
    col("affiliation_id", PK),
    col("character_id", "INTEGER NOT NULL"),
    col("corp_id", "INTEGER NOT NULL"),
    col("division_id", "INTEGER"),
    col("affiliation_type", "VARCHAR(50)"),
    col("position_title", "VARCHAR(200)"),
    col("department", "VARCHAR(100)"),
    col("clearance_level", "VARCHAR(100)"),
    col("access_codes", "TEXT"),
    col("military_rank", "VARCHAR(100)"),
    col("sigil_emblem_description", "TEXT"),
    col("start_date", "DATE"),
    col("end_date", "DATE"),
    col("is_current", "BOOLEAN DEFAULT 1"),
    col("equity_percentage", "DECIMAL(5, 2)"),
    col("salary_range", "VARCHAR(50)"),
    col("affiliation_notes", "TEXT"),
    col("created_at", STAMP),
    col("updated_at", STAMP),
];

/// (index name, table, indexed column)
pub const INDEXES: &[(&str, Table, &str)] = &[
    ("idx_locations_parent", Table::Locations, "parent_location_id"),
    ("idx_locations_type", Table::Locations, "location_type"),
    ("idx_corporations_name", Table::Corporations, "corp_name"),
    ("idx_corporations_parent", Table::Corporations, "parent_corp_id"),
    ("idx_corporations_industry", Table::Corporations, "industry"),
    ("idx_characters_name", Table::Characters, "character_name"),
    ("idx_characters_codename", Table::Characters, "codename"),
    ("idx_characters_faction", Table::Characters, "faction"),
    ("idx_characters_status", Table::Characters, "status"),
    ("idx_events_character", Table::CharacterEvents, "character_id"),
    ("idx_events_year", Table::CharacterEvents, "event_year"),
    ("idx_events_type", Table::CharacterEvents, "event_type"),
    ("idx_affiliations_character", Table::Affiliations, "character_id"),
    ("idx_affiliations_corp", Table::Affiliations, "corp_id"),
    ("idx_affiliations_current", Table::Affiliations, "is_current"),
    ("idx_divisions_corp", Table::Divisions, "corp_id"),
    ("idx_affiliations_division", Table::Affiliations, "division_id"),
];

pub fn create_table_sql(table: Table) -> String {
    let mut lines: Vec<String> = table
        .columns()
        .iter()
        .map(|c| format!("  {} {}", c.name, c.decl))
        .collect();
    lines.extend(table.constraints().iter().map(|c| format!("  {}", c)));

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        table.name(),
        lines.join(",\n")
    )
}

pub fn create_index_sql(index: &str, table: Table, column: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {}({})",
        index,
        table.name(),
        column
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct TableStatus {
    pub table: Table,
    pub present: bool,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub tables_created: usize,
    pub indexes_created: usize,
    pub tables: Vec<TableStatus>,
}

impl InitReport {
    pub fn all_present(&self) -> bool {
        self.tables.iter().all(|t| t.present)
    }
}

impl fmt::Display for InitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✓ Created {} tables", self.tables_created)?;
        writeln!(f, "✓ Created {}/{} indexes", self.indexes_created, INDEXES.len())?;
        write!(f, "{}", render_table_status(&self.tables))
    }
}

pub fn render_table_status(tables: &[TableStatus]) -> String {
    let rule = "=".repeat(60);
    let mut out = format!("{}\nDATABASE VERIFICATION\n{}\n", rule, rule);
    for status in tables {
        if status.present {
            out.push_str(&format!("✓ {:40} ({} rows)\n", status.table.name(), status.rows));
        } else {
            out.push_str(&format!("✗ {:40} MISSING!\n", status.table.name()));
        }
    }
    out.push_str(&rule);
    out
}

/// Creates every table and index that does not exist yet.
pub fn initialize(db: &Database) -> Result<InitReport> {
    let (tables_created, indexes_created) = db.with_transaction(|tx| {
        for table in Table::ALL {
            tx.execute_batch(&create_table_sql(table))?;
            debug!("Created table: {}", table);
        }

        let mut indexes = 0;
        for (index, table, column) in INDEXES {
            tx.execute_batch(&create_index_sql(index, *table, column))?;
            indexes += 1;
        }
        Ok((Table::ALL.len(), indexes))
    })?;

    info!(
        "✓ Schema initialized: {} tables, {} indexes",
        tables_created, indexes_created
    );

    Ok(InitReport {
        tables_created,
        indexes_created,
        tables: verify_tables(db.conn())?,
    })
}

pub fn table_exists(conn: &Connection, table: Table) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type='table' AND name = ?1",
            [table.name()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn index_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

pub fn verify_tables(conn: &Connection) -> Result<Vec<TableStatus>> {
    let mut statuses = Vec::with_capacity(Table::ALL.len());
    for table in Table::ALL {
        let present = table_exists(conn, table)?;
        let rows = if present {
            crate::db::repo::count(conn, table)?
        } else {
            0
        };
        statuses.push(TableStatus {
            table,
            present,
            rows,
        });
    }
    Ok(statuses)
}

/// Adds `column` to `table` unless it is already there. Returns whether it was added.
pub fn ensure_column(conn: &Connection, table: Table, column: &ColumnSpec) -> Result<bool> {
    let existing = builder::table_columns(conn, table)?;
    if existing.iter().any(|c| c == column.name) {
        return Ok(false);
    }

    conn.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table.name(),
        column.name,
        column.decl
    ))?;
    info!("✓ Added column {}.{}", table, column.name);
    Ok(true)
}

/// Brings databases created before divisions existed up to date.
pub fn ensure_divisions(conn: &Connection) -> Result<bool> {
    let created = !table_exists(conn, Table::Divisions)?;
    conn.execute_batch(&create_table_sql(Table::Divisions))?;

    let division_column = col("division_id", "INTEGER REFERENCES divisions(division_id)");
    ensure_column(conn, Table::Affiliations, &division_column)?;

    for (index, table, column) in INDEXES
        .iter()
        .filter(|(_, t, c)| *t == Table::Divisions || *c == "division_id")
    {
        conn.execute_batch(&create_index_sql(index, *table, column))?;
    }

    if created {
        info!("✓ Created divisions table");
    }
    Ok(created)
}
