use crate::db::{repo, Database, Table};
use crate::domain::model::ChangeReport;
use crate::utils::error::{Result, UniverseError};
use std::path::Path;
use tracing::info;

pub const DEFAULT_SAMPLE_DATA: &str = "data/sample_data.sql";

const SAMPLED_TABLES: [Table; 3] = [Table::Locations, Table::Corporations, Table::Characters];

/// Number of characters already present, for the overwrite prompt.
pub fn existing_characters(db: &Database) -> Result<i64> {
    repo::count(db.conn(), Table::Characters)
}

/// Runs a SQL seed script in one transaction, then reports what landed.
pub async fn load_sample_data(db: &Database, script: &Path, force: bool) -> Result<ChangeReport> {
    if !script.is_file() {
        return Err(UniverseError::MissingInput {
            path: script.display().to_string(),
        });
    }

    let existing = existing_characters(db)?;
    if existing > 0 && !force {
        return Err(UniverseError::ValidationError {
            message: format!(
                "Database already contains {} characters; rerun with --force to insert anyway",
                existing
            ),
        });
    }

    let sql = tokio::fs::read_to_string(script).await?;
    info!("Inserting sample data from {}", script.display());
    db.with_transaction(|tx| Ok(tx.execute_batch(&sql)?))?;
    info!("✓ Successfully loaded and executed SQL script");

    let mut report = ChangeReport::new("Sample Data Insertion");
    for table in Table::ALL {
        let rows = repo::count(db.conn(), table)?;
        report.total(table.name(), rows);
        if rows == 0 || !SAMPLED_TABLES.contains(&table) {
            continue;
        }
        let Some(column) = table.display_column() else {
            continue;
        };
        let mut stmt = db
            .conn()
            .prepare(&format!("SELECT {} FROM {} LIMIT 3", column, table.name()))?;
        let samples = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        report.note(format!("{}: {}", table.name(), samples.join(", ")));
    }
    report.imported = usize::try_from(repo::count(db.conn(), Table::Characters)? - existing).unwrap_or(0);
    Ok(report)
}
