//! Snapshot export: one CSV per table plus a manifest, zipped.

use crate::db::{builder, Database, Table};
use crate::utils::error::{Result, UniverseError};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub exported_at: String,
    pub database: Option<String>,
    pub tables: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub bytes: usize,
    pub manifest: Manifest,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✓ Exported snapshot to {} ({} bytes)", self.path.display(), self.bytes)?;
        for (table, rows) in &self.manifest.tables {
            writeln!(f, "  {:40} {} rows", table, rows)?;
        }
        write!(f, "  Exported at {}", self.manifest.exported_at)
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders a whole table as CSV, header row included. Returns the bytes and row count.
pub fn table_csv(db: &Database, table: Table) -> Result<(Vec<u8>, usize)> {
    let columns = builder::table_columns(db.conn(), table)?;
    let rows = builder::query_maps(
        db.conn(),
        &format!("SELECT * FROM {} ORDER BY {}", table.name(), table.id_column()),
        [],
    )?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for row in &rows {
        writer.write_record(columns.iter().map(|c| cell(row.get(c).unwrap_or(&Value::Null))))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| UniverseError::ProcessingError {
            message: format!("Failed to flush CSV for {}: {}", table.name(), e),
        })?;
    Ok((bytes, rows.len()))
}

pub async fn export_snapshot(db: &Database, output: &Path) -> Result<ExportSummary> {
    let mut manifest = Manifest {
        exported_at: Utc::now().to_rfc3339(),
        database: db.path().map(|p| p.display().to_string()),
        tables: serde_json::Map::new(),
    };

    let zip_data = {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        for table in Table::ALL {
            let (csv, rows) = table_csv(db, table)?;
            zip.start_file::<_, ()>(format!("{}.csv", table.name()), FileOptions::default())?;
            zip.write_all(&csv)?;
            manifest.tables.insert(table.name().to_string(), Value::from(rows));
            tracing::debug!("Exported {} rows from {}", rows, table.name());
        }

        zip.start_file::<_, ()>(MANIFEST_FILE, FileOptions::default())?;
        zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

        let cursor = zip.finish()?;
        cursor.into_inner()
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, &zip_data).await?;
    tracing::info!("Wrote snapshot ({} bytes) to {}", zip_data.len(), output.display());

    Ok(ExportSummary {
        path: output.to_path_buf(),
        bytes: zip_data.len(),
        manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{repo, schema};
    use crate::domain::model::Fields;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_export_writes_every_table_and_manifest() {
        let dir = TempDir::new().unwrap();
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        repo::add_character(db.conn(), "Reika Frost", &Fields::new().with("faction", "Shadow Core"))
            .unwrap();

        let output = dir.path().join("out").join("snapshot.zip");
        let summary = export_snapshot(&db, &output).await.unwrap();
        assert_eq!(summary.manifest.tables["characters"], Value::from(1));

        let file = std::fs::File::open(&output).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), Table::ALL.len() + 1);

        let mut characters = String::new();
        archive
            .by_name("characters.csv")
            .unwrap()
            .read_to_string(&mut characters)
            .unwrap();
        let mut lines = characters.lines();
        assert!(lines.next().unwrap().starts_with("character_id,character_name"));
        assert!(lines.next().unwrap().starts_with("1,Reika Frost,"));

        let mut manifest = String::new();
        archive
            .by_name(MANIFEST_FILE)
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        let manifest: Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(manifest["tables"]["locations"], Value::from(0));
    }
}
