use crate::domain::model::Record;
use crate::utils::error::{Result, UniverseError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

fn require_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(UniverseError::MissingInput {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Reads a headed CSV file into records of string values.
pub async fn read_csv_records(path: &Path) -> Result<Vec<Record>> {
    require_file(path)?;
    let bytes = tokio::fs::read(path).await?;
    let records = parse_csv(&bytes)?;
    debug!("Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

pub fn parse_csv(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = Record::default();
        for (header, value) in headers.iter().zip(row.iter()) {
            record
                .data
                .insert(header.to_string(), Value::String(value.to_string()));
        }
        records.push(record);
    }
    Ok(records)
}

pub async fn read_json_document(path: &Path) -> Result<Value> {
    require_file(path)?;
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Deserializes a record into a typed row.
pub fn typed<T: DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(record.into_value())?)
}

pub fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_csv_tolerates_short_rows() {
        let records = parse_csv(b"id,name,notes\nren_kael,Ren Kael\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("name"), Some("Ren Kael"));
        assert_eq!(records[0].get_str("notes"), None);
    }

    #[tokio::test]
    async fn test_missing_csv_is_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = read_csv_records(&dir.path().join("identities.csv"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, UniverseError::MissingInput { .. }));
    }

    #[test]
    fn test_first_existing() {
        let dir = TempDir::new().unwrap();
        let second = dir.path().join("b.csv");
        std::fs::write(&second, "Name,Corp\n").unwrap();

        let found = first_existing(&[dir.path().join("a.csv"), second.clone()]);
        assert_eq!(found, Some(second));
        assert_eq!(first_existing(&[dir.path().join("c.csv")]), None);
    }
}
