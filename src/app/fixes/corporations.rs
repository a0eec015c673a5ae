//! Seeds the corporations the imports place characters into.

use crate::db::{builder, repo, Database, Table};
use crate::domain::canon::{AETHOS_MILITARY_GROUP, NEXUS_ENRAENRA};
use crate::domain::model::{ChangeReport, Fields};
use crate::utils::error::Result;
use tracing::info;

pub const HEADQUARTERS: &str = "Tokyo";

fn corporation_rows(headquarters: Option<i64>) -> Vec<Fields> {
    vec![
        Fields::new()
            .with("corp_name", NEXUS_ENRAENRA)
            .with("legal_name", "Nexus Enraenra Corporation")
            .with("industry", "Technology")
            .with("sector", "Advanced Defense Systems")
            .with("net_worth_range", "$200B-$300B")
            .with("is_public", 0)
            .with("headquarters_location_id", headquarters)
            .with(
                "mission_statement",
                "Pioneering next-generation defense and intelligence solutions",
            )
            .with("public_reputation", "Elite Defense Contractor")
            .with(
                "secret_agenda",
                "Operating Shadow Core as covert reaction force beneath corporate facade",
            )
            .with("status", "Active"),
        Fields::new()
            .with("corp_name", AETHOS_MILITARY_GROUP)
            .with("legal_name", "Aethos Military Group Ltd.")
            .with("industry", "Military")
            .with("sector", "Private Military Contractor")
            .with("net_worth_range", "$50B-$100B")
            .with("is_public", 0)
            .with("headquarters_location_id", headquarters)
            .with(
                "mission_statement",
                "Providing elite tactical and security solutions worldwide",
            )
            .with("public_reputation", "Secretive PMC")
            .with(
                "secret_agenda",
                "Subsidiary force operating under Nexus Enraenra umbrella",
            )
            .with("status", "Active"),
    ]
}

/// Adds Nexus Enraenra and Aethos Military Group unless they already exist.
pub fn add_corporations(db: &Database) -> Result<ChangeReport> {
    let mut report = ChangeReport::new("Adding Missing Corporations");

    db.with_transaction(|tx| {
        let headquarters = repo::location_id(tx, HEADQUARTERS)?;
        for row in corporation_rows(headquarters) {
            let name = row
                .get("corp_name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if repo::corporation_id(tx, &name)?.is_some() {
                info!("  ⚠ {} already exists", name);
                report.note(format!("⚠ {} already exists", name));
                report.skipped += 1;
                continue;
            }
            builder::insert(tx, Table::Corporations, &row)?;
            info!("  ✓ Added: {}", name);
            report.note(format!("✓ Added: {}", name));
            report.imported += 1;
        }
        Ok(())
    })?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use serde_json::Value;

    #[test]
    fn test_add_corporations_is_idempotent() {
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        let tokyo = repo::add_location(db.conn(), HEADQUARTERS, &Fields::new()).unwrap();

        let first = add_corporations(&db).unwrap();
        assert_eq!(first.imported, 2);

        let second = add_corporations(&db).unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 2);

        let rows = builder::select_where(
            db.conn(),
            Table::Corporations,
            &Fields::new().with("corp_name", NEXUS_ENRAENRA),
            None,
        )
        .unwrap();
        assert_eq!(rows[0]["headquarters_location_id"], Value::from(tokyo));
        assert_eq!(rows[0]["net_worth_range"], Value::from("$200B-$300B"));
    }

    #[test]
    fn test_missing_headquarters_is_null() {
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        add_corporations(&db).unwrap();

        let rows = builder::select_where(
            db.conn(),
            Table::Corporations,
            &Fields::new().with("corp_name", AETHOS_MILITARY_GROUP),
            None,
        )
        .unwrap();
        assert_eq!(rows[0]["headquarters_location_id"], Value::Null);
    }
}
