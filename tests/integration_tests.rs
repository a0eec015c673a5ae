use std::path::{Path, PathBuf};
use tempfile::TempDir;
use universe_db::app::importers::IdentityImporter;
use universe_db::app::{export, fixes};
use universe_db::db::{maintenance, repo, schema, Table};
use universe_db::domain::canon::{Canon, NEXUS_ENRAENRA};
use universe_db::{Database, EtlEngine, UniverseError};

fn sample_script() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data/sample_data.sql")
}

const IDENTITIES: &str = r##"{
  "summary": {"total_identities": 3, "by_faction": {"Shadow Core": 2}},
  "identities": [
    {"id": "kage_ishigawa", "name": "kage_ishigawa", "codename": "Nightjar",
     "faction": "Shadow Core", "role": "Infiltrator", "aliases": ["Kage", "The Quiet"],
     "tags": ["stealth"], "colors": {"primary": "#101820", "accent": "#c0c0c0"},
     "security": {"klevel": "03", "verified_by": "Reika Frost"}},
    {"id": "reika_frost", "name": "Reika Frost", "faction": "Shadow Core"},
    {"id": "ghost", "name": "", "faction": "Unknown"}
  ]
}"##;

#[tokio::test]
async fn test_master_import_on_file_database() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("universe.db");
    let json_path = dir.path().join("identities.json");
    std::fs::write(&json_path, IDENTITIES).unwrap();

    let db = Database::create(&db_path, false).unwrap();
    let init = schema::initialize(&db).unwrap();
    assert!(init.all_present());
    assert!(db.foreign_keys_enabled().unwrap());

    let seeded = fixes::load_sample_data(&db, &sample_script(), false).await.unwrap();
    assert_eq!(seeded.imported, 4);

    fixes::add_corporations(&db).unwrap();
    assert_eq!(repo::count(db.conn(), Table::Corporations).unwrap(), 3);

    let report = EtlEngine::new(IdentityImporter::new(&json_path, Canon::default()))
        .run(&db)
        .await
        .unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 2);

    let kage = repo::get_character(db.conn(), "Kage Ishigawa").unwrap().unwrap();
    assert_eq!(repo::text(&kage, "codename"), Some("Nightjar"));
    assert_eq!(repo::text(&kage, "aliases"), Some("Kage, The Quiet"));
    assert_eq!(repo::text(&kage, "status"), Some("Active"));

    let operatives = repo::get_corporation_employees(db.conn(), NEXUS_ENRAENRA, true).unwrap();
    let affiliation = operatives
        .iter()
        .find(|row| repo::text(row, "character_name") == Some("Kage Ishigawa"))
        .unwrap();
    assert_eq!(repo::text(affiliation, "affiliation_type"), Some("Operative"));
    assert_eq!(repo::text(affiliation, "clearance_level"), Some("K-Level 03"));

    fixes::apply_adjustments(&db).unwrap();
    let ren = repo::get_character(db.conn(), "Ren Kael").unwrap().unwrap();
    assert_eq!(repo::text(&ren, "faction"), Some("Iron Sultura"));

    fixes::add_mitsuko_frost(&db).unwrap();
    assert!(repo::character_id(db.conn(), "Mitsuko Frost").unwrap().is_some());
    assert_eq!(repo::count(db.conn(), Table::Characters).unwrap(), 6);

    drop(db);
    let reopened = Database::open_existing(&db_path).unwrap();
    let validation = maintenance::validate_schema(&reopened).unwrap();
    assert!(validation.passed(), "{}", validation);
}

#[tokio::test]
async fn test_sample_data_refuses_populated_database() {
    let dir = TempDir::new().unwrap();
    let db = Database::create(dir.path().join("universe.db"), false).unwrap();
    schema::initialize(&db).unwrap();

    fixes::load_sample_data(&db, &sample_script(), false).await.unwrap();
    let err = fixes::load_sample_data(&db, &sample_script(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, UniverseError::ValidationError { .. }));
    assert_eq!(repo::count(db.conn(), Table::Characters).unwrap(), 4);
}

#[test]
fn test_create_refuses_existing_file_without_force() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("universe.db");
    let db = Database::create(&path, false).unwrap();
    schema::initialize(&db).unwrap();
    drop(db);

    assert!(matches!(
        Database::create(&path, false),
        Err(UniverseError::DatabaseExists { .. })
    ));
    assert!(Database::create(&path, true).is_ok());
    assert!(matches!(
        Database::open_existing(dir.path().join("missing.db")),
        Err(UniverseError::MissingInput { .. })
    ));
}

#[tokio::test]
async fn test_reset_then_export_snapshot() {
    let dir = TempDir::new().unwrap();
    let db = Database::create(dir.path().join("universe.db"), false).unwrap();
    schema::initialize(&db).unwrap();
    fixes::load_sample_data(&db, &sample_script(), false).await.unwrap();

    let output = dir.path().join("exports").join("snapshot.zip");
    let summary = export::export_snapshot(&db, &output).await.unwrap();
    assert!(output.is_file());
    assert_eq!(summary.manifest.tables["characters"], serde_json::json!(4));

    let cleared = maintenance::reset(&db).unwrap();
    assert!(!cleared.was_empty());
    assert_eq!(repo::count(db.conn(), Table::Characters).unwrap(), 0);
    assert_eq!(repo::count(db.conn(), Table::Locations).unwrap(), 0);
}
