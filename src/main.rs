use clap::Parser;
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use universe_db::app::importers::{
    CmmKlevelImporter, CorporateStructureImporter, IdentityImporter, ResonanceImporter,
    RosterImporter,
};
use universe_db::app::{export, fixes, reports, reports::queries};
use universe_db::config::{AddCommand, Command, QueryCommand};
use universe_db::db::{maintenance, repo, schema};
use universe_db::domain::ports::ConfigProvider;
use universe_db::utils::error::ErrorSeverity;
use universe_db::utils::logger;
use universe_db::{CliConfig, Database, EtlEngine, Fields, Result, Settings, UniverseError};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let settings = match Settings::resolve(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    logger::init_logger(settings.verbose, settings.log_json);
    tracing::debug!("Settings: {:?}", settings);

    if let Err(e) = run(cli.command, &settings).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

/// Asks before a destructive step; `--yes` answers for the user.
fn confirm(settings: &Settings, prompt: &str) -> Result<()> {
    if settings.assume_yes() {
        return Ok(());
    }
    let accepted = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| UniverseError::ProcessingError {
            message: format!("Confirmation prompt failed: {}", e),
        })?;
    if accepted {
        Ok(())
    } else {
        Err(UniverseError::Cancelled)
    }
}

fn open(settings: &Settings) -> Result<Database> {
    Database::open_existing(settings.database_path())
}

fn assignments(set: &[String]) -> Result<Fields> {
    Fields::from_assignments(set).ok_or_else(|| UniverseError::ValidationError {
        message: "Expected column=value pairs".to_string(),
    })
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn input_or(arg: Option<String>, fallback: &str) -> PathBuf {
    PathBuf::from(arg.unwrap_or_else(|| fallback.to_string()))
}

async fn run(command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Init { force } => {
            let path = Path::new(settings.database_path());
            let mut force = force;
            if path.exists() && !force {
                confirm(settings, &format!("{} exists. Delete and recreate it?", path.display()))?;
                force = true;
            }
            let db = Database::create(path, force)?;
            let report = schema::initialize(&db)?;
            println!("{}", report);
            println!("✅ Database initialized at {}", path.display());
        }
        Command::Validate => {
            let report = maintenance::validate_schema(&open(settings)?)?;
            println!("{}", report);
            if !report.passed() {
                return Err(UniverseError::ValidationError {
                    message: format!("{} schema check(s) failed", report.errors.len()),
                });
            }
        }
        Command::Reset => {
            let db = open(settings)?;
            confirm(settings, "Delete ALL data from every table?")?;
            println!("{}", maintenance::reset(&db)?);
        }
        Command::Seed { file, force } => {
            let db = open(settings)?;
            let script = input_or(file, &settings.sample_data);
            let existing = fixes::sample_data::existing_characters(&db)?;
            let mut force = force;
            if existing > 0 && !force {
                confirm(
                    settings,
                    &format!("Database already has {} characters. Load sample data anyway?", existing),
                )?;
                force = true;
            }
            println!("{}", fixes::load_sample_data(&db, &script, force).await?);
        }
        Command::AddCorporations => println!("{}", fixes::add_corporations(&open(settings)?)?),
        Command::ImportIdentities {
            path,
            only,
            top,
            preview,
        } => {
            let db = open(settings)?;
            let path = input_or(path, &settings.import.identities);
            let selection = if top {
                Some(settings.canon.selected_characters.clone())
            } else if !only.is_empty() {
                Some(only)
            } else {
                None
            };
            let importer = |preview: bool| {
                let importer = IdentityImporter::new(&path, settings.canon.clone())
                    .with_preview(preview);
                match &selection {
                    Some(names) => importer.with_selection(names.clone()),
                    None => importer,
                }
            };

            if preview || !settings.assume_yes() {
                println!("{}", EtlEngine::new(importer(true)).run(&db).await?);
                if preview {
                    return Ok(());
                }
                confirm(settings, "Proceed with import?")?;
            }
            println!("{}", EtlEngine::new(importer(false)).run(&db).await?);
        }
        Command::ImportRoster { path } => {
            let importer = RosterImporter::new(input_or(path, &settings.import.identities));
            println!("{}", EtlEngine::new(importer).run(&open(settings)?).await?);
        }
        Command::ImportKlevels { dir } => {
            let importer = CmmKlevelImporter::new(input_or(dir, &settings.import.cmm_dir));
            println!("{}", EtlEngine::new(importer).run(&open(settings)?).await?);
        }
        Command::ImportResonance { dir } => {
            let importer = ResonanceImporter::new(input_or(dir, &settings.import.resonance_dir));
            println!("{}", EtlEngine::new(importer).run(&open(settings)?).await?);
        }
        Command::ImportStructure { base } => {
            let importer = CorporateStructureImporter::new(
                input_or(base, &settings.import.structure_dir),
                settings.canon.clone(),
            );
            println!("{}", EtlEngine::new(importer).run(&open(settings)?).await?);
        }
        Command::FixStructure => {
            println!("{}", fixes::fix_corporate_structure(&open(settings)?)?)
        }
        Command::Adjust => println!("{}", fixes::apply_adjustments(&open(settings)?)?),
        Command::AddMitsuko => println!("{}", fixes::add_mitsuko_frost(&open(settings)?)?),
        Command::CheckSchema => println!("{}", maintenance::check_schema(&open(settings)?)?),
        Command::Explore => println!("{}", reports::explore(&open(settings)?)?),
        Command::Stats => {
            let db = open(settings)?;
            println!("📊 Database Statistics:");
            for (table, rows) in repo::get_database_stats(db.conn())? {
                println!("  {:<20} {}", table.name(), rows);
            }
        }
        Command::Query(query) => {
            let db = open(settings)?;
            let lines = match query {
                QueryCommand::Characters => queries::all_characters(&db)?,
                QueryCommand::Locations => queries::location_hierarchy(&db)?,
                QueryCommand::Timeline { name } => queries::timeline(&db, name.as_deref())?,
                QueryCommand::Profile { name } => queries::full_profile(&db, &name)?,
                QueryCommand::Employees { corporation } => {
                    queries::corporation_employees(&db, &corporation)?
                }
                QueryCommand::Year { year } => queries::events_in_year(&db, year)?,
            };
            print_lines(lines);
        }
        Command::Export { path } => {
            let db = open(settings)?;
            let output = input_or(path, &settings.import.export_path);
            println!("{}", export::export_snapshot(&db, &output).await?);
        }
        Command::Add(add) => add_entity(&open(settings)?, add)?,
        Command::Update { name, set } => {
            let db = open(settings)?;
            if !repo::update_character(db.conn(), &name, &assignments(&set)?)? {
                return Err(UniverseError::not_found("character", &name));
            }
            println!("✅ Updated {}", name);
        }
        Command::Search { set } => {
            let db = open(settings)?;
            let rows = repo::search_characters(db.conn(), &assignments(&set)?)?;
            println!("🔍 {} match(es)", rows.len());
            for row in rows {
                println!(
                    "  • {} | {} | {}",
                    repo::text(&row, "character_name").unwrap_or_default(),
                    repo::text(&row, "faction").unwrap_or("-"),
                    repo::text(&row, "status").unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

fn add_entity(db: &Database, command: AddCommand) -> Result<()> {
    let conn = db.conn();
    let (kind, name, id) = match command {
        AddCommand::Character { name, set } => {
            let id = repo::add_character(conn, &name, &assignments(&set)?)?;
            ("character", name, id)
        }
        AddCommand::Corporation { name, set } => {
            let id = repo::add_corporation(conn, &name, &assignments(&set)?)?;
            ("corporation", name, id)
        }
        AddCommand::Location { name, set } => {
            let id = repo::add_location(conn, &name, &assignments(&set)?)?;
            ("location", name, id)
        }
        AddCommand::Event {
            character,
            year,
            description,
            event_type,
            date,
            location,
        } => {
            let id = repo::add_event(
                conn,
                &repo::NewEvent {
                    character_name: &character,
                    event_year: year,
                    description: &description,
                    event_type: event_type.as_deref(),
                    event_date: date.as_deref(),
                    location_name: location.as_deref(),
                },
            )?;
            ("event", format!("{} ({})", character, year), id)
        }
        AddCommand::Affiliation {
            character,
            corporation,
            affiliation_type,
            set,
        } => {
            let id = repo::add_affiliation(
                conn,
                &character,
                &corporation,
                affiliation_type.as_deref(),
                &assignments(&set)?,
            )?;
            ("affiliation", format!("{} → {}", character, corporation), id)
        }
    };
    println!("✅ Added {} {} (id {})", kind, name, id);
    Ok(())
}
