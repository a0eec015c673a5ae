use clap::Parser;
use dialoguer::Confirm;
use serde_json::{Map, Value};
use std::collections::HashSet;
use universe_db::app::phases::ConfiguredPhase;
use universe_db::config::sequence_config::{PhaseDefinition, SequenceConfig};
use universe_db::core::sequence::{PhaseResult, PhaseSequence};
use universe_db::utils::error::ErrorSeverity;
use universe_db::utils::logger;
use universe_db::utils::validation::Validate;
use universe_db::{Database, Result, UniverseError};

#[derive(Parser)]
#[command(name = "phase-runner")]
#[command(about = "Run a configured sequence of import and fix phases")]
struct Args {
    /// Path to phase sequence configuration file
    #[arg(short, long, default_value = "configs/phase4.toml")]
    config: String,

    /// SQLite database file
    #[arg(long, env = "UNIVERSE_DB", default_value = "universe.db")]
    db: String,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    log_json: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Show the execution plan without running anything
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    execution_id: Option<String>,

    /// Run only these phases (comma-separated)
    #[arg(long)]
    only: Option<String>,

    /// Skip these phases (comma-separated)
    #[arg(long)]
    skip: Option<String>,

    /// Start without asking for confirmation
    #[arg(short = 'y', long)]
    yes: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_logger(args.verbose, args.log_json);

    if let Err(e) = run(&args).await {
        tracing::error!("❌ Phase sequence failed: {}", e);
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

async fn run(args: &Args) -> Result<()> {
    tracing::info!("📁 Loading sequence configuration from: {}", args.config);
    let config = SequenceConfig::from_file(&args.config)?;
    config.validate()?;
    tracing::info!("✅ Sequence configuration loaded and validated");

    let execution_id = args
        .execution_id
        .clone()
        .unwrap_or_else(|| format!("run_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")));

    display_sequence_summary(&config, args, &execution_id);

    let phases = determine_phases_to_execute(&config, args);
    if args.dry_run {
        perform_dry_run(&phases);
        return Ok(());
    }

    if !args.yes {
        let start = Confirm::new()
            .with_prompt(format!("Run {} phase(s) against {}?", phases.len(), args.db))
            .default(true)
            .interact()
            .map_err(|e| UniverseError::ProcessingError {
                message: format!("Confirmation prompt failed: {}", e),
            })?;
        if !start {
            return Err(UniverseError::Cancelled);
        }
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    let canon = config.canon.clone().unwrap_or_default();
    let scheduled: Vec<String> = phases.iter().map(|p| p.name.clone()).collect();

    let mut sequence = PhaseSequence::new(execution_id.clone())
        .with_monitoring(monitor_enabled)
        .continue_on_failure(config.continue_on_failure());
    for definition in phases {
        tracing::info!("📦 Setting up phase: {} ({})", definition.name, definition.kind);
        sequence.add_phase(Box::new(
            ConfiguredPhase::new(definition.clone(), canon.clone()).gate_on(&scheduled),
        ));
    }

    let db = Database::open(&args.db)?;
    let results = sequence.execute_all(&db).await?;

    display_execution_results(&results, &execution_id);
    if let Some(metrics_file) = config.metrics_file() {
        export_execution_metrics(&results, &execution_id, metrics_file).await?;
    }

    let failed = results.iter().filter(|r| !r.succeeded).count();
    if failed > 0 {
        println!("⚠️ Sequence finished with {} failed phase(s)", failed);
    } else {
        println!("✅ Phase sequence completed successfully!");
    }
    println!("🆔 Execution ID: {}", execution_id);
    Ok(())
}

fn display_sequence_summary(config: &SequenceConfig, args: &Args, execution_id: &str) {
    println!("📋 Phase Sequence Summary:");
    println!(
        "  Name: {} v{}",
        config.sequence.name,
        config.sequence.version.as_deref().unwrap_or("-")
    );
    if let Some(description) = &config.sequence.description {
        println!("  Description: {}", description);
    }
    println!("  Execution ID: {}", execution_id);
    println!("  Database: {}", args.db);
    println!("  Total Phases: {}", config.phases.len());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    if let Some(only) = &args.only {
        println!("  🎯 Only executing: {}", only);
    }
    if let Some(skip) = &args.skip {
        println!("  ⏭️ Skipping: {}", skip);
    }

    println!();
    println!("📝 Execution Order:");
    for (index, name) in config.sequence.execution_order.iter().enumerate() {
        if let Some(phase) = config.get_phase(name) {
            let status = if phase.is_enabled() { "✅" } else { "⏸️" };
            println!(
                "  {}. {} {} - {}",
                index + 1,
                status,
                name,
                phase.description.as_deref().unwrap_or("No description")
            );
            if !phase.dependencies().is_empty() {
                println!("     Dependencies: {}", phase.dependencies().join(", "));
            }
        }
    }
    println!();
}

fn name_list(list: &Option<String>) -> Option<HashSet<&str>> {
    list.as_deref()
        .map(|names| names.split(',').map(|s| s.trim()).collect())
}

fn determine_phases_to_execute<'a>(
    config: &'a SequenceConfig,
    args: &Args,
) -> Vec<&'a PhaseDefinition> {
    let mut phases = config.get_enabled_phases();

    if let Some(only) = name_list(&args.only) {
        phases.retain(|p| only.contains(p.name.as_str()));
    }
    if let Some(skip) = name_list(&args.skip) {
        phases.retain(|p| !skip.contains(p.name.as_str()));
    }

    phases
}

fn perform_dry_run(phases: &[&PhaseDefinition]) {
    println!("🔍 Dry Run Analysis:");
    println!();

    for (index, phase) in phases.iter().enumerate() {
        println!("📦 Phase {}: {} [{}]", index + 1, phase.name, phase.kind);
        if let Some(input) = &phase.input {
            println!("  📂 Input: {}", input);
        }
        if let Some(selected) = &phase.selected {
            println!("  🎯 Selected: {}", selected.join(", "));
        }
        if phase.force.unwrap_or(false) {
            println!("  ⚠️ Force enabled");
        }
        if !phase.dependencies().is_empty() {
            println!("  🔗 Dependencies: {}", phase.dependencies().join(", "));
        }
        println!();
    }

    println!("📊 Total phases to execute: {}", phases.len());
    println!("✅ Dry run analysis complete.");
}

fn display_execution_results(results: &[PhaseResult], execution_id: &str) {
    println!();
    println!("📊 Execution Results Summary:");
    println!("  Execution ID: {}", execution_id);
    println!("  Completed Phases: {}", results.len());

    let total_records: usize = results.iter().map(|r| r.report.records_affected()).sum();
    let total_duration: std::time::Duration = results.iter().map(|r| r.duration).sum();
    println!("  Total Records Affected: {}", total_records);
    println!("  Total Execution Time: {:?}", total_duration);
    println!();

    for result in results {
        match &result.error {
            None => println!("{}", result.report),
            Some(error) => println!("❌ {} failed: {}", result.phase_name, error),
        }
        println!();
    }
}

async fn export_execution_metrics(
    results: &[PhaseResult],
    execution_id: &str,
    metrics_file: &str,
) -> Result<()> {
    let mut metrics = Map::new();
    metrics.insert("execution_id".to_string(), Value::from(execution_id));
    metrics.insert(
        "timestamp".to_string(),
        Value::from(chrono::Utc::now().to_rfc3339()),
    );
    metrics.insert(
        "summary".to_string(),
        Value::Object(PhaseSequence::get_execution_summary(results)),
    );

    let phases: Vec<Value> = results
        .iter()
        .map(|result| {
            serde_json::json!({
                "name": result.phase_name,
                "succeeded": result.succeeded,
                "imported": result.report.imported,
                "updated": result.report.updated,
                "skipped": result.report.skipped,
                "errors": result.report.errors.len(),
                "duration_ms": result.duration.as_millis() as u64,
            })
        })
        .collect();
    metrics.insert("phases".to_string(), Value::Array(phases));

    let metrics_json = serde_json::to_string_pretty(&Value::Object(metrics))?;
    tokio::fs::write(metrics_file, metrics_json).await?;

    tracing::info!("📊 Execution metrics exported to: {}", metrics_file);
    println!("📊 Metrics exported to: {}", metrics_file);
    Ok(())
}
