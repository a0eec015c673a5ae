pub mod sequence_config;
pub mod toml_config;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

/// Command line of the `universe-db` binary.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "universe-db")]
#[command(about = "Build, import into and explore the universe character database")]
pub struct CliConfig {
    /// SQLite database file
    #[arg(long, global = true, env = "UNIVERSE_DB")]
    pub db: Option<String>,

    /// TOML configuration file (defaults to ./universe.toml when present)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log as JSON lines")]
    pub log_json: bool,

    #[arg(short = 'y', long, global = true, help = "Answer yes to every confirmation")]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the database file and schema
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Check tables, indexes, foreign keys, defaults and constraints
    Validate,
    /// Delete every row from every table
    Reset,
    /// Run the sample data SQL script
    Seed {
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Add Nexus Enraenra and Aethos Military Group
    AddCorporations,
    /// Insert new characters from an identities JSON export
    ImportIdentities {
        path: Option<String>,
        /// Only import these names (repeatable)
        #[arg(long = "only")]
        only: Vec<String>,
        /// Only import the configured selection of main characters
        #[arg(long, conflicts_with = "only")]
        top: bool,
        /// Show what would be imported without writing
        #[arg(long)]
        preview: bool,
    },
    /// Create or update every character from an identities JSON export
    ImportRoster { path: Option<String> },
    /// Import the CMM identity CSV set
    ImportKlevels { dir: Option<String> },
    /// Import Shadow Core resonance tiers and sigils
    ImportResonance { dir: Option<String> },
    /// Reconcile names and set corporate positions
    ImportStructure { base: Option<String> },
    /// Fold Iron Sultura into Constantine Meridian Media as a division
    FixStructure,
    /// Apply the post-import character adjustments
    Adjust,
    /// Add Mitsuko Frost if she is missing
    AddMitsuko,
    /// Print every table with its columns and sample rows
    CheckSchema,
    /// Print the database explorer report
    Explore,
    /// Row counts per table
    Stats,
    #[command(subcommand)]
    Query(QueryCommand),
    /// Write every table as CSV into a zip archive
    Export { path: Option<String> },
    #[command(subcommand)]
    Add(AddCommand),
    /// Update a character, e.g. `update "Ren Kael" --set status=Missing`
    Update {
        name: String,
        #[arg(long = "set", required = true)]
        set: Vec<String>,
    },
    /// Find characters matching every `--set column=value` filter
    Search {
        #[arg(long = "set")]
        set: Vec<String>,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum QueryCommand {
    Characters,
    Locations,
    Timeline { name: Option<String> },
    Profile { name: String },
    Employees { corporation: String },
    Year { year: i64 },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum AddCommand {
    Character {
        name: String,
        #[arg(long = "set")]
        set: Vec<String>,
    },
    Corporation {
        name: String,
        #[arg(long = "set")]
        set: Vec<String>,
    },
    Location {
        name: String,
        #[arg(long = "set")]
        set: Vec<String>,
    },
    Event {
        character: String,
        year: i64,
        description: String,
        #[arg(long = "type")]
        event_type: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    Affiliation {
        character: String,
        corporation: String,
        #[arg(long = "type")]
        affiliation_type: Option<String>,
        #[arg(long = "set")]
        set: Vec<String>,
    },
}
