pub mod app;
pub mod config;
pub mod core;
pub mod db;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::Settings, CliConfig};

pub use config::{sequence_config::SequenceConfig, toml_config::UniverseConfig};
pub use core::{etl::EtlEngine, sequence::PhaseSequence};
pub use db::Database;
pub use domain::model::{ChangeReport, Fields};
pub use utils::error::{Result, UniverseError};
