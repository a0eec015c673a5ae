pub mod export;
pub mod fixes;
pub mod importers;
pub mod phases;
pub mod reports;
