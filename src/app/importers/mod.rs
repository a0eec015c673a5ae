pub mod cmm_klevels;
pub mod corporate_structure;
pub mod identities;
pub mod resonance;
pub mod roster;
pub mod sources;

pub use cmm_klevels::CmmKlevelImporter;
pub use corporate_structure::CorporateStructureImporter;
pub use identities::IdentityImporter;
pub use resonance::ResonanceImporter;
pub use roster::RosterImporter;
