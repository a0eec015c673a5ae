pub mod adjustments;
pub mod corporations;
pub mod sample_data;
pub mod structure;

pub use adjustments::{add_mitsuko_frost, apply_adjustments};
pub use corporations::add_corporations;
pub use sample_data::load_sample_data;
pub use structure::fix_corporate_structure;
