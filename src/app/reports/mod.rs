pub mod explore;
pub mod queries;

pub use explore::explore;
