pub mod etl;
pub mod names;
pub mod secrets;
pub mod sequence;

pub use crate::domain::model::{ChangeReport, Fields, Record};
pub use crate::domain::ports::{ConfigProvider, Pipeline};
pub use crate::utils::error::Result;
