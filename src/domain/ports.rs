use crate::db::Database;
use crate::domain::canon::Canon;
use crate::domain::model::ChangeReport;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait ConfigProvider {
    fn database_path(&self) -> &str;
    fn canon(&self) -> &Canon;
    fn assume_yes(&self) -> bool;
}

/// An import: read its inputs, stage typed rows, then write them in one transaction.
#[async_trait(?Send)]
pub trait Pipeline {
    type Source;
    type Staged;

    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Self::Source>;
    fn transform(&self, source: Self::Source) -> Result<Self::Staged>;
    fn load(&self, db: &Database, staged: Self::Staged) -> Result<ChangeReport>;
}
