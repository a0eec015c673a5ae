use crate::db::Database;
use crate::domain::model::ChangeReport;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use tracing::info;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self, db: &Database) -> Result<ChangeReport> {
        let name = self.pipeline.name();
        info!("🚀 Starting {}", name);

        info!("📥 Extracting...");
        let source = self.pipeline.extract().await?;

        info!("🔄 Transforming...");
        let staged = self.pipeline.transform(source)?;

        info!("💾 Loading...");
        let report = self.pipeline.load(db, staged)?;

        info!(
            "✅ {} finished: {} imported, {} updated, {} skipped, {} errors",
            name,
            report.imported,
            report.updated,
            report.skipped,
            report.errors.len()
        );
        Ok(report)
    }
}
