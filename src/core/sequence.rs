use crate::db::Database;
use crate::domain::model::ChangeReport;
use crate::utils::error::{Result, UniverseError};
use crate::utils::monitor::RunMonitor;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// Outcome of one phase in a sequence run.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub phase_name: String,
    pub succeeded: bool,
    pub report: ChangeReport,
    pub error: Option<String>,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// State shared between phases of one run.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub execution_id: String,
    pub previous_results: Vec<PhaseResult>,
}

impl PhaseContext {
    pub fn new(execution_id: String) -> Self {
        Self {
            execution_id,
            previous_results: Vec::new(),
        }
    }

    pub fn add_result(&mut self, result: PhaseResult) {
        self.previous_results.push(result);
    }

    pub fn get_result_by_name(&self, name: &str) -> Option<&PhaseResult> {
        self.previous_results.iter().find(|r| r.phase_name == name)
    }

    pub fn has_succeeded(&self, name: &str) -> bool {
        self.get_result_by_name(name)
            .map(|r| r.succeeded)
            .unwrap_or(false)
    }
}

#[async_trait(?Send)]
pub trait Phase {
    fn name(&self) -> &str;

    async fn run(&self, db: &Database, context: &PhaseContext) -> Result<ChangeReport>;

    fn should_execute(&self, _context: &PhaseContext) -> bool {
        true
    }
}

/// Runs phases in order against one database.
pub struct PhaseSequence {
    phases: Vec<Box<dyn Phase>>,
    monitor: Option<RunMonitor>,
    execution_id: String,
    continue_on_failure: bool,
}

impl PhaseSequence {
    pub fn new(execution_id: String) -> Self {
        Self {
            phases: Vec::new(),
            monitor: None,
            execution_id,
            continue_on_failure: false,
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = enabled.then(|| RunMonitor::new(true));
        self
    }

    pub fn continue_on_failure(mut self, enabled: bool) -> Self {
        self.continue_on_failure = enabled;
        self
    }

    pub fn add_phase(&mut self, phase: Box<dyn Phase>) {
        self.phases.push(phase);
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn monitor(&self) -> Option<&RunMonitor> {
        self.monitor.as_ref()
    }

    pub async fn execute_all(&self, db: &Database) -> Result<Vec<PhaseResult>> {
        let mut context = PhaseContext::new(self.execution_id.clone());
        let mut results = Vec::new();

        if let Some(monitor) = &self.monitor {
            monitor.log_phase("Sequence started");
        }

        for phase in &self.phases {
            if !phase.should_execute(&context) {
                tracing::info!("⏭️ Skipping phase: {} (dependencies not met)", phase.name());
                continue;
            }

            tracing::info!("▶️ Running phase: {}", phase.name());
            let start = Instant::now();
            let outcome = phase.run(db, &context).await;
            let duration = start.elapsed();

            let result = match outcome {
                Ok(report) => {
                    tracing::info!(
                        "✅ Phase executed: {} (records: {}, duration: {:?})",
                        phase.name(),
                        report.records_affected(),
                        duration
                    );
                    PhaseResult {
                        phase_name: phase.name().to_string(),
                        succeeded: true,
                        report,
                        error: None,
                        duration,
                    }
                }
                Err(e) => {
                    tracing::error!("❌ Phase failed: {}: {}", phase.name(), e);
                    if !self.continue_on_failure {
                        return Err(UniverseError::PhaseFailed {
                            phase: phase.name().to_string(),
                            details: e.to_string(),
                        });
                    }
                    PhaseResult {
                        phase_name: phase.name().to_string(),
                        succeeded: false,
                        report: ChangeReport::new(phase.name()),
                        error: Some(e.to_string()),
                        duration,
                    }
                }
            };

            if let Some(monitor) = &self.monitor {
                monitor.log_phase(phase.name());
            }

            context.add_result(result.clone());
            results.push(result);
        }

        if let Some(monitor) = &self.monitor {
            monitor.log_phase("Sequence completed");
        }

        Ok(results)
    }

    pub fn get_execution_summary(results: &[PhaseResult]) -> Map<String, Value> {
        let mut summary = Map::new();

        let total_records: usize = results.iter().map(|r| r.report.records_affected()).sum();
        let total_duration: Duration = results.iter().map(|r| r.duration).sum();
        let failed = results.iter().filter(|r| !r.succeeded).count();

        summary.insert("total_phases".to_string(), Value::from(results.len()));
        summary.insert("failed_phases".to_string(), Value::from(failed));
        summary.insert("total_records".to_string(), Value::from(total_records));
        summary.insert(
            "total_duration_ms".to_string(),
            Value::from(total_duration.as_millis() as u64),
        );
        summary.insert(
            "executed_phases".to_string(),
            Value::Array(
                results
                    .iter()
                    .map(|r| Value::String(r.phase_name.clone()))
                    .collect(),
            ),
        );

        summary
    }
}
