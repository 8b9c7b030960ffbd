//! Suite execution logic.
//!
//! Drives one [`TestSequence`] step by step: pseudo-clusters are
//! consulted before the transport adapter, each decoded response
//! goes through the validator, and save-as writes are committed to
//! the runtime store before the next step materializes. The
//! engine itself never retries or times out; a failed step is
//! reported and the `stop_on_failure` policy decides whether the
//! rest of the suite still runs.

use crate::adapter::{DeviceAdapter, PseudoCluster};
use crate::sequence::TestSequence;
use crate::step::Step;
use crate::validator::{self, CheckEntry, CheckStatus};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

/// How one step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of one executed (or skipped) step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub label: String,
    pub status: StepStatus,
    pub entries: Vec<CheckEntry>,
    pub duration_ms: u64,
}

/// Serializable result of running a whole suite.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    pub name: String,
    pub success: bool,
    pub steps: Vec<StepOutcome>,
    pub duration_ms: u64,
}

impl SuiteResult {
    pub fn passed(&self) -> usize {
        self.count(StepStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(StepStatus::Skipped)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

/// Executes test sequences against an adapter and a set of
/// pseudo-cluster handlers.
pub struct SuiteRunner {
    adapter: Arc<dyn DeviceAdapter>,
    pseudo_clusters: Vec<Arc<dyn PseudoCluster>>,
    stop_on_failure: bool,
}

impl SuiteRunner {
    pub fn new(adapter: Arc<dyn DeviceAdapter>) -> Self {
        Self {
            adapter,
            pseudo_clusters: Vec::new(),
            stop_on_failure: true,
        }
    }

    /// Register the built-in delay and log pseudo-clusters.
    pub fn with_default_pseudo_clusters(mut self) -> Self {
        self.pseudo_clusters
            .push(Arc::new(crate::adapter::DelayCommands));
        self.pseudo_clusters
            .push(Arc::new(crate::adapter::LogCommands));
        self
    }

    pub fn with_pseudo_cluster(mut self, cluster: Arc<dyn PseudoCluster>) -> Self {
        self.pseudo_clusters.push(cluster);
        self
    }

    pub fn continue_on_failure(mut self, yes: bool) -> Self {
        self.stop_on_failure = !yes;
        self
    }

    fn pseudo_cluster_for(&self, step: &Step) -> Option<&Arc<dyn PseudoCluster>> {
        let cluster = step.cluster.as_deref()?;
        self.pseudo_clusters
            .iter()
            .find(|handler| handler.name() == cluster)
    }

    /// Execute one suite from start to finish.
    #[instrument(skip(self, sequence), fields(name = %sequence.name))]
    pub async fn run(&self, sequence: &TestSequence) -> Result<SuiteResult> {
        let start_time = Instant::now();
        let total = sequence.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut success = true;
        let mut run = sequence.start();

        info!("Starting test suite: {}", sequence.name);

        let mut index = 0;
        while let Some(step) = run.next_step() {
            index += 1;
            let step =
                step.with_context(|| format!("failed to materialize step {index}/{total}"))?;

            if step.disabled {
                debug!("Skipping disabled step: {}", step.label);
                outcomes.push(StepOutcome {
                    label: step.label,
                    status: StepStatus::Skipped,
                    entries: Vec::new(),
                    duration_ms: 0,
                });
                continue;
            }

            info!("Running step {}/{}: {}", index, total, step.label);
            let step_start = Instant::now();

            let response = match self.pseudo_cluster_for(&step) {
                Some(handler) => handler
                    .execute(&step)
                    .await
                    .with_context(|| format!("pseudo cluster failed in step '{}'", step.label))?,
                None => self
                    .adapter
                    .dispatch(&step)
                    .await
                    .with_context(|| format!("adapter failed in step '{}'", step.label))?,
            };

            if let Some(ms) = step.busy_wait_ms {
                debug!("Busy-waiting {} ms after step '{}'", ms, step.label);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }

            let result = validator::validate_response(&step, &response, run.variables_mut())
                .with_context(|| format!("validation misconfigured in step '{}'", step.label))?;

            for entry in result.entries() {
                match entry.status {
                    CheckStatus::Error => {
                        error!("[{}] {}: {}", step.label, entry.category, entry.message)
                    }
                    _ => debug!("[{}] {}: {}", step.label, entry.category, entry.message),
                }
            }

            let failed = result.is_failure();
            outcomes.push(StepOutcome {
                label: step.label,
                status: if failed {
                    StepStatus::Failed
                } else {
                    StepStatus::Passed
                },
                entries: result.entries().to_vec(),
                duration_ms: step_start.elapsed().as_millis() as u64,
            });

            if failed {
                success = false;
                if self.stop_on_failure {
                    info!("Stopping suite due to step failure");
                    break;
                }
            }
        }

        let result = SuiteResult {
            name: sequence.name.clone(),
            success,
            steps: outcomes,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Test suite finished: {} ({} ms) - Success: {}",
            result.name, result.duration_ms, result.success
        );

        Ok(result)
    }
}
