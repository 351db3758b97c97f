use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::{
    config::ReconcilerConfig,
    controllers::policy::{CleanupDecision, Thresholds},
    kubernetes::{job_pod_selector, ClusterApi, DeleteOutcome, JobRecord},
    Error, Result,
};

/// What one pass over the cluster did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationSummary {
    pub observed: usize,
    pub kept: usize,
    pub deleted: usize,
    pub already_gone: usize,
    pub logs_captured: usize,
    pub delete_failures: usize,
}

impl IterationSummary {
    pub fn is_clean(&self) -> bool {
        self.delete_failures == 0
    }
}

/// Polls every Job in the cluster and deletes the ones past their thresholds.
///
/// Nothing is carried between iterations; each one starts from a fresh listing.
pub struct CleanupController {
    api: Arc<dyn ClusterApi>,
    thresholds: Thresholds,
    capture_logs: bool,
    poll_interval: Duration,
    max_consecutive_failures: u32,
}

impl CleanupController {
    pub fn new(api: Arc<dyn ClusterApi>, config: &ReconcilerConfig) -> Self {
        Self {
            api,
            thresholds: Thresholds::from(config),
            capture_logs: config.capture_logs,
            poll_interval: config.poll_interval(),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }

    /// Override the sleep between iterations.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs until `max_consecutive_failures` iterations in a row have failed.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting Job cleanup controller (succeeded threshold: {}, failed threshold: {}, capture logs: {}, poll interval: {:?})",
            self.thresholds.succeeded, self.thresholds.failed, self.capture_logs, self.poll_interval
        );

        let mut consecutive_failures = 0u32;
        loop {
            match self.reconcile_once().await {
                Ok(summary) if summary.is_clean() => {
                    consecutive_failures = 0;
                    debug!("Iteration complete: {:?}", summary);
                }
                Ok(summary) => {
                    consecutive_failures += 1;
                    error!(
                        "Iteration finished with {} failed deletion(s) ({}/{} consecutive failures)",
                        summary.delete_failures, consecutive_failures, self.max_consecutive_failures
                    );
                }
                Err(e) => {
                    consecutive_failures += 1;
                    error!(
                        "Iteration aborted: {} ({}/{} consecutive failures)",
                        e, consecutive_failures, self.max_consecutive_failures
                    );
                }
            }

            if consecutive_failures >= self.max_consecutive_failures {
                return Err(Error::TooManyFailures(consecutive_failures));
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One poll-classify-act pass. Only a failed listing aborts the pass; a failed
    /// deletion is logged, counted and the remaining Jobs are still processed.
    pub async fn reconcile_once(&self) -> Result<IterationSummary> {
        let jobs = self.api.list_jobs().await?;
        let mut summary = IterationSummary::default();

        for job in &jobs {
            summary.observed += 1;
            let decision = self.thresholds.evaluate(job);
            info!(
                "job: {}/{}, succeeded: {}, failed: {}, active: {}, decision: {}",
                job.namespace, job.name, job.succeeded, job.failed, job.active, decision
            );

            if !decision.should_cleanup() {
                summary.kept += 1;
                continue;
            }

            if self.capture_logs && self.capture_job_logs(job).await {
                summary.logs_captured += 1;
            }

            match self.delete_job(job, decision).await {
                Ok(DeleteOutcome::Deleted) => summary.deleted += 1,
                Ok(DeleteOutcome::AlreadyGone) => summary.already_gone += 1,
                Err(e) => {
                    error!("Failed to delete job {}/{}: {}", job.namespace, job.name, e);
                    summary.delete_failures += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn delete_job(
        &self,
        job: &JobRecord,
        decision: CleanupDecision,
    ) -> Result<DeleteOutcome> {
        info!("Deleting job {}/{} ({})", job.namespace, job.name, decision.reason());
        let outcome = self.api.delete_job(&job.name, &job.namespace).await?;

        match outcome {
            DeleteOutcome::Deleted => match job.run_duration() {
                Some(took) => info!(
                    "Deleted job {}/{} (ran for {}s)",
                    job.namespace,
                    job.name,
                    took.num_seconds()
                ),
                None => info!("Deleted job {}/{}", job.namespace, job.name),
            },
            DeleteOutcome::AlreadyGone => info!(
                "Job {}/{} was already deleted by someone else",
                job.namespace, job.name
            ),
        }

        Ok(outcome)
    }

    /// Best effort: every failure here is logged and swallowed so deletion still happens.
    async fn capture_job_logs(&self, job: &JobRecord) -> bool {
        let selector = job_pod_selector(&job.name);
        let pods = match self.api.list_pods(&selector, &job.namespace).await {
            Ok(pods) => pods,
            Err(e) => {
                warn!("Could not list pods for job {}/{}: {}", job.namespace, job.name, e);
                return false;
            }
        };

        let Some(pod) = pods.first() else {
            warn!("No pods left for job {}/{}, deleting without logs", job.namespace, job.name);
            return false;
        };

        for termination in &pod.terminations {
            info!(
                "pod {}/{} container {} exited with code {} ({})",
                job.namespace,
                pod.name,
                termination.container,
                termination.exit_code,
                termination.reason.as_deref().unwrap_or("unknown")
            );
        }

        let container = pod.primary_container.clone();
        match self
            .api
            .get_logs(&pod.name, &job.namespace, container.clone())
            .await
        {
            Ok(logs) => {
                info!(
                    "Logs for job {}/{} from pod {} (container {}):\n{}",
                    job.namespace,
                    job.name,
                    pod.name,
                    container.as_deref().unwrap_or("default"),
                    logs
                );
                true
            }
            Err(e) => {
                warn!("Could not fetch logs for pod {}/{}: {}", job.namespace, pod.name, e);
                false
            }
        }
    }
}
