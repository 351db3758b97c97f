use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use kube::ResourceExt;

/// Label the Job controller stamps on every pod it creates.
pub const JOB_NAME_LABEL: &str = "job-name";

/// Annotation naming the container `kubectl logs` picks by default.
pub const DEFAULT_CONTAINER_ANNOTATION: &str = "kubectl.kubernetes.io/default-container";

/// Label selector matching the pods owned by `job_name`.
pub fn job_pod_selector(job_name: &str) -> String {
    format!("{}={}", JOB_NAME_LABEL, job_name)
}

/// Snapshot of a Job as seen in one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRecord {
    pub name: String,
    pub namespace: String,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub succeeded: i32,
    pub failed: i32,
    pub active: i32,
}

impl JobRecord {
    /// Wall-clock run time, when the Job has both started and completed.
    pub fn run_duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

impl From<&Job> for JobRecord {
    fn from(job: &Job) -> Self {
        let status = job.status.as_ref();
        Self {
            name: job.name_any(),
            namespace: job.namespace().unwrap_or_default(),
            created_at: job.metadata.creation_timestamp.as_ref().map(|t| t.0),
            started_at: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
            completed_at: status.and_then(|s| s.completion_time.as_ref()).map(|t| t.0),
            succeeded: status.and_then(|s| s.succeeded).unwrap_or(0),
            failed: status.and_then(|s| s.failed).unwrap_or(0),
            active: status.and_then(|s| s.active).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerTermination {
    pub container: String,
    pub exit_code: i32,
    pub reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ContainerTermination {
    fn from_status(status: &ContainerStatus) -> Option<Self> {
        let terminated = status.state.as_ref()?.terminated.as_ref()?;
        Some(Self {
            container: status.name.clone(),
            exit_code: terminated.exit_code,
            reason: terminated.reason.clone(),
            started_at: terminated.started_at.as_ref().map(|t| t.0),
            finished_at: terminated.finished_at.as_ref().map(|t| t.0),
        })
    }
}

/// A pod belonging to a Job. The owner is known only through its label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub job_name: Option<String>,
    pub phase: Option<String>,
    /// Container whose logs represent the pod.
    pub primary_container: Option<String>,
    pub terminations: Vec<ContainerTermination>,
}

impl From<&Pod> for PodRecord {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        Self {
            name: pod.name_any(),
            namespace: pod.namespace().unwrap_or_default(),
            job_name: pod.labels().get(JOB_NAME_LABEL).cloned(),
            phase: status.and_then(|s| s.phase.clone()),
            primary_container: primary_container(pod),
            terminations: status
                .and_then(|s| s.container_statuses.as_ref())
                .map(|statuses| {
                    statuses
                        .iter()
                        .filter_map(ContainerTermination::from_status)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn primary_container(pod: &Pod) -> Option<String> {
    pod.annotations()
        .get(DEFAULT_CONTAINER_ANNOTATION)
        .filter(|name| !name.is_empty())
        .cloned()
        .or_else(|| {
            pod.spec
                .as_ref()
                .and_then(|spec| spec.containers.first())
                .map(|container| container.name.clone())
        })
}
