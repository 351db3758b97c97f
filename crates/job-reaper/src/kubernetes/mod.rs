//! Typed access to the control plane.
//!
//! The reconciler only ever talks to the cluster through [`ClusterApi`], so it can be
//! driven by [`KubeClusterApi`] in production and by fakes in tests.

pub mod client;
pub mod resources;

pub use client::KubeClusterApi;
pub use resources::{
    job_pod_selector, ContainerTermination, JobRecord, PodRecord, DEFAULT_CONTAINER_ANNOTATION,
    JOB_NAME_LABEL,
};

use async_trait::async_trait;

use crate::Result;

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Someone else removed the Job first. Counts as success.
    AlreadyGone,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Every Job in every namespace.
    async fn list_jobs(&self) -> Result<Vec<JobRecord>>;

    /// Pods matching `selector`; an empty `namespace` searches all namespaces.
    async fn list_pods(&self, selector: &str, namespace: &str) -> Result<Vec<PodRecord>>;

    /// Current log content of one container; `None` leaves the choice to the API server,
    /// which only works for single-container pods.
    async fn get_logs(
        &self,
        pod_name: &str,
        namespace: &str,
        container: Option<String>,
    ) -> Result<String>;

    async fn delete_job(&self, job_name: &str, namespace: &str) -> Result<DeleteOutcome>;
}
