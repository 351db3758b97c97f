use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, DeleteParams, ListParams, LogParams},
    Client,
};
use secrecy::SecretString;
use tracing::debug;

use super::{ClusterApi, DeleteOutcome, JobRecord, PodRecord};
use crate::{config::KubeConfig, Error, Result};

/// [`ClusterApi`] backed by the Kubernetes API server.
pub struct KubeClusterApi {
    client: Client,
    request_timeout: Duration,
}

impl KubeClusterApi {
    pub fn new(config: &KubeConfig) -> Result<Self> {
        let cluster_url = config.cluster_url();
        let uri = cluster_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid cluster url {}: {}", cluster_url, e)))?;

        let mut kube_config = kube::Config::new(uri);
        kube_config.accept_invalid_certs = config.insecure_skip_tls_verify;
        kube_config.auth_info.token = Some(SecretString::new(config.token.clone()));

        let client = Client::try_from(kube_config)?;

        Ok(Self::from_client(client, config.request_timeout()))
    }

    pub fn from_client(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    async fn bounded<T, F>(&self, operation: String, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout {
                operation,
                timeout: self.request_timeout,
            }),
        }
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let jobs: Api<Job> = Api::all(self.client.clone());
        let list = self
            .bounded("list jobs".to_string(), jobs.list(&ListParams::default()))
            .await?;

        Ok(list.items.iter().map(JobRecord::from).collect())
    }

    async fn list_pods(&self, selector: &str, namespace: &str) -> Result<Vec<PodRecord>> {
        let pods: Api<Pod> = if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        };
        let params = ListParams::default().labels(selector);
        let list = self
            .bounded(format!("list pods {}", selector), pods.list(&params))
            .await?;

        Ok(list.items.iter().map(PodRecord::from).collect())
    }

    async fn get_logs(
        &self,
        pod_name: &str,
        namespace: &str,
        container: Option<String>,
    ) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container,
            ..LogParams::default()
        };
        self.bounded(
            format!("logs {}/{}", namespace, pod_name),
            pods.logs(pod_name, &params),
        )
        .await
    }

    async fn delete_job(&self, job_name: &str, namespace: &str) -> Result<DeleteOutcome> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let operation = format!("delete job {}/{}", namespace, job_name);

        // Background propagation removes the Job's pods along with it.
        let params = DeleteParams::background();
        let call = jobs.delete(job_name, &params);
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(_)) => Ok(DeleteOutcome::Deleted),
            Ok(Err(e)) if is_not_found(&e) => {
                debug!("Job {}/{} was already gone", namespace, job_name);
                Ok(DeleteOutcome::AlreadyGone)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(Error::Timeout {
                operation,
                timeout: self.request_timeout,
            }),
        }
    }
}
