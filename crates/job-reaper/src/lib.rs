pub mod config;
pub mod controllers;
pub mod kubernetes;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes error: {0}")]
    Kubernetes(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Request timed out after {timeout:?}: {operation}")]
    Timeout { operation: String, timeout: Duration },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Giving up after {0} consecutive failed iterations")]
    TooManyFailures(u32),
}

impl Error {
    /// Failures talking to the control plane, as opposed to local misconfiguration.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Kubernetes(_) | Error::Timeout { .. })
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        Error::Kubernetes(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
