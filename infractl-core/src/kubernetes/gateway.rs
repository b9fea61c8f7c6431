use std::time::Duration;

use thiserror::Error;

use super::{client::ClientConfigError, readiness::PodReadiness};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Couldn't run '{}'! Reason: {}", .command, .error)]
    Spawn {
        command: String,
        error: std::io::Error,
    },
    #[error("'{}' failed ({}): {}", .command, .status, .stderr)]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("'{}' returned no output!", .0)]
    EmptyOutput(String),
    #[error("Couldn't write the temporary manifest! Reason: {}", .0)]
    TempFile(std::io::Error),
    #[error("Kubernetes API error: {}", .0)]
    KubeApi(kube::Error),
    #[error("{}", .0)]
    ClientConfig(ClientConfigError),
    #[error("Kubernetes API client is unavailable!")]
    ClientUnavailable,
}

/// Operations the bootstrap pipeline performs against the control plane.
#[allow(async_fn_in_trait)]
pub trait ClusterGateway {
    /// Returns the names of the cluster's nodes, failing when none could be listed.
    async fn check_connectivity(&self) -> Result<Vec<String>, GatewayError>;

    /// Creates the namespace, an already existing one isn't an error.
    async fn ensure_namespace(&self, name: &str);

    async fn apply_manifest(&self, manifest: &str) -> Result<(), GatewayError>;

    async fn pod_status(&self, namespace: &str, release_name: &str) -> Result<String, GatewayError>;

    /// Returns the field's value as stored in the cluster, i.e. base64 encoded.
    async fn secret_field(
        &self,
        name: &str,
        namespace: &str,
        field: &str,
    ) -> Result<String, GatewayError>;

    async fn wait_for_release_pods(
        &self,
        namespace: &str,
        release_name: &str,
        timeout: Duration,
    ) -> Result<PodReadiness, GatewayError>;
}
