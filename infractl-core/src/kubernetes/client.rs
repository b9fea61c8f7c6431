use std::path::Path;

use kube::{
    config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError},
    Client, Config,
};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("Couldn't load kubeconfig! Reason: {}", .0)]
    Kubeconfig(KubeconfigError),
    #[error("Couldn't load in-cluster configuration! Reason: {}", .0)]
    InCluster(InClusterError),
    #[error("Couldn't initialize k8s API client! Reason: {}", .0)]
    Client(kube::Error),
}

/// Builds the client configuration from the given kubeconfig file,
/// or from the in-cluster environment when no path is given.
pub async fn build_client_config(kubeconfig_path: Option<&Path>) -> Result<Config, ClientConfigError> {
    match kubeconfig_path {
        Some(path) => {
            debug!("Using kubeconfig: {path:?}");

            let kubeconfig = Kubeconfig::read_from(path).map_err(ClientConfigError::Kubeconfig)?;
            let config =
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(ClientConfigError::Kubeconfig)?;

            debug!("Loaded kubeconfig, server: {}", config.cluster_url);

            Ok(config)
        }
        None => {
            debug!("No kubeconfig given, using in-cluster configuration...");

            Config::incluster().map_err(ClientConfigError::InCluster)
        }
    }
}

pub async fn create_client(kubeconfig_path: Option<&Path>) -> Result<Client, ClientConfigError> {
    let config = build_client_config(kubeconfig_path).await?;

    Client::try_from(config).map_err(ClientConfigError::Client)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{build_client_config, ClientConfigError};

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: default
  cluster:
    server: https://127.0.0.1:6443
    insecure-skip-tls-verify: true
contexts:
- name: default
  context:
    cluster: default
    user: default
current-context: default
users:
- name: default
  user:
    token: not-a-real-token
"#;

    #[tokio::test]
    async fn builds_config_from_kubeconfig_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k3s.yaml");
        fs::write(&path, KUBECONFIG).unwrap();

        let config = build_client_config(Some(&path)).await.unwrap();

        assert_eq!(config.cluster_url.host(), Some("127.0.0.1"));
        assert_eq!(config.cluster_url.port_u16(), Some(6443));
    }

    #[tokio::test]
    async fn missing_kubeconfig_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_client_config(Some(&dir.path().join("missing.yaml"))).await;

        assert!(matches!(result, Err(ClientConfigError::Kubeconfig(_))));
    }
}
