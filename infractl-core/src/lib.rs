pub mod config;
pub mod error;
pub mod events;
pub mod helpers;
pub mod kubernetes;
pub mod orchestrator;
pub mod package;
pub mod remediation;
pub mod repository;
pub mod secret;
pub mod services;
pub mod snapshot;
pub mod validation;
pub mod values;

pub const APP_NAME: &str = "infractl";

pub const DEFAULT_NAMESPACE: &str = "infra";
pub const DEFAULT_KUBECONFIG_PATH: &str = "/etc/rancher/k3s/k3s.yaml";
