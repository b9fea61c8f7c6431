use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::{
    kubernetes::readiness::PodReadiness, orchestrator::stage::Stage, package::ReleaseHandle,
};

/// Progress notifications emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapEvent {
    StageEntered(Stage),
    ClusterReachable {
        nodes: Vec<String>,
    },
    PrerequisitesApplied {
        count: usize,
    },
    RepositoryFallback {
        name: String,
        reason: String,
    },
    RepositoryRegistered {
        name: String,
        index_path: PathBuf,
    },
    ReleaseInstalled(ReleaseHandle),
    Settled {
        readiness: Option<PodReadiness>,
        pod_status: Option<String>,
    },
    RemediationApplied {
        job: &'static str,
    },
    CredentialRetrieved {
        secret: String,
        found: bool,
    },
    Completed {
        release: String,
    },
    Failed {
        stage: Stage,
        error: String,
    },
}

pub trait EventSink {
    fn emit(&self, event: BootstrapEvent);
}

/// Forwards every event to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: BootstrapEvent) {
        match event {
            // terminal stages are reported by Completed and Failed
            BootstrapEvent::StageEntered(stage) if stage.is_terminal() => {}
            BootstrapEvent::StageEntered(stage) => debug!("Entering stage: {stage}"),
            BootstrapEvent::ClusterReachable { nodes } => {
                info!("Cluster is reachable ({} node(s): {})", nodes.len(), nodes.join(", "))
            }
            BootstrapEvent::PrerequisitesApplied { count } => {
                info!("Applied {count} prerequisite manifest(s)")
            }
            BootstrapEvent::RepositoryFallback { name, reason } => {
                warn!("Repository '{name}' was fetched through the HTTP fallback ({reason})")
            }
            BootstrapEvent::RepositoryRegistered { name, index_path } => {
                info!("Repository '{name}' is ready, index cached at {index_path:?}")
            }
            BootstrapEvent::ReleaseInstalled(release) => info!("Installed release {release}"),
            BootstrapEvent::Settled {
                readiness,
                pod_status,
            } => {
                match readiness {
                    Some(readiness) => info!("Release settled: {readiness}"),
                    None => info!("Release settle delay elapsed"),
                }

                if let Some(pod_status) = pod_status {
                    info!("Pod status:\n{pod_status}");
                }
            }
            BootstrapEvent::RemediationApplied { job } => info!("Applied the {job} job"),
            BootstrapEvent::CredentialRetrieved { secret, found } => match found {
                true => info!("Retrieved the generated credential from secret '{secret}'"),
                false => warn!("Couldn't retrieve the credential from secret '{secret}'"),
            },
            BootstrapEvent::Completed { release } => info!("Bootstrap of '{release}' finished"),
            BootstrapEvent::Failed { stage, error } => error!("Stage '{stage}' failed: {error}"),
        }
    }
}
