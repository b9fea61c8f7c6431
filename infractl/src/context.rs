use std::{path::PathBuf, time::Duration};

use infractl_core::{
    events::LogEventSink,
    kubernetes::kubectl::{KubectlCommand, KubectlGateway},
    orchestrator::Orchestrator,
    package::{helm::HelmCli, locate::ChartLocator, PackageInstaller},
    repository::{
        getter::{HttpGetter, TransportGetters},
        paths::HelmPaths,
        RepositoryResolver,
    },
};
use log::debug;

use crate::cli::GlobalArgs;

pub type CliOrchestrator = Orchestrator<
    KubectlGateway,
    HelmCli<TransportGetters>,
    TransportGetters,
    HttpGetter,
    LogEventSink,
>;

/// Everything a command needs to reach the cluster and the chart repositories.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub namespace: String,
    pub kubeconfig: Option<PathBuf>,
    pub kubectl: KubectlCommand,
    pub helm: Option<PathBuf>,
    pub paths: HelmPaths,
    pub install_timeout: Duration,
}

impl CommandContext {
    pub fn new(global_args: &GlobalArgs) -> Self {
        let kubectl = match &global_args.kubectl {
            Some(path) => KubectlCommand::from_path(path.to_owned()),
            None => KubectlCommand::locate(),
        };
        let paths = HelmPaths::resolve(
            global_args.repository_config.as_deref(),
            global_args.repository_cache.as_deref(),
        );

        debug!("Using kubectl: {:?}", kubectl.program());
        debug!(
            "Using repository config {:?} and cache {:?}",
            paths.repository_config, paths.repository_cache
        );

        Self {
            namespace: global_args.namespace.to_owned(),
            kubeconfig: global_args.kubeconfig(),
            kubectl,
            helm: global_args.helm.to_owned(),
            paths,
            install_timeout: Duration::from_secs(global_args.install_timeout),
        }
    }

    pub fn create_resolver(&self) -> RepositoryResolver {
        RepositoryResolver::new(self.paths.to_owned())
    }

    pub fn create_orchestrator(&self) -> CliOrchestrator {
        let gateway = KubectlGateway::new(self.kubectl.to_owned(), self.kubeconfig.to_owned());
        let helm = HelmCli::new(
            self.helm.to_owned(),
            self.kubeconfig.to_owned(),
            ChartLocator::new(self.paths.to_owned()),
        );

        Orchestrator::new(
            gateway,
            self.create_resolver(),
            PackageInstaller::new(helm),
            LogEventSink,
        )
        .with_install_timeout(self.install_timeout)
    }
}
