use std::time::Duration;

use log::{debug, info};
use tokio::time::sleep;

use crate::{
    config::{BootstrapConfig, Credential},
    error::BootstrapError,
    events::{BootstrapEvent, EventSink},
    kubernetes::{readiness::PodReadiness, ClusterGateway},
    package::{
        InstallRequestBuilder, PackageError, PackageInstaller, PackageManager, ReleaseHandle,
        DEFAULT_INSTALL_TIMEOUT,
    },
    remediation::{apply_remediation, ManifestError},
    repository::{getter::IndexGetter, RepositoryRegistration, RepositoryResolver},
    secret::fetch_decoded_secret_field,
    services::TargetService,
};

use self::stage::{Stage, StageError};

pub mod stage;

pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// How long to wait for a fresh release before moving on.
///
/// The readiness poll is advisory, when it can't run the fixed delay is slept instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub poll_timeout: Duration,
    pub fallback_delay: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_READINESS_TIMEOUT,
            fallback_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub service: &'static str,
    pub release: ReleaseHandle,
    pub repository: RepositoryRegistration,
    pub readiness: Option<PodReadiness>,
    /// `None` when the service has no generated credential or it couldn't be read.
    pub credential: Option<Credential>,
    pub follow_up: Vec<String>,
}

/// Sequences a bootstrap run, stopping at the first fatal error.
pub struct Orchestrator<G, M, D, F, E> {
    gateway: G,
    resolver: RepositoryResolver<D, F>,
    installer: PackageInstaller<M>,
    events: E,
    settle: SettlePolicy,
    install_timeout: Duration,
}

impl<G, M, D, F, E> Orchestrator<G, M, D, F, E>
where
    G: ClusterGateway,
    M: PackageManager,
    D: IndexGetter,
    F: IndexGetter,
    E: EventSink,
{
    pub fn new(
        gateway: G,
        resolver: RepositoryResolver<D, F>,
        installer: PackageInstaller<M>,
        events: E,
    ) -> Self {
        Self {
            gateway,
            resolver,
            installer,
            events,
            settle: SettlePolicy::default(),
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }

    pub fn with_settle_policy(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn run(
        &self,
        config: &BootstrapConfig,
        service: &impl TargetService,
    ) -> Result<BootstrapReport, StageError> {
        let result = self.run_stages(config, service).await;

        match &result {
            Ok(report) => {
                self.enter(Stage::Done);
                self.events.emit(BootstrapEvent::Completed {
                    release: report.release.name.to_owned(),
                });
            }
            Err(error) => {
                self.events.emit(BootstrapEvent::Failed {
                    stage: error.stage,
                    error: error.error.to_string(),
                });
                self.enter(Stage::Failed);
            }
        }

        result
    }

    async fn run_stages(
        &self,
        config: &BootstrapConfig,
        service: &impl TargetService,
    ) -> Result<BootstrapReport, StageError> {
        self.enter(Stage::Validating);
        let network = config
            .validate()
            .and_then(|network| service.validate(config).map(|_| network))
            .map_err(|error| {
                StageError::new(Stage::Validating, BootstrapError::InputValidation(error))
            })?;

        debug!(
            "Bootstrapping {} in '{}' for {} (network {network})",
            service.name(),
            config.namespace,
            config.base_identifier()
        );

        self.enter(Stage::ConnectingCluster);
        let nodes = self.gateway.check_connectivity().await.map_err(|error| {
            StageError::new(Stage::ConnectingCluster, BootstrapError::Connectivity(error))
        })?;
        self.events.emit(BootstrapEvent::ClusterReachable { nodes });

        self.enter(Stage::EnsuringNamespace);
        self.gateway.ensure_namespace(&config.namespace).await;
        self.apply_prerequisites(config, service)
            .await
            .map_err(|error| {
                StageError::new(Stage::EnsuringNamespace, BootstrapError::ManifestApply(error))
            })?;

        self.enter(Stage::ResolvingRepository);
        let repository = self
            .resolver
            .add_repository(&config.repository.name, &config.repository.url)
            .await
            .map_err(|error| {
                StageError::new(
                    Stage::ResolvingRepository,
                    BootstrapError::RepositoryResolution(error),
                )
            })?;

        if let Some(reason) = &repository.fallback_reason {
            self.events.emit(BootstrapEvent::RepositoryFallback {
                name: repository.entry.name.to_owned(),
                reason: reason.to_owned(),
            });
        }
        self.events.emit(BootstrapEvent::RepositoryRegistered {
            name: repository.entry.name.to_owned(),
            index_path: repository.index_path.to_owned(),
        });

        self.enter(Stage::Installing);
        let release = self.install(config, service).await.map_err(|error| {
            StageError::new(Stage::Installing, BootstrapError::PackageInstall(error))
        })?;
        self.events.emit(BootstrapEvent::ReleaseInstalled(release.clone()));

        let readiness = self.settle(&release).await;

        self.enter(Stage::PostInstalling);
        if let Some(job) = service.remediation(config) {
            apply_remediation(&self.gateway, &job)
                .await
                .map_err(|error| {
                    StageError::new(Stage::PostInstalling, BootstrapError::ManifestApply(error))
                })?;
            self.events
                .emit(BootstrapEvent::RemediationApplied { job: job.name });
        }

        self.enter(Stage::RetrievingCredential);
        let credential = self.retrieve_credential(config, service).await;

        Ok(BootstrapReport {
            service: service.name(),
            release,
            repository,
            readiness,
            credential,
            follow_up: service.follow_up(config),
        })
    }

    fn enter(&self, stage: Stage) {
        self.events.emit(BootstrapEvent::StageEntered(stage));
    }

    async fn apply_prerequisites(
        &self,
        config: &BootstrapConfig,
        service: &impl TargetService,
    ) -> Result<(), ManifestError> {
        let manifests = service.prerequisites(config)?;

        if manifests.is_empty() {
            return Ok(());
        }

        for manifest in &manifests {
            self.gateway
                .apply_manifest(manifest)
                .await
                .map_err(|error| ManifestError::Apply("prerequisite", error))?;
        }

        self.events.emit(BootstrapEvent::PrerequisitesApplied {
            count: manifests.len(),
        });

        Ok(())
    }

    async fn install(
        &self,
        config: &BootstrapConfig,
        service: &impl TargetService,
    ) -> Result<ReleaseHandle, PackageError> {
        let values = service.build_values(config).map_err(PackageError::Values)?;
        let request = InstallRequestBuilder::default()
            .release_name(config.release_name.as_str())
            .chart(config.repository.chart_reference())
            .namespace(config.namespace.as_str())
            .timeout(self.install_timeout)
            .build()
            .map_err(|error| PackageError::InvalidRequest(error.to_string()))?;

        self.installer.install(&request, &values).await
    }

    async fn settle(&self, release: &ReleaseHandle) -> Option<PodReadiness> {
        let readiness = match self
            .gateway
            .wait_for_release_pods(&release.namespace, &release.name, self.settle.poll_timeout)
            .await
        {
            Ok(readiness) => Some(readiness),
            Err(error) => {
                debug!(
                    "Readiness poll unavailable ({error}), waiting {}s instead...",
                    self.settle.fallback_delay.as_secs()
                );
                sleep(self.settle.fallback_delay).await;
                None
            }
        };

        let pod_status = match self.gateway.pod_status(&release.namespace, &release.name).await {
            Ok(status) => Some(status),
            Err(error) => {
                debug!("Couldn't read the pod status: {error}");
                None
            }
        };

        self.events.emit(BootstrapEvent::Settled {
            readiness,
            pod_status,
        });

        readiness
    }

    async fn retrieve_credential(
        &self,
        config: &BootstrapConfig,
        service: &impl TargetService,
    ) -> Option<Credential> {
        let secret = service.credential_secret(config)?;
        let value =
            fetch_decoded_secret_field(&self.gateway, &secret.name, &config.namespace, secret.field)
                .await;

        self.events.emit(BootstrapEvent::CredentialRetrieved {
            secret: secret.name,
            found: !value.is_empty(),
        });

        if value.is_empty() {
            info!("The credential can be read later with the follow-up instructions");
            return None;
        }

        Some(Credential::new(value))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::RefCell, collections::BTreeMap, time::Duration};

    use super::{Orchestrator, SettlePolicy};
    use crate::{
        config::{tests::sample_config, RepositorySource},
        error::BootstrapError,
        events::{tests::RecordingSink, BootstrapEvent},
        kubernetes::{
            kubectl::{KubectlCommand, KubectlGateway},
            readiness::PodReadiness,
            ClusterGateway, GatewayError,
        },
        orchestrator::stage::Stage,
        package::{tests::FakePackageManager, PackageError, PackageInstaller},
        repository::{
            getter::{GetterError, IndexGetter},
            index::tests::SAMPLE_INDEX,
            paths::HelmPaths,
            RepositoryResolver,
        },
        services::{GitLabService, OpenLdapService},
        validation::ValidationError,
    };

    /// In-memory control plane, secrets are stored base64 encoded like the real thing.
    #[derive(Default)]
    pub(crate) struct FakeGateway {
        pub applied: RefCell<Vec<String>>,
        pub namespaces: RefCell<Vec<String>>,
        pub secrets: BTreeMap<(String, String), String>,
        pub readiness: Option<PodReadiness>,
        pub unreachable: bool,
        pub reject_manifests: bool,
    }

    impl FakeGateway {
        pub(crate) fn with_secret(mut self, name: &str, field: &str, encoded: &str) -> Self {
            self.secrets
                .insert((name.to_owned(), field.to_owned()), encoded.to_owned());
            self
        }

        fn failure(command: &str) -> GatewayError {
            GatewayError::CommandFailed {
                command: command.to_owned(),
                status: "exit status: 1".to_owned(),
                stderr: "Error from server".to_owned(),
            }
        }
    }

    impl ClusterGateway for FakeGateway {
        async fn check_connectivity(&self) -> Result<Vec<String>, GatewayError> {
            match self.unreachable {
                true => Err(Self::failure("kubectl get nodes")),
                false => Ok(vec!["node/armani".to_owned()]),
            }
        }

        async fn ensure_namespace(&self, name: &str) {
            self.namespaces.borrow_mut().push(name.to_owned());
        }

        async fn apply_manifest(&self, manifest: &str) -> Result<(), GatewayError> {
            if self.reject_manifests {
                return Err(Self::failure("kubectl apply"));
            }

            self.applied.borrow_mut().push(manifest.to_owned());
            Ok(())
        }

        async fn pod_status(
            &self,
            _namespace: &str,
            release_name: &str,
        ) -> Result<String, GatewayError> {
            Ok(format!("{release_name}-0   1/1   Running   0   1m"))
        }

        async fn secret_field(
            &self,
            name: &str,
            _namespace: &str,
            field: &str,
        ) -> Result<String, GatewayError> {
            self.secrets
                .get(&(name.to_owned(), field.to_owned()))
                .cloned()
                .ok_or_else(|| Self::failure("kubectl get secret"))
        }

        async fn wait_for_release_pods(
            &self,
            _namespace: &str,
            _release_name: &str,
            _timeout: Duration,
        ) -> Result<PodReadiness, GatewayError> {
            self.readiness.ok_or(GatewayError::ClientUnavailable)
        }
    }

    struct StaticIndex;

    impl IndexGetter for StaticIndex {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, GetterError> {
            Ok(SAMPLE_INDEX.as_bytes().to_vec())
        }
    }

    type TestOrchestrator<'a> =
        Orchestrator<FakeGateway, FakePackageManager, StaticIndex, StaticIndex, &'a RecordingSink>;

    fn orchestrator<'a>(
        dir: &tempfile::TempDir,
        gateway: FakeGateway,
        events: &'a RecordingSink,
    ) -> TestOrchestrator<'a> {
        let paths = HelmPaths::new(
            dir.path().join("repositories.yaml"),
            dir.path().join("repository"),
        );

        Orchestrator::new(
            gateway,
            RepositoryResolver::with_getters(paths, StaticIndex, StaticIndex),
            PackageInstaller::new(FakePackageManager::default()),
            events,
        )
        .with_settle_policy(SettlePolicy {
            poll_timeout: Duration::from_secs(1),
            fallback_delay: Duration::ZERO,
        })
    }

    fn stages(events: &RecordingSink) -> Vec<Stage> {
        events
            .events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                BootstrapEvent::StageEntered(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn openldap_run_walks_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let events = RecordingSink::default();
        let gateway =
            FakeGateway::default().with_secret("ldap", "LDAP_ADMIN_PASSWORD", "UzNjcmV0IQ==");
        let orchestrator = orchestrator(&dir, gateway, &events);

        let report = orchestrator
            .run(&sample_config(), &OpenLdapService)
            .await
            .unwrap();

        assert_eq!(
            stages(&events),
            [
                Stage::Validating,
                Stage::ConnectingCluster,
                Stage::EnsuringNamespace,
                Stage::ResolvingRepository,
                Stage::Installing,
                Stage::PostInstalling,
                Stage::RetrievingCredential,
                Stage::Done,
            ]
        );
        assert_eq!(report.release.name, "ldap");
        assert_eq!(report.credential.unwrap().expose(), "S3cret!");
        assert!(!report.follow_up.is_empty());
        assert!(!report.repository.used_fallback());
        assert!(dir.path().join("repository/helm-openldap-index.yaml").exists());

        let gateway = orchestrator.gateway();
        assert_eq!(*gateway.namespaces.borrow(), ["infra"]);

        let applied = gateway.applied.borrow();
        assert_eq!(applied.len(), 1);
        assert!(applied[0].contains("ldap-memberof-setup"));
        assert!(applied[0].contains("dc=armani,dc=lab"));
    }

    #[tokio::test]
    async fn missing_credential_still_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let events = RecordingSink::default();
        let orchestrator = orchestrator(&dir, FakeGateway::default(), &events);

        let report = orchestrator
            .run(&sample_config(), &OpenLdapService)
            .await
            .unwrap();

        assert!(report.credential.is_none());
        assert_eq!(stages(&events).last(), Some(&Stage::Done));
        assert!(events.events.borrow().contains(&BootstrapEvent::CredentialRetrieved {
            secret: "ldap".to_owned(),
            found: false,
        }));
    }

    #[tokio::test]
    async fn second_install_stops_at_installing() {
        let dir = tempfile::tempdir().unwrap();
        let events = RecordingSink::default();
        let orchestrator = orchestrator(&dir, FakeGateway::default(), &events);

        orchestrator
            .run(&sample_config(), &OpenLdapService)
            .await
            .unwrap();
        events.events.borrow_mut().clear();

        let error = orchestrator
            .run(&sample_config(), &OpenLdapService)
            .await
            .unwrap_err();

        assert_eq!(error.stage, Stage::Installing);
        assert!(matches!(
            error.error,
            BootstrapError::PackageInstall(PackageError::ReleaseExists(_))
        ));
        let stages = stages(&events);
        assert_eq!(&stages[stages.len() - 2..], [Stage::Installing, Stage::Failed]);
        assert!(!stages.contains(&Stage::PostInstalling));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let events = RecordingSink::default();
        let orchestrator = orchestrator(&dir, FakeGateway::default(), &events);

        let mut config = sample_config();
        config.network_block = "8.8.8.0/24".to_owned();

        let error = orchestrator
            .run(&config, &OpenLdapService)
            .await
            .unwrap_err();

        assert_eq!(error.stage, Stage::Validating);
        assert!(matches!(
            error.error,
            BootstrapError::InputValidation(ValidationError::NotPrivate(_))
        ));
        assert_eq!(stages(&events), [Stage::Validating, Stage::Failed]);
        assert!(orchestrator.gateway().namespaces.borrow().is_empty());
    }

    #[tokio::test]
    async fn unreachable_cluster_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let events = RecordingSink::default();
        let gateway = FakeGateway {
            unreachable: true,
            ..Default::default()
        };
        let orchestrator = orchestrator(&dir, gateway, &events);

        let error = orchestrator
            .run(&sample_config(), &OpenLdapService)
            .await
            .unwrap_err();

        assert_eq!(error.stage, Stage::ConnectingCluster);
        assert!(matches!(error.error, BootstrapError::Connectivity(_)));
    }

    #[tokio::test]
    async fn unreadable_kubeconfig_stops_at_cluster_connection() {
        let dir = tempfile::tempdir().unwrap();
        let kubeconfig = dir.path().join("k3s.yaml");
        std::fs::write(&kubeconfig, "\u{0}garbage: [").unwrap();

        let events = RecordingSink::default();
        let gateway = KubectlGateway::new(
            KubectlCommand::from_path(dir.path().join("k3s")),
            Some(kubeconfig),
        );
        let paths = HelmPaths::new(
            dir.path().join("repositories.yaml"),
            dir.path().join("repository"),
        );
        let orchestrator = Orchestrator::new(
            gateway,
            RepositoryResolver::with_getters(paths, StaticIndex, StaticIndex),
            PackageInstaller::new(FakePackageManager::default()),
            &events,
        );

        let error = orchestrator
            .run(&sample_config(), &OpenLdapService)
            .await
            .unwrap_err();

        assert_eq!(error.stage, Stage::ConnectingCluster);
        assert!(matches!(
            error.error,
            BootstrapError::Connectivity(GatewayError::ClientConfig(_))
        ));
        assert!(!stages(&events).contains(&Stage::Installing));
    }

    #[tokio::test]
    async fn rejected_remediation_fails_post_install() {
        let dir = tempfile::tempdir().unwrap();
        let events = RecordingSink::default();
        let gateway = FakeGateway {
            reject_manifests: true,
            ..Default::default()
        };
        let orchestrator = orchestrator(&dir, gateway, &events);

        let error = orchestrator
            .run(&sample_config(), &OpenLdapService)
            .await
            .unwrap_err();

        assert_eq!(error.stage, Stage::PostInstalling);
        assert!(matches!(error.error, BootstrapError::ManifestApply(_)));
    }

    #[tokio::test]
    async fn gitlab_secrets_are_applied_before_the_install() {
        let dir = tempfile::tempdir().unwrap();
        let events = RecordingSink::default();
        let gateway = FakeGateway {
            readiness: Some(PodReadiness {
                total: 3,
                ready: 3,
                timed_out: false,
            }),
            ..Default::default()
        }
        .with_secret("gitlab-initial-root-password", "password", "UzNjcmV0IQ==");
        let orchestrator = orchestrator(&dir, gateway, &events);

        let mut config = sample_config();
        config.release_name = "gitlab".to_owned();
        config.repository = RepositorySource::new(
            "gitlab",
            "https://charts.gitlab.io/",
            "gitlab/gitlab",
        );

        let report = orchestrator
            .run(&config, &GitLabService::default())
            .await
            .unwrap();

        assert_eq!(report.readiness.map(|r| r.is_ready()), Some(true));
        assert_eq!(report.credential.unwrap().expose(), "S3cret!");

        let events = events.events.borrow();
        let prerequisites = events
            .iter()
            .position(|event| matches!(event, BootstrapEvent::PrerequisitesApplied { count: 1 }))
            .unwrap();
        let installed = events
            .iter()
            .position(|event| matches!(event, BootstrapEvent::ReleaseInstalled(_)))
            .unwrap();
        assert!(prerequisites < installed);

        let applied = orchestrator.gateway().applied.borrow();
        assert_eq!(applied.len(), 1);
        assert!(applied[0].contains("gitlab-initial-root-password"));
    }
}
