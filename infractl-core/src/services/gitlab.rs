use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::core::ObjectMeta;
use serde_json::Value;

use crate::{
    config::{BootstrapConfig, Credential, GitLabConfig, RepositorySource},
    kubernetes::labels::get_managed_labels,
    remediation::ManifestError,
    validation::ValidationError,
    values::{
        gitlab::{
            build_gitlab_values, root_password_secret_name, smtp_password_secret_name,
            SECRET_PASSWORD_KEY,
        },
        ServiceValues, ValuesError,
    },
};

use super::{SecretRef, TargetService};

pub const GITLAB_REPOSITORY_NAME: &str = "gitlab";
pub const GITLAB_REPOSITORY_URL: &str = "https://charts.gitlab.io/";
pub const GITLAB_CHART: &str = "gitlab/gitlab";
pub const GITLAB_RELEASE_NAME: &str = "gitlab";

/// Collaboration platform (`gitlab/gitlab`), the admin credential becomes the root password.
#[derive(Debug, Clone, Default)]
pub struct GitLabService {
    pub config: GitLabConfig,
}

impl GitLabService {
    pub fn new(config: GitLabConfig) -> Self {
        Self { config }
    }

    fn generate_password_secret(
        &self,
        name: String,
        release_name: &str,
        namespace: &str,
        component: &str,
        password: &Credential,
    ) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace.to_owned()),
                labels: Some(get_managed_labels(release_name, component)),
                ..Default::default()
            },
            type_: Some("Opaque".to_owned()),
            string_data: Some(BTreeMap::from([(
                SECRET_PASSWORD_KEY.to_owned(),
                password.expose().to_owned(),
            )])),
            ..Default::default()
        }
    }
}

impl TargetService for GitLabService {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    fn default_repository(&self) -> RepositorySource {
        RepositorySource::new(GITLAB_REPOSITORY_NAME, GITLAB_REPOSITORY_URL, GITLAB_CHART)
    }

    fn default_release_name(&self) -> &'static str {
        GITLAB_RELEASE_NAME
    }

    fn validate(&self, _config: &BootstrapConfig) -> Result<(), ValidationError> {
        if let Some(smtp) = &self.config.smtp {
            if smtp.host.trim().is_empty() {
                return Err(ValidationError::Service("SMTP host is required!".to_owned()));
            }

            if smtp.port == 0 {
                return Err(ValidationError::Service("SMTP port cannot be 0!".to_owned()));
            }

            if smtp.from.trim().is_empty() {
                return Err(ValidationError::Service(
                    "SMTP from address is required!".to_owned(),
                ));
            }
        }

        if let Some(email) = self.config.issuer_email() {
            if !email.contains('@') {
                return Err(ValidationError::Service(format!(
                    "Certificate issuer email '{email}' is invalid!"
                )));
            }
        }

        Ok(())
    }

    fn build_values(&self, config: &BootstrapConfig) -> Result<ServiceValues, ValuesError> {
        build_gitlab_values(config, &self.config)
    }

    fn prerequisites(&self, config: &BootstrapConfig) -> Result<Vec<String>, ManifestError> {
        let release_name = &config.release_name;
        let mut secrets = vec![self.generate_password_secret(
            root_password_secret_name(release_name),
            release_name,
            &config.namespace,
            "initial-root-password",
            &config.admin_credential,
        )];

        if let Some(smtp) = &self.config.smtp {
            secrets.push(self.generate_password_secret(
                smtp_password_secret_name(release_name),
                release_name,
                &config.namespace,
                "smtp-password",
                &smtp.password,
            ));
        }

        secrets
            .iter()
            .map(|secret| {
                serde_yaml::to_string(secret)
                    .map_err(|error| ManifestError::Generate("password secret", error))
            })
            .collect()
    }

    fn credential_secret(&self, config: &BootstrapConfig) -> Option<SecretRef> {
        Some(SecretRef {
            name: root_password_secret_name(&config.release_name),
            field: SECRET_PASSWORD_KEY,
        })
    }

    fn follow_up(&self, config: &BootstrapConfig) -> Vec<String> {
        let namespace = &config.namespace;
        let release = &config.release_name;
        let secret = root_password_secret_name(release);

        vec![
            format!("GitLab is being deployed at {}", self.config.url(config.domain())),
            "  It takes a few minutes until every component is up.".to_owned(),
            String::new(),
            "To access GitLab without ingress:".to_owned(),
            format!("  kubectl -n {namespace} port-forward svc/{release}-webservice-default 8080:8080"),
            "  Then visit: http://localhost:8080 and sign in as 'root'".to_owned(),
            String::new(),
            "To read the initial root password:".to_owned(),
            format!(
                "  kubectl -n {namespace} get secret {secret} -o jsonpath='{{.data.password}}' | base64 -d"
            ),
            String::new(),
            "To check GitLab status:".to_owned(),
            format!("  kubectl -n {namespace} get pods -l app.kubernetes.io/instance={release}"),
        ]
    }

    fn settings(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }
}
