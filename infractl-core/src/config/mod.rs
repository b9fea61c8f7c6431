use std::path::{Path, PathBuf};

use derive_builder::Builder;
use ipnet::Ipv4Net;
use serde::Serialize;

use crate::{
    validation::{derive_base_identifier, validate_network_block, BaseIdentifier, ValidationError},
    DEFAULT_KUBECONFIG_PATH, DEFAULT_NAMESPACE,
};

pub use self::{
    credential::{Credential, REDACTED},
    gitlab::{GitLabConfig, SmtpConfig},
};

pub mod credential;
pub mod gitlab;

/// Where the package for a service comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySource {
    pub name: String,
    pub url: String,
    pub chart: String,
    pub version: Option<String>,
}

impl RepositorySource {
    pub fn new(name: &str, url: &str, chart: &str) -> Self {
        Self {
            name: name.to_owned(),
            url: url.to_owned(),
            chart: chart.to_owned(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version.filter(|v| !v.trim().is_empty());
        self
    }

    /// `chart` or `chart:version` when a version is pinned.
    pub fn chart_reference(&self) -> String {
        match &self.version {
            Some(version) => format!("{}:{}", self.chart, version.trim()),
            None => self.chart.to_owned(),
        }
    }
}

/// Resolved operator input, shared by every bootstrap stage.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct BootstrapConfig {
    #[builder(setter(custom), default = "DEFAULT_NAMESPACE.to_owned()")]
    pub namespace: String,
    /// Reserved for network policies, validated up front nevertheless.
    pub network_block: String,
    domain: String,
    pub admin_credential: Credential,
    #[builder(default)]
    config_credential: Credential,
    /// `None` selects the in-cluster configuration.
    #[builder(default = "Some(PathBuf::from(DEFAULT_KUBECONFIG_PATH))")]
    pub kubeconfig: Option<PathBuf>,
    #[builder(setter(custom))]
    pub release_name: String,
    pub repository: RepositorySource,
}

impl BootstrapConfigBuilder {
    /// Stored trimmed, every stage addresses the namespace by this value.
    pub fn namespace(&mut self, value: impl AsRef<str>) -> &mut Self {
        self.namespace = Some(value.as_ref().trim().to_owned());
        self
    }

    /// Stored trimmed, every stage addresses the release by this value.
    pub fn release_name(&mut self, value: impl AsRef<str>) -> &mut Self {
        self.release_name = Some(value.as_ref().trim().to_owned());
        self
    }
}

impl BootstrapConfig {
    pub fn domain(&self) -> &str {
        self.domain.trim()
    }

    pub fn set_domain(&mut self, domain: impl Into<String>) {
        self.domain = domain.into();
    }

    /// Always derived from the current domain, never stored.
    pub fn base_identifier(&self) -> BaseIdentifier {
        derive_base_identifier(&self.domain)
    }

    pub fn admin_dn(&self) -> String {
        format!("cn=admin,{}", self.base_identifier())
    }

    /// The config credential, falling back to the admin credential when left blank.
    pub fn config_credential(&self) -> &Credential {
        if self.config_credential.is_blank() {
            &self.admin_credential
        } else {
            &self.config_credential
        }
    }

    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    pub fn validate(&self) -> Result<Ipv4Net, ValidationError> {
        let network = validate_network_block(&self.network_block)?;

        if self.namespace.is_empty() {
            return Err(ValidationError::EmptyNamespace);
        }

        if self.domain().is_empty() || self.base_identifier().is_empty() {
            return Err(ValidationError::EmptyDomain);
        }

        if self.admin_credential.is_blank() {
            return Err(ValidationError::EmptyAdminCredential);
        }

        if self.release_name.is_empty() {
            return Err(ValidationError::EmptyReleaseName);
        }

        if self.repository.name.trim().is_empty() {
            return Err(ValidationError::EmptyRepositoryField("name"));
        }

        if self.repository.url.trim().is_empty() {
            return Err(ValidationError::EmptyRepositoryField("URL"));
        }

        if self.repository.chart.trim().is_empty() {
            return Err(ValidationError::EmptyRepositoryField("chart"));
        }

        Ok(network)
    }
}
