use serde_json::Value;

use crate::{
    config::{BootstrapConfig, RepositorySource},
    remediation::{ManifestError, RemediationJob},
    validation::ValidationError,
    values::{ServiceValues, ValuesError},
};

pub mod gitlab;
pub mod openldap;

pub use self::{gitlab::GitLabService, openldap::OpenLdapService};

/// Secret field holding the credential generated (or stored) for a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub name: String,
    pub field: &'static str,
}

/// A service the orchestrator knows how to bootstrap.
pub trait TargetService {
    /// Short name, used in file names and messages.
    fn name(&self) -> &'static str;

    fn default_repository(&self) -> RepositorySource;

    fn default_release_name(&self) -> &'static str;

    /// Service specific checks on top of [`BootstrapConfig::validate`].
    fn validate(&self, _config: &BootstrapConfig) -> Result<(), ValidationError> {
        Ok(())
    }

    fn build_values(&self, config: &BootstrapConfig) -> Result<ServiceValues, ValuesError>;

    /// Manifests that have to exist before the release is installed.
    fn prerequisites(&self, _config: &BootstrapConfig) -> Result<Vec<String>, ManifestError> {
        Ok(Vec::new())
    }

    fn remediation(&self, _config: &BootstrapConfig) -> Option<RemediationJob> {
        None
    }

    fn credential_secret(&self, _config: &BootstrapConfig) -> Option<SecretRef>;

    /// Instructions printed once the service is installed, never contains credentials.
    fn follow_up(&self, config: &BootstrapConfig) -> Vec<String>;

    /// Service specific settings recorded in the run snapshot.
    fn settings(&self) -> Value {
        Value::Null
    }
}
