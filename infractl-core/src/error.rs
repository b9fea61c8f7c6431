use thiserror::Error;

use crate::{
    kubernetes::GatewayError, package::PackageError, remediation::ManifestError,
    repository::RepositoryError, validation::ValidationError,
};

/// Every fatal failure a bootstrap run can end with.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Invalid input! Reason: {}", .0)]
    InputValidation(ValidationError),
    #[error("Cluster is unreachable! Reason: {}", .0)]
    Connectivity(GatewayError),
    #[error("{}", .0)]
    RepositoryResolution(RepositoryError),
    #[error("{}", .0)]
    PackageInstall(PackageError),
    #[error("{}", .0)]
    ManifestApply(ManifestError),
}
