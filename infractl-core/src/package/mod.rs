use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use derive_builder::Builder;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::values::{ServiceValues, ValuesError};

pub mod helm;
pub mod locate;

pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Invalid chart reference '{}', expected <repository>/<chart>[:<version>] or an archive path!", .0)]
    InvalidReference(String),
    #[error("Repository '{}' has no cached index, add it first! Reason: {}", .0, .1)]
    RepositoryNotCached(String, String),
    #[error("Chart '{}' wasn't found in the repository index!", .0)]
    ChartNotFound(String),
    #[error("Couldn't download the chart archive from {}! Reason: {}", .0, .1)]
    ArchiveDownload(String, String),
    #[error("Couldn't load the chart archive {:?}! Reason: {}", .0, .1)]
    ArchiveLoad(PathBuf, String),
    #[error("Release '{}' already exists, only fresh installs are supported!", .0)]
    ReleaseExists(String),
    #[error("Install of release '{}' failed! Reason: {}", .0, .1)]
    InstallFailed(String, String),
    #[error("Install of release '{}' didn't finish within {}s!", .0, .1.as_secs())]
    Timeout(String, Duration),
    #[error("Invalid install request! Reason: {}", .0)]
    InvalidRequest(String),
    #[error("{}", .0)]
    Values(ValuesError),
    #[error("Io error ({:?}): {}", .0, .1)]
    Io(PathBuf, std::io::Error),
    #[error("Couldn't run '{}'! Reason: {}", .0, .1)]
    Spawn(String, std::io::Error),
}

/// Where a chart comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartReference {
    /// An archive on the local filesystem.
    Local(PathBuf),
    /// `repository/chart[:version]`
    Repository {
        repository: String,
        chart: String,
        version: Option<String>,
    },
}

impl ChartReference {
    /// An existing local path wins over a repository reference.
    pub fn resolve(reference: &str) -> Result<Self, PackageError> {
        let reference = reference.trim();
        let path = Path::new(reference);

        if !reference.is_empty() && path.exists() {
            return Ok(Self::Local(path.to_path_buf()));
        }

        reference.parse()
    }
}

impl FromStr for ChartReference {
    type Err = PackageError;

    fn from_str(reference: &str) -> Result<Self, Self::Err> {
        let invalid = || PackageError::InvalidReference(reference.to_owned());
        let (name, version) = match reference.rsplit_once(':') {
            Some((name, version)) => (name, Some(version.trim())),
            None => (reference, None),
        };
        let (repository, chart) = name.split_once('/').ok_or_else(invalid)?;

        if repository.trim().is_empty()
            || chart.trim().is_empty()
            || chart.contains('/')
            || version.map(str::is_empty).unwrap_or(false)
        {
            return Err(invalid());
        }

        Ok(Self::Repository {
            repository: repository.trim().to_owned(),
            chart: chart.trim().to_owned(),
            version: version.map(str::to_owned),
        })
    }
}

impl Display for ChartReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartReference::Local(path) => write!(f, "{}", path.display()),
            ChartReference::Repository {
                repository,
                chart,
                version: Some(version),
            } => write!(f, "{repository}/{chart}:{version}"),
            ChartReference::Repository {
                repository,
                chart,
                version: None,
            } => write!(f, "{repository}/{chart}"),
        }
    }
}

/// A first-time install of a chart.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct InstallRequest {
    pub release_name: String,
    pub chart: String,
    pub namespace: String,
    #[builder(default = "DEFAULT_INSTALL_TIMEOUT")]
    pub timeout: Duration,
    #[builder(default = "true")]
    pub create_namespace: bool,
    #[builder(default = "false")]
    pub wait: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A chart archive that was read and validated by the package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedChart {
    pub archive: PathBuf,
    pub metadata: ChartMetadata,
}

/// The release created by an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseHandle {
    pub name: String,
    pub namespace: String,
    pub chart_version: String,
    pub revision: u32,
    pub status: String,
}

impl Display for ReleaseHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} (chart {}, revision {}, {})",
            self.namespace, self.name, self.chart_version, self.revision, self.status
        )
    }
}

/// The package management backend.
#[allow(async_fn_in_trait)]
pub trait PackageManager {
    /// Resolves a reference to a local chart archive.
    async fn locate(&self, reference: &ChartReference) -> Result<PathBuf, PackageError>;

    async fn load(&self, archive: &Path) -> Result<LoadedChart, PackageError>;

    /// Creates a new release, an existing release of the same name is an error.
    async fn install(
        &self,
        request: &InstallRequest,
        chart: &LoadedChart,
        values: &ServiceValues,
    ) -> Result<ReleaseHandle, PackageError>;
}

/// Locates, loads and installs a chart within the request's timeout.
pub struct PackageInstaller<M> {
    manager: M,
}

impl<M: PackageManager> PackageInstaller<M> {
    pub fn new(manager: M) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub async fn install(
        &self,
        request: &InstallRequest,
        values: &ServiceValues,
    ) -> Result<ReleaseHandle, PackageError> {
        info!(
            "Installing release '{}' from '{}' into '{}'...",
            request.release_name, request.chart, request.namespace
        );
        debug!("Chart values: {values:?}");

        tokio::time::timeout(request.timeout, self.install_unbounded(request, values))
            .await
            .map_err(|_| PackageError::Timeout(request.release_name.to_owned(), request.timeout))?
    }

    async fn install_unbounded(
        &self,
        request: &InstallRequest,
        values: &ServiceValues,
    ) -> Result<ReleaseHandle, PackageError> {
        let reference = ChartReference::resolve(&request.chart)?;
        let archive = self.manager.locate(&reference).await?;
        let chart = self.manager.load(&archive).await?;

        debug!(
            "Loaded chart {} {} from {:?}",
            chart.metadata.name, chart.metadata.version, chart.archive
        );

        self.manager.install(request, &chart, values).await
    }
}
