use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;
use tokio::fs;

use self::{
    file::{RepositoryEntry, RepositoryFile, RepositoryFileError},
    getter::{parse_url, GetterError, HttpGetter, IndexGetter, TransportGetters},
    index::{IndexError, IndexFile},
    paths::HelmPaths,
};

pub mod file;
pub mod getter;
pub mod index;
pub mod paths;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Repository name cannot be empty!")]
    EmptyName,
    #[error("Invalid repository URL! Reason: {}", .0)]
    InvalidUrl(GetterError),
    #[error("Repository URL scheme '{}' isn't supported, expected http, https or file!", .0)]
    UnsupportedScheme(String),
    #[error("Couldn't fetch the index of repository '{}'! Direct download: {}; HTTP fallback: {}", .name, .direct, .fallback)]
    IndexUnavailable {
        name: String,
        direct: String,
        fallback: String,
    },
    #[error("Couldn't write the repository cache at {:?}! Reason: {}", .0, .1)]
    Cache(PathBuf, std::io::Error),
    #[error("{}", .0)]
    RegistrationFile(RepositoryFileError),
}

#[derive(Debug, Error)]
enum DownloadError {
    #[error("{}", .0)]
    Getter(GetterError),
    #[error("{}", .0)]
    Index(IndexError),
    #[error("{}", .0)]
    Cache(String),
}

/// A repository entry bound to the transport that serves it.
#[derive(Debug, Clone)]
pub struct ChartRepository {
    pub entry: RepositoryEntry,
}

impl ChartRepository {
    pub fn new(entry: RepositoryEntry, getter: &impl IndexGetter) -> Result<Self, RepositoryError> {
        if entry.name.trim().is_empty() {
            return Err(RepositoryError::EmptyName);
        }

        let url = parse_url(entry.url.trim()).map_err(RepositoryError::InvalidUrl)?;

        if !getter.supports(&url) {
            return Err(RepositoryError::UnsupportedScheme(url.scheme().to_owned()));
        }

        Ok(Self { entry })
    }

    pub fn index_url(&self) -> String {
        format!("{}/index.yaml", self.entry.url.trim().trim_end_matches('/'))
    }
}

/// Outcome of a repository registration.
#[derive(Debug, Clone)]
pub struct RepositoryRegistration {
    pub entry: RepositoryEntry,
    pub index_path: PathBuf,
    /// Why the direct download was abandoned, `None` when it succeeded.
    pub fallback_reason: Option<String>,
}

impl RepositoryRegistration {
    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Registers chart repositories and caches their indices.
///
/// The index is first fetched through the transport matching the URL's scheme and validated,
/// when that fails it's downloaded with a plain HTTP GET and cached as-is.
pub struct RepositoryResolver<D = TransportGetters, F = HttpGetter> {
    paths: HelmPaths,
    direct: D,
    fallback: F,
}

impl RepositoryResolver {
    pub fn new(paths: HelmPaths) -> Self {
        Self::with_getters(paths, TransportGetters::default(), HttpGetter::new())
    }
}

impl<D: IndexGetter, F: IndexGetter> RepositoryResolver<D, F> {
    pub fn with_getters(paths: HelmPaths, direct: D, fallback: F) -> Self {
        Self {
            paths,
            direct,
            fallback,
        }
    }

    pub fn paths(&self) -> &HelmPaths {
        &self.paths
    }

    pub async fn add_repository(
        &self,
        name: &str,
        url: &str,
    ) -> Result<RepositoryRegistration, RepositoryError> {
        let entry = RepositoryEntry::new(name.trim(), url.trim());
        let repository = ChartRepository::new(entry, &self.direct)?;
        let index_path = self.paths.index_file(&repository.entry.name);

        info!(
            "Adding repository '{}' ({})...",
            repository.entry.name, repository.entry.url
        );

        let fallback_reason = match self.download_index(&repository, &index_path).await {
            Ok(()) => None,
            Err(direct_error) => {
                warn!("Direct index download failed ({direct_error}), falling back to plain HTTP...");

                self.download_index_fallback(&repository, &index_path)
                    .await
                    .map_err(|fallback_error| RepositoryError::IndexUnavailable {
                        name: repository.entry.name.to_owned(),
                        direct: direct_error.to_string(),
                        fallback: fallback_error.to_string(),
                    })?;

                Some(direct_error.to_string())
            }
        };

        debug!("Cached index at {index_path:?}");

        self.register(&repository.entry)?;

        Ok(RepositoryRegistration {
            entry: repository.entry,
            index_path,
            fallback_reason,
        })
    }

    async fn download_index(
        &self,
        repository: &ChartRepository,
        index_path: &Path,
    ) -> Result<(), DownloadError> {
        let contents = self
            .direct
            .get(&repository.index_url())
            .await
            .map_err(DownloadError::Getter)?;

        IndexFile::parse(&contents).map_err(DownloadError::Index)?;

        write_cache_file(index_path, &contents)
            .await
            .map_err(|error| DownloadError::Cache(error.to_string()))
    }

    async fn download_index_fallback(
        &self,
        repository: &ChartRepository,
        index_path: &Path,
    ) -> Result<(), DownloadError> {
        let contents = self
            .fallback
            .get(&repository.index_url())
            .await
            .map_err(DownloadError::Getter)?;

        write_cache_file(index_path, &contents)
            .await
            .map_err(|error| DownloadError::Cache(error.to_string()))
    }

    fn register(&self, entry: &RepositoryEntry) -> Result<(), RepositoryError> {
        let path = &self.paths.repository_config;
        let mut file =
            RepositoryFile::load_or_default(path).map_err(RepositoryError::RegistrationFile)?;

        file.update(entry.clone());
        file.save(path).map_err(RepositoryError::RegistrationFile)?;

        info!("Repository '{}' registered in {path:?}", entry.name);

        Ok(())
    }
}

async fn write_cache_file(path: &Path, contents: &[u8]) -> Result<(), RepositoryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|error| RepositoryError::Cache(parent.to_owned(), error))?;
    }

    fs::write(path, contents)
        .await
        .map_err(|error| RepositoryError::Cache(path.to_owned(), error))
}
