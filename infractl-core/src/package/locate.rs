use std::path::PathBuf;

use log::{debug, info};
use tokio::fs;

use crate::repository::{
    file::RepositoryFile,
    getter::{parse_url, IndexGetter, TransportGetters},
    index::IndexFile,
    paths::HelmPaths,
};

use super::{ChartReference, PackageError};

/// Resolves chart references against the locally cached repository indices.
pub struct ChartLocator<G = TransportGetters> {
    paths: HelmPaths,
    getter: G,
}

impl ChartLocator {
    pub fn new(paths: HelmPaths) -> Self {
        Self::with_getter(paths, TransportGetters::default())
    }
}

impl<G: IndexGetter> ChartLocator<G> {
    pub fn with_getter(paths: HelmPaths, getter: G) -> Self {
        Self { paths, getter }
    }

    pub fn paths(&self) -> &HelmPaths {
        &self.paths
    }

    /// Returns the archive for the reference, downloading it into the cache when it's not there.
    pub async fn locate(&self, reference: &ChartReference) -> Result<PathBuf, PackageError> {
        let (repository, chart, version) = match reference {
            ChartReference::Local(path) => return Ok(path.to_owned()),
            ChartReference::Repository {
                repository,
                chart,
                version,
            } => (repository, chart, version.as_deref()),
        };

        let index = IndexFile::load(&self.paths.index_file(repository)).map_err(|error| {
            PackageError::RepositoryNotCached(repository.to_owned(), error.to_string())
        })?;
        let entry = index
            .find(chart, version)
            .ok_or_else(|| PackageError::ChartNotFound(reference.to_string()))?;
        let archive = self.paths.archive_file(chart, &entry.version);

        let cached = fs::metadata(&archive)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);

        if cached {
            debug!("Using cached chart archive {archive:?}");
            return Ok(archive);
        }

        let url = entry
            .urls
            .first()
            .ok_or_else(|| PackageError::ChartNotFound(reference.to_string()))?;
        let url = self.absolute_url(repository, url)?;

        info!("Downloading {chart} {} from {url}...", entry.version);

        let contents = self
            .getter
            .get(&url)
            .await
            .map_err(|error| PackageError::ArchiveDownload(url.to_owned(), error.to_string()))?;

        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|error| PackageError::Io(parent.to_owned(), error))?;
        }

        fs::write(&archive, contents)
            .await
            .map_err(|error| PackageError::Io(archive.clone(), error))?;

        Ok(archive)
    }

    /// Archive URLs in an index may be relative to the repository URL.
    fn absolute_url(&self, repository: &str, url: &str) -> Result<String, PackageError> {
        if parse_url(url).is_ok() {
            return Ok(url.to_owned());
        }

        let file =
            RepositoryFile::load_or_default(&self.paths.repository_config).map_err(|error| {
                PackageError::RepositoryNotCached(repository.to_owned(), error.to_string())
            })?;
        let entry = file.get(repository).ok_or_else(|| {
            PackageError::RepositoryNotCached(
                repository.to_owned(),
                "repository isn't registered".to_owned(),
            )
        })?;

        Ok(format!(
            "{}/{}",
            entry.url.trim().trim_end_matches('/'),
            url.trim_start_matches('/')
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::ChartLocator;
    use crate::{
        package::{ChartReference, PackageError},
        repository::{
            file::{RepositoryEntry, RepositoryFile},
            index::tests::SAMPLE_INDEX,
            paths::HelmPaths,
        },
    };

    fn seeded_paths(dir: &tempfile::TempDir, repository_url: &str) -> HelmPaths {
        let paths = HelmPaths::new(
            dir.path().join("repositories.yaml"),
            dir.path().join("cache"),
        );

        fs::create_dir_all(&paths.repository_cache).unwrap();
        fs::write(paths.index_file("helm-openldap"), SAMPLE_INDEX).unwrap();

        let mut file = RepositoryFile::default();
        file.update(RepositoryEntry::new("helm-openldap", repository_url));
        file.save(&paths.repository_config).unwrap();

        paths
    }

    #[tokio::test]
    async fn downloads_relative_archives_once() {
        let dir = tempfile::tempdir().unwrap();
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/charts/openldap-stack-ha-4.3.2.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let paths = seeded_paths(&dir, &format!("{}/", mock_server.uri()));
        let locator = ChartLocator::new(paths.clone());
        let reference: ChartReference = "helm-openldap/openldap-stack-ha".parse().unwrap();

        let archive = locator.locate(&reference).await.unwrap();
        assert_eq!(archive, paths.archive_file("openldap-stack-ha", "4.3.2"));
        assert_eq!(fs::read(&archive).unwrap(), b"archive");

        let again = locator.locate(&reference).await.unwrap();
        assert_eq!(again, archive);
    }

    #[tokio::test]
    async fn unknown_charts_and_versions_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ChartLocator::new(seeded_paths(&dir, "https://jp-gouin.github.io/helm-openldap/"));

        for reference in ["helm-openldap/phpldapadmin", "helm-openldap/openldap-stack-ha:0.0.1"] {
            let result = locator.locate(&reference.parse().unwrap()).await;
            assert!(matches!(result, Err(PackageError::ChartNotFound(_))), "{reference}");
        }
    }

    #[tokio::test]
    async fn unregistered_repositories_need_to_be_added_first() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ChartLocator::new(seeded_paths(&dir, "https://jp-gouin.github.io/helm-openldap/"));

        let result = locator.locate(&"gitlab/gitlab".parse().unwrap()).await;

        assert!(matches!(result, Err(PackageError::RepositoryNotCached(name, _)) if name == "gitlab"));
    }

    #[tokio::test]
    async fn local_archives_are_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ChartLocator::new(seeded_paths(&dir, "https://charts.example/"));
        let archive = dir.path().join("gitlab-7.11.2.tgz");

        let located = locator
            .locate(&ChartReference::Local(archive.clone()))
            .await
            .unwrap();

        assert_eq!(located, archive);
    }
}
