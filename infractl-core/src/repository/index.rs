use std::{collections::BTreeMap, fs, path::Path};

use semver::Version;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Couldn't read repository index {}! Reason: {}", .0, .1)]
    Read(String, std::io::Error),
    #[error("Repository index is malformed! Reason: {}", .0)]
    Malformed(serde_yaml::Error),
    #[error("Repository index has no apiVersion!")]
    MissingApiVersion,
}

/// One published version of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

impl ChartVersion {
    /// The semantic version, tolerating a leading `v`.
    pub fn semantic_version(&self) -> Option<Version> {
        Version::parse(self.version.trim().trim_start_matches('v')).ok()
    }

    /// Pre-release versions (`1.2.3-rc.1`) aren't picked unless pinned.
    pub fn is_stable(&self) -> bool {
        self.semantic_version()
            .map(|version| version.pre.is_empty())
            .unwrap_or(false)
    }
}

/// Parsed `index.yaml` of a chart repository, entries are kept in file order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartVersion>>,
}

impl IndexFile {
    pub fn parse(contents: &[u8]) -> Result<Self, IndexError> {
        let index: IndexFile = serde_yaml::from_slice(contents).map_err(IndexError::Malformed)?;

        if index.api_version.trim().is_empty() {
            return Err(IndexError::MissingApiVersion);
        }

        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let contents =
            fs::read(path).map_err(|error| IndexError::Read(format!("{path:?}"), error))?;

        Self::parse(&contents)
    }

    /// Finds the pinned version of a chart, or the highest stable one when none is pinned.
    /// Without any stable release the first listed entry is used.
    pub fn find(&self, chart: &str, version: Option<&str>) -> Option<&ChartVersion> {
        let versions = self.entries.get(chart)?;

        match version {
            Some(version) => {
                let version = version.trim().trim_start_matches('v');

                versions
                    .iter()
                    .find(|entry| entry.version.trim().trim_start_matches('v') == version)
            }
            None => versions
                .iter()
                .filter(|entry| entry.is_stable())
                .filter_map(|entry| entry.semantic_version().map(|parsed| (parsed, entry)))
                .max_by(|(left, _), (right, _)| left.cmp(right))
                .map(|(_, entry)| entry)
                .or_else(|| versions.first()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{IndexError, IndexFile};

    pub(crate) const SAMPLE_INDEX: &str = r#"apiVersion: v1
entries:
  openldap-stack-ha:
  - name: openldap-stack-ha
    version: 4.4.0-beta.1
    appVersion: 2.6.9
    urls:
    - https://github.com/jp-gouin/helm-openldap/releases/download/v4.4.0-beta.1/openldap-stack-ha-4.4.0-beta.1.tgz
  - name: openldap-stack-ha
    version: 4.3.2
    appVersion: 2.6.9
    digest: 3f1c
    urls:
    - charts/openldap-stack-ha-4.3.2.tgz
  - name: openldap-stack-ha
    version: 4.3.1
    urls:
    - charts/openldap-stack-ha-4.3.1.tgz
generated: "2024-11-02T09:12:44.1Z"
"#;

    #[test]
    fn picks_newest_stable_version() {
        let index = IndexFile::parse(SAMPLE_INDEX.as_bytes()).unwrap();
        let chart = index.find("openldap-stack-ha", None).unwrap();

        assert_eq!(chart.version, "4.3.2");
        assert_eq!(chart.urls, vec!["charts/openldap-stack-ha-4.3.2.tgz"]);
    }

    #[test]
    fn picks_highest_stable_version_from_unsorted_index() {
        let index = IndexFile::parse(
            br#"apiVersion: v1
entries:
  gitlab:
  - name: gitlab
    version: 7.9.0
  - name: gitlab
    version: 7.11.2
  - name: gitlab
    version: 8.0.0-rc.1
  - name: gitlab
    version: 7.10.4
  - name: gitlab
    version: not-a-version
"#,
        )
        .unwrap();

        assert_eq!(index.find("gitlab", None).unwrap().version, "7.11.2");
    }

    #[test]
    fn falls_back_to_first_entry_without_stable_releases() {
        let index = IndexFile::parse(
            br#"apiVersion: v1
entries:
  gitlab:
  - name: gitlab
    version: 8.0.0-rc.2
  - name: gitlab
    version: 8.0.0-rc.1
"#,
        )
        .unwrap();

        let chart = index.find("gitlab", None).unwrap();
        assert_eq!(chart.version, "8.0.0-rc.2");
        assert!(!chart.is_stable());
    }

    #[test]
    fn honours_pinned_versions() {
        let index = IndexFile::parse(SAMPLE_INDEX.as_bytes()).unwrap();

        assert_eq!(index.find("openldap-stack-ha", Some("4.3.1")).unwrap().version, "4.3.1");
        assert_eq!(index.find("openldap-stack-ha", Some("v4.3.1")).unwrap().version, "4.3.1");
        assert!(index.find("openldap-stack-ha", Some("9.9.9")).is_none());
        assert!(index.find("gitlab", None).is_none());
    }

    #[test]
    fn rejects_documents_without_api_version() {
        assert!(matches!(
            IndexFile::parse(b"<html>not an index</html>"),
            Err(IndexError::Malformed(_)) | Err(IndexError::MissingApiVersion)
        ));
        assert!(matches!(
            IndexFile::parse(b"entries: {}"),
            Err(IndexError::MissingApiVersion)
        ));
    }
}
