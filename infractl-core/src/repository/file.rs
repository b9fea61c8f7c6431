use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REPOSITORY_FILE_API_VERSION: &str = "v1";

#[derive(Debug, Error)]
pub enum RepositoryFileError {
    #[error("Io error ({:?}): {}", .0, .1)]
    IoError(PathBuf, std::io::Error),
    #[error("Couldn't parse repository file {:?}! Reason: {}", .0, .1)]
    DeserializationError(PathBuf, serde_yaml::Error),
    #[error("Couldn't serialize repository file! Reason: {}", .0)]
    SerializationError(serde_yaml::Error),
}

/// A single registered repository.
///
/// Keys this tool doesn't manage (credentials, TLS files...) survive a rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl RepositoryEntry {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_owned(),
            url: url.to_owned(),
            extra: BTreeMap::new(),
        }
    }
}

/// The package manager's `repositories.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepositoryFile {
    pub api_version: String,
    pub generated: Option<DateTime<Utc>>,
    pub repositories: Vec<RepositoryEntry>,
}

impl Default for RepositoryFile {
    fn default() -> Self {
        Self {
            api_version: REPOSITORY_FILE_API_VERSION.to_owned(),
            generated: None,
            repositories: Vec::new(),
        }
    }
}

impl RepositoryFile {
    /// Missing or empty file yields an empty registration set, a corrupt one is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, RepositoryFileError> {
        debug!("Used repository file path: {path:?}");

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(error) => return Err(RepositoryFileError::IoError(path.to_owned(), error)),
        };

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&contents)
            .map_err(|error| RepositoryFileError::DeserializationError(path.to_owned(), error))
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryEntry> {
        self.repositories.iter().find(|entry| entry.name == name)
    }

    /// Inserts the entry or replaces the URL of the one with the same name.
    pub fn update(&mut self, entry: RepositoryEntry) {
        match self.repositories.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                existing.url = entry.url;
                existing.extra.extend(entry.extra);
            }
            None => self.repositories.push(entry),
        }
    }

    pub fn save(&mut self, path: &Path) -> Result<(), RepositoryFileError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| RepositoryFileError::IoError(parent.to_owned(), error))?;
        }

        self.generated = Some(Utc::now());

        let file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|error| RepositoryFileError::IoError(path.to_owned(), error))?;

        serde_yaml::to_writer(file, self).map_err(RepositoryFileError::SerializationError)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{RepositoryEntry, RepositoryFile, RepositoryFileError};

    #[test]
    fn missing_and_empty_files_are_empty_sets() {
        let dir = tempfile::tempdir().unwrap();

        let missing = RepositoryFile::load_or_default(&dir.path().join("nope.yaml")).unwrap();
        assert!(missing.repositories.is_empty());

        let empty_path = dir.path().join("empty.yaml");
        fs::write(&empty_path, "\n").unwrap();
        let empty = RepositoryFile::load_or_default(&empty_path).unwrap();
        assert!(empty.repositories.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repositories.yaml");
        fs::write(&path, "repositories: [oops").unwrap();

        assert!(matches!(
            RepositoryFile::load_or_default(&path),
            Err(RepositoryFileError::DeserializationError(..))
        ));
    }

    #[test]
    fn update_is_keyed_by_name() {
        let mut file = RepositoryFile::default();
        file.update(RepositoryEntry::new("gitlab", "https://old.example/"));
        file.update(RepositoryEntry::new("helm-openldap", "https://jp-gouin.github.io/helm-openldap/"));
        file.update(RepositoryEntry::new("gitlab", "https://charts.gitlab.io/"));

        assert_eq!(file.repositories.len(), 2);
        assert_eq!(file.get("gitlab").unwrap().url, "https://charts.gitlab.io/");
    }

    #[test]
    fn save_keeps_foreign_keys_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helm").join("repositories.yaml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"apiVersion: ""
generated: "2023-06-01T10:00:00Z"
repositories:
- name: private
  url: https://charts.internal/
  username: operator
  insecure_skip_tls_verify: true
"#,
        )
        .unwrap();

        let mut file = RepositoryFile::load_or_default(&path).unwrap();
        file.update(RepositoryEntry::new("gitlab", "https://charts.gitlab.io/"));
        file.save(&path).unwrap();

        let reloaded = RepositoryFile::load_or_default(&path).unwrap();
        let private = reloaded.get("private").unwrap();

        assert_eq!(reloaded.repositories.len(), 2);
        assert_eq!(
            private.extra.get("username"),
            Some(&serde_yaml::Value::String("operator".to_owned()))
        );
        assert!(private.extra.contains_key("insecure_skip_tls_verify"));
        assert!(reloaded.generated.is_some());
    }
}
