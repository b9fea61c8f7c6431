use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::{BootstrapConfig, Credential, RepositorySource},
    orchestrator::BootstrapReport,
    package::ReleaseHandle,
    services::TargetService,
    APP_NAME,
};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Couldn't serialize the run snapshot! Reason: {}", .0)]
    Serialization(serde_json::Error),
    #[error("Couldn't write the run snapshot to {:?}! Reason: {}", .0, .1)]
    Io(PathBuf, io::Error),
}

/// Resolved configuration of a successful run, credentials always redacted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot<'a> {
    pub service: &'static str,
    pub namespace: &'a str,
    pub network_block: &'a str,
    pub domain: &'a str,
    pub base_dn: String,
    pub admin_dn: String,
    pub admin_password: &'a Credential,
    pub config_password: &'a Credential,
    pub kubeconfig: Option<&'a Path>,
    pub release: &'a ReleaseHandle,
    pub repository: &'a RepositorySource,
    pub index_path: &'a Path,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
}

impl<'a> RunSnapshot<'a> {
    pub fn new(
        config: &'a BootstrapConfig,
        service: &impl TargetService,
        report: &'a BootstrapReport,
    ) -> Self {
        Self {
            service: service.name(),
            namespace: &config.namespace,
            network_block: config.network_block.trim(),
            domain: config.domain(),
            base_dn: config.base_identifier().to_string(),
            admin_dn: config.admin_dn(),
            admin_password: &config.admin_credential,
            config_password: config.config_credential(),
            kubeconfig: config.kubeconfig(),
            release: &report.release,
            repository: &config.repository,
            index_path: &report.repository.index_path,
            settings: service.settings(),
            created_at: Utc::now(),
        }
    }
}

/// `infractl.<service>.json`
pub fn snapshot_file_name(service: &str) -> String {
    format!("{APP_NAME}.{service}.json")
}

/// Writes the snapshot into `directory` with owner-only permissions, returning its path.
pub fn write_snapshot(directory: &Path, snapshot: &RunSnapshot) -> Result<PathBuf, SnapshotError> {
    let path = directory.join(snapshot_file_name(snapshot.service));
    let contents = serde_json::to_vec_pretty(snapshot).map_err(SnapshotError::Serialization)?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options
        .open(&path)
        .and_then(|mut file| file.write_all(&contents))
        .map_err(|error| SnapshotError::Io(path.to_owned(), error))?;

    info!("Configuration saved to {path:?}");

    Ok(path)
}
