use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::Deserialize;
use tokio::process::Command;

use crate::{
    helpers::{unique_temp_path, ScopedFile},
    repository::{getter::IndexGetter, paths::HelmPaths},
    values::ServiceValues,
};

use super::{
    locate::ChartLocator, ChartMetadata, ChartReference, InstallRequest, LoadedChart,
    PackageError, PackageManager, ReleaseHandle,
};

pub const HELM_BINARY: &str = "helm";
pub const VALUES_FILE_PREFIX: &str = "infractl-values";

const RELEASE_NAME_IN_USE: &str = "cannot re-use a name that is still in use";

#[derive(Debug, Deserialize)]
struct ReleaseOutput {
    name: String,
    namespace: String,
    version: u32,
    info: ReleaseInfo,
    chart: ReleaseChart,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseChart {
    metadata: ChartMetadata,
}

impl From<ReleaseOutput> for ReleaseHandle {
    fn from(release: ReleaseOutput) -> Self {
        Self {
            name: release.name,
            namespace: release.namespace,
            chart_version: release.chart.metadata.version,
            revision: release.version,
            status: release.info.status,
        }
    }
}

struct HelmOutput {
    success: bool,
    status: String,
    stdout: String,
    stderr: String,
}

/// [`PackageManager`] driving the `helm` executable.
///
/// Charts are located through the native repository cache, helm only validates archives and
/// installs them.
pub struct HelmCli<G> {
    helm: PathBuf,
    kubeconfig: Option<PathBuf>,
    locator: ChartLocator<G>,
}

impl<G: IndexGetter> HelmCli<G> {
    pub fn new(
        helm: Option<PathBuf>,
        kubeconfig: Option<PathBuf>,
        locator: ChartLocator<G>,
    ) -> Self {
        Self {
            helm: helm.unwrap_or_else(|| HELM_BINARY.into()),
            kubeconfig,
            locator,
        }
    }

    fn paths(&self) -> &HelmPaths {
        self.locator.paths()
    }

    async fn run(&self, args: Vec<OsString>) -> Result<HelmOutput, PackageError> {
        let verb = args.first().map(|arg| arg.to_string_lossy().into_owned());
        let description = format!("{HELM_BINARY} {}", verb.unwrap_or_default());

        debug!("Running: {:?} {args:?}", self.helm);

        let mut command = Command::new(&self.helm);
        command.args(&args).kill_on_drop(true);

        for (key, value) in self.paths().env_vars() {
            command.env(key, value);
        }

        let output = command
            .output()
            .await
            .map_err(|error| PackageError::Spawn(description, error))?;

        Ok(HelmOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }

    fn install_args(
        &self,
        request: &InstallRequest,
        archive: &Path,
        values_file: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "install".into(),
            request.release_name.as_str().into(),
            archive.into(),
            "--namespace".into(),
            request.namespace.as_str().into(),
        ];

        if request.create_namespace {
            args.push("--create-namespace".into());
        }

        if request.wait {
            args.push("--wait".into());
        }

        args.push("--timeout".into());
        args.push(format!("{}s", request.timeout.as_secs()).into());
        args.push("--values".into());
        args.push(values_file.into());
        args.push("--output".into());
        args.push("json".into());

        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".into());
            args.push(kubeconfig.into());
        }

        args
    }
}

impl<G: IndexGetter> PackageManager for HelmCli<G> {
    async fn locate(&self, reference: &ChartReference) -> Result<PathBuf, PackageError> {
        self.locator.locate(reference).await
    }

    async fn load(&self, archive: &Path) -> Result<LoadedChart, PackageError> {
        let output = self
            .run(vec!["show".into(), "chart".into(), archive.into()])
            .await?;

        if !output.success {
            return Err(PackageError::ArchiveLoad(archive.to_owned(), output.stderr));
        }

        let metadata: ChartMetadata = serde_yaml::from_str(&output.stdout)
            .map_err(|error| PackageError::ArchiveLoad(archive.to_owned(), error.to_string()))?;

        Ok(LoadedChart {
            archive: archive.to_owned(),
            metadata,
        })
    }

    async fn install(
        &self,
        request: &InstallRequest,
        chart: &LoadedChart,
        values: &ServiceValues,
    ) -> Result<ReleaseHandle, PackageError> {
        let values_path = unique_temp_path(VALUES_FILE_PREFIX, "yaml");
        let values_file = ScopedFile::create(
            values_path.clone(),
            values.to_yaml().map_err(PackageError::Values)?.as_bytes(),
        )
        .map_err(|error| PackageError::Io(values_path, error))?;

        let output = self
            .run(self.install_args(request, &chart.archive, values_file.path()))
            .await?;

        if !output.success {
            if output.stderr.contains(RELEASE_NAME_IN_USE) {
                return Err(PackageError::ReleaseExists(request.release_name.to_owned()));
            }

            return Err(PackageError::InstallFailed(
                request.release_name.to_owned(),
                format!("{} ({})", output.stderr, output.status),
            ));
        }

        let release: ReleaseOutput = serde_json::from_str(&output.stdout).map_err(|error| {
            PackageError::InstallFailed(
                request.release_name.to_owned(),
                format!("unexpected helm output: {error}"),
            )
        })?;
        let release = ReleaseHandle::from(release);

        info!("Release {release} created");

        Ok(release)
    }
}
