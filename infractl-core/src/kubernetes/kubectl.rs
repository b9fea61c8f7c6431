use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use kube::Client;
use log::{debug, info};
use tokio::process::Command;

use crate::helpers::{unique_temp_path, ScopedFile};

use super::{
    client::create_client,
    gateway::{ClusterGateway, GatewayError},
    labels::get_release_selector,
    readiness::{wait_for_release_pods, PodReadiness, READINESS_POLL_INTERVAL},
};

pub const BUNDLED_K3S_BINARY: &str = "k3s";
pub const KUBECTL_BINARY: &str = "kubectl";
pub const MANIFEST_FILE_PREFIX: &str = "infractl";

/// The executable used to talk to the control plane, along with the arguments that precede
/// every kubectl verb (`k3s kubectl ...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubectlCommand {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl KubectlCommand {
    pub fn new(program: PathBuf, prefix_args: Vec<String>) -> Self {
        Self {
            program,
            prefix_args,
        }
    }

    /// Uses the given binary, a `k3s` binary gets the `kubectl` subcommand prepended.
    pub fn from_path(program: PathBuf) -> Self {
        let is_k3s = program
            .file_name()
            .map(|name| name == BUNDLED_K3S_BINARY)
            .unwrap_or(false);

        match is_k3s {
            true => Self::new(program, vec![KUBECTL_BINARY.to_owned()]),
            false => Self::new(program, Vec::new()),
        }
    }

    /// `k3s kubectl` shipped next to the current executable,
    /// or plain `kubectl` from `PATH` when there's no such binary.
    pub fn locate() -> Self {
        let bundled = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(BUNDLED_K3S_BINARY)));

        match bundled {
            Some(path) if path.is_file() => {
                debug!("Using bundled k3s kubectl: {path:?}");
                Self::from_path(path)
            }
            _ => {
                debug!("Bundled k3s binary not found, falling back to '{KUBECTL_BINARY}' from PATH");
                Self::new(KUBECTL_BINARY.into(), Vec::new())
            }
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// [`ClusterGateway`] backed by the kubectl executable.
///
/// A `kube` API client is created while checking connectivity and used for the readiness poll.
/// An unusable kubeconfig fails the connectivity check.
pub struct KubectlGateway {
    kubectl: KubectlCommand,
    kubeconfig: Option<PathBuf>,
    client: OnceLock<Client>,
}

impl KubectlGateway {
    pub fn new(kubectl: KubectlCommand, kubeconfig: Option<PathBuf>) -> Self {
        Self {
            kubectl,
            kubeconfig,
            client: OnceLock::new(),
        }
    }

    fn build_args(&self, args: &[&str]) -> Vec<OsString> {
        let mut full_args: Vec<OsString> =
            self.kubectl.prefix_args.iter().map(OsString::from).collect();

        if let Some(kubeconfig) = &self.kubeconfig {
            full_args.push("--kubeconfig".into());
            full_args.push(kubeconfig.into());
        }

        full_args.extend(args.iter().map(OsString::from));
        full_args
    }

    /// Runs kubectl and returns its trimmed standard output.
    async fn run(&self, args: &[&str]) -> Result<String, GatewayError> {
        let command = format!("{KUBECTL_BINARY} {}", args.join(" "));

        debug!("Running: {:?} {:?}", self.kubectl.program, self.build_args(args));

        let output = Command::new(&self.kubectl.program)
            .args(self.build_args(args))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| GatewayError::Spawn {
                command: command.clone(),
                error,
            })?;

        if !output.status.success() {
            return Err(GatewayError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

impl ClusterGateway for KubectlGateway {
    async fn check_connectivity(&self) -> Result<Vec<String>, GatewayError> {
        let client = create_client(self.kubeconfig.as_deref())
            .await
            .map_err(GatewayError::ClientConfig)?;

        if self.client.set(client).is_err() {
            debug!("API client already initialized, keeping the existing one");
        }

        let output = self.run(&["get", "nodes", "-o", "name"]).await?;

        if output.is_empty() {
            return Err(GatewayError::EmptyOutput("kubectl get nodes".to_owned()));
        }

        Ok(output.lines().map(|line| line.trim().to_owned()).collect())
    }

    async fn ensure_namespace(&self, name: &str) {
        info!("Ensuring namespace '{name}' is created...");

        if let Err(error) = self.run(&["create", "ns", name]).await {
            debug!("Namespace creation skipped: {error}");
        }
    }

    async fn apply_manifest(&self, manifest: &str) -> Result<(), GatewayError> {
        let file = ScopedFile::create(
            unique_temp_path(MANIFEST_FILE_PREFIX, "yaml"),
            manifest.as_bytes(),
        )
        .map_err(GatewayError::TempFile)?;

        debug!("Wrote manifest to {:?}", file.path());

        let path = file.path().to_string_lossy().into_owned();
        let output = self.run(&["apply", "-f", &path]).await?;

        for line in output.lines() {
            info!("{line}");
        }

        Ok(())
    }

    async fn pod_status(&self, namespace: &str, release_name: &str) -> Result<String, GatewayError> {
        let selector = get_release_selector(release_name);

        self.run(&["get", "pods", "-n", namespace, "-l", &selector, "--no-headers"])
            .await
    }

    async fn secret_field(
        &self,
        name: &str,
        namespace: &str,
        field: &str,
    ) -> Result<String, GatewayError> {
        let jsonpath = format!("jsonpath={{.data.{field}}}");

        self.run(&["get", "secret", name, "-n", namespace, "-o", &jsonpath])
            .await
    }

    async fn wait_for_release_pods(
        &self,
        namespace: &str,
        release_name: &str,
        timeout: Duration,
    ) -> Result<PodReadiness, GatewayError> {
        let client = self.client.get().ok_or(GatewayError::ClientUnavailable)?;

        wait_for_release_pods(client, namespace, release_name, timeout, READINESS_POLL_INTERVAL)
            .await
            .map_err(GatewayError::KubeApi)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{fs, os::unix::fs::PermissionsExt, path::Path, time::Duration};

    use tempfile::TempDir;

    use super::{KubectlCommand, KubectlGateway};
    use crate::kubernetes::gateway::{ClusterGateway, GatewayError};

    /// A fake `k3s` that records its arguments and copies applied manifests aside.
    fn stub_k3s(dir: &Path, exit_code: i32) -> KubectlCommand {
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{dir}/calls"
if [ "$2" = "apply" ]; then cp "$4" "{dir}/applied.yaml"; echo "job.batch/ldap-memberof-setup created"; fi
if [ "$2" = "get" ] && [ "$3" = "secret" ]; then printf 'UzNjcmV0IQ=='; fi
exit {exit_code}
"#,
            dir = dir.display()
        );
        let path = dir.join("k3s");

        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        KubectlCommand::from_path(path)
    }

    fn calls(dir: &TempDir) -> String {
        fs::read_to_string(dir.path().join("calls")).unwrap_or_default()
    }

    #[test]
    fn k3s_binary_gets_kubectl_prefix() {
        let command = KubectlCommand::from_path("/opt/bin/k3s".into());
        assert_eq!(command.prefix_args, vec!["kubectl".to_owned()]);

        let command = KubectlCommand::from_path("/usr/bin/kubectl".into());
        assert!(command.prefix_args.is_empty());
    }

    #[tokio::test]
    async fn apply_manifest_removes_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = KubectlGateway::new(stub_k3s(dir.path(), 0), None);

        gateway.apply_manifest("kind: Job\n").await.unwrap();

        let applied = fs::read_to_string(dir.path().join("applied.yaml")).unwrap();
        assert_eq!(applied, "kind: Job\n");

        let calls = calls(&dir);
        let manifest_path = calls.trim().rsplit(' ').next().unwrap();
        assert!(manifest_path.contains("infractl-"));
        assert!(!Path::new(manifest_path).exists());
    }

    #[tokio::test]
    async fn failed_apply_still_removes_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = KubectlGateway::new(stub_k3s(dir.path(), 1), None);

        let result = gateway.apply_manifest("kind: Job\n").await;
        assert!(matches!(result, Err(GatewayError::CommandFailed { .. })));

        let calls = calls(&dir);
        let manifest_path = calls.trim().rsplit(' ').next().unwrap();
        assert!(!Path::new(manifest_path).exists());
    }

    #[tokio::test]
    async fn passes_kubeconfig_and_selector() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = KubectlGateway::new(
            stub_k3s(dir.path(), 0),
            Some("/etc/rancher/k3s/k3s.yaml".into()),
        );

        gateway.pod_status("infra", "ldap").await.unwrap();

        assert_eq!(
            calls(&dir).trim(),
            "kubectl --kubeconfig /etc/rancher/k3s/k3s.yaml get pods -n infra \
             -l app.kubernetes.io/instance=ldap --no-headers"
        );
    }

    #[tokio::test]
    async fn reads_secret_field_through_jsonpath() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = KubectlGateway::new(stub_k3s(dir.path(), 0), None);

        let value = gateway
            .secret_field("ldap", "infra", "LDAP_ADMIN_PASSWORD")
            .await
            .unwrap();

        assert_eq!(value, "UzNjcmV0IQ==");
        assert_eq!(
            calls(&dir).trim(),
            "kubectl get secret ldap -n infra -o jsonpath={.data.LDAP_ADMIN_PASSWORD}"
        );
    }

    #[tokio::test]
    async fn ensure_namespace_ignores_failures() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = KubectlGateway::new(stub_k3s(dir.path(), 1), None);

        gateway.ensure_namespace("infra").await;

        assert_eq!(calls(&dir).trim(), "kubectl create ns infra");
    }

    #[tokio::test]
    async fn garbage_kubeconfig_fails_connectivity_before_kubectl_runs() {
        let dir = tempfile::tempdir().unwrap();
        let kubeconfig = dir.path().join("k3s.yaml");
        fs::write(&kubeconfig, "clusters: [not, a, kubeconfig").unwrap();
        let gateway = KubectlGateway::new(stub_k3s(dir.path(), 0), Some(kubeconfig));

        let result = gateway.check_connectivity().await;

        assert!(matches!(result, Err(GatewayError::ClientConfig(_))));
        assert!(calls(&dir).is_empty());
    }

    #[tokio::test]
    async fn missing_kubeconfig_fails_connectivity() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = KubectlGateway::new(
            stub_k3s(dir.path(), 0),
            Some(dir.path().join("missing.yaml")),
        );

        let result = gateway.check_connectivity().await;

        assert!(matches!(result, Err(GatewayError::ClientConfig(_))));
    }

    #[tokio::test]
    async fn readiness_poll_needs_a_connected_client() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = KubectlGateway::new(stub_k3s(dir.path(), 0), None);

        let result = gateway
            .wait_for_release_pods("infra", "ldap", Duration::from_secs(1))
            .await;

        assert!(matches!(result, Err(GatewayError::ClientUnavailable)));
    }
}
