use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

use k8s_openapi::api::core::v1::Pod;
use kube::{api::ListParams, Api, Client};
use log::debug;
use tokio::time::{sleep, Instant};

use super::labels::get_release_selector;

pub const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Advisory snapshot of a release's pods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PodReadiness {
    pub total: usize,
    pub ready: usize,
    pub timed_out: bool,
}

impl PodReadiness {
    pub fn from_pods(pods: &[Pod]) -> Self {
        Self {
            total: pods.len(),
            ready: pods.iter().filter(|pod| is_pod_ready(pod)).count(),
            timed_out: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.total > 0 && self.ready == self.total
    }
}

impl Display for PodReadiness {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} pods ready", self.ready, self.total)?;

        if self.timed_out {
            f.write_str(" (timed out)")?;
        }

        Ok(())
    }
}

pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|condition| condition.type_ == "Ready" && condition.status == "True")
        })
        .unwrap_or(false)
}

/// Polls the release's pods until all of them are ready or `timeout` elapses.
///
/// Running out of time isn't an error, the last observed state is returned with `timed_out` set.
pub async fn wait_for_release_pods(
    client: &Client,
    namespace: &str,
    release_name: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<PodReadiness, kube::Error> {
    let pod_api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let params = ListParams::default().labels(&get_release_selector(release_name));
    let deadline = Instant::now() + timeout;

    loop {
        let pods = pod_api.list(&params).await?;
        let readiness = PodReadiness::from_pods(&pods.items);

        if readiness.is_ready() {
            return Ok(readiness);
        }

        if Instant::now() + interval > deadline {
            return Ok(PodReadiness {
                timed_out: true,
                ..readiness
            });
        }

        debug!("Waiting for '{release_name}' pods: {readiness}");
        sleep(interval).await;
    }
}
