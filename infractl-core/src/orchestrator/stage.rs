use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::error::BootstrapError;

/// Steps of a bootstrap run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Validating,
    ConnectingCluster,
    EnsuringNamespace,
    ResolvingRepository,
    Installing,
    PostInstalling,
    RetrievingCredential,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validating => "validating input",
            Stage::ConnectingCluster => "connecting to the cluster",
            Stage::EnsuringNamespace => "ensuring the namespace",
            Stage::ResolvingRepository => "resolving the repository",
            Stage::Installing => "installing the release",
            Stage::PostInstalling => "post-install configuration",
            Stage::RetrievingCredential => "retrieving the credential",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };

        f.write_str(name)
    }
}

/// A fatal error together with the stage it stopped the run in.
#[derive(Debug, Error)]
#[error("{} failed! {}", .stage, .error)]
pub struct StageError {
    pub stage: Stage,
    pub error: BootstrapError,
}

impl StageError {
    pub fn new(stage: Stage, error: BootstrapError) -> Self {
        Self { stage, error }
    }
}
