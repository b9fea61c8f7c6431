use anyhow::Context;
use infractl_core::{
    config::{BootstrapConfig, BootstrapConfigBuilder, RepositorySource},
    services::TargetService,
    snapshot::{write_snapshot, RunSnapshot},
};
use log::{info, warn};

use crate::{cli::BootstrapArgs, context::CommandContext};

use self::report::render_report;

pub mod gitlab;
pub mod openldap;
pub mod repo_add;
pub mod report;

/// Values gathered from flags or prompts.
pub struct OperatorAnswers {
    pub network_block: String,
    pub domain: String,
    pub admin_credential: String,
    pub config_credential: Option<String>,
}

pub fn repository_source(args: &BootstrapArgs, service: &impl TargetService) -> RepositorySource {
    let default = service.default_repository();

    RepositorySource {
        name: args.repo_name.to_owned().unwrap_or(default.name),
        url: args.repo_url.to_owned().unwrap_or(default.url),
        chart: args.chart.to_owned().unwrap_or(default.chart),
        version: None,
    }
    .with_version(args.chart_version.to_owned())
}

pub fn build_config(
    context: &CommandContext,
    args: &BootstrapArgs,
    service: &impl TargetService,
    answers: OperatorAnswers,
) -> anyhow::Result<BootstrapConfig> {
    let mut builder = BootstrapConfigBuilder::default();

    builder
        .namespace(context.namespace.to_owned())
        .network_block(answers.network_block)
        .domain(answers.domain)
        .admin_credential(answers.admin_credential)
        .kubeconfig(context.kubeconfig.to_owned())
        .release_name(
            args.release_name
                .to_owned()
                .unwrap_or_else(|| service.default_release_name().to_owned()),
        )
        .repository(repository_source(args, service));

    if let Some(config_credential) = answers.config_credential {
        builder.config_credential(config_credential);
    }

    builder.build().context("Couldn't assemble the configuration!")
}

/// Runs the orchestrator, then saves the snapshot and prints the report.
pub async fn bootstrap(
    context: &CommandContext,
    config: &BootstrapConfig,
    service: &impl TargetService,
    show_credentials: bool,
) -> anyhow::Result<()> {
    info!(
        "Bootstrapping {} into '{}' namespace...",
        service.name(),
        config.namespace
    );

    let report = context
        .create_orchestrator()
        .run(config, service)
        .await
        .with_context(|| format!("Couldn't bootstrap {}!", service.name()))?;

    match std::env::current_dir() {
        Ok(directory) => {
            if let Err(error) =
                write_snapshot(&directory, &RunSnapshot::new(config, service, &report))
            {
                warn!("{error}");
            }
        }
        Err(error) => warn!("Couldn't determine the working directory, snapshot skipped: {error}"),
    }

    print!("{}", render_report(&report, show_credentials));

    Ok(())
}
