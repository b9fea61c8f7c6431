use infractl_core::{
    config::{BootstrapConfig, Credential, GitLabConfig, SmtpConfig},
    services::GitLabService,
};

use crate::{
    cli::{GitLabArgs, GlobalArgs, SmtpArgs},
    context::CommandContext,
    prompt::{network_block_or_prompt, secret_or_prompt, value_or_prompt, OperatorInput},
};

use super::{bootstrap, build_config, OperatorAnswers};

pub async fn gitlab(
    global_args: &GlobalArgs,
    args: GitLabArgs,
    input: &mut impl OperatorInput,
) -> anyhow::Result<()> {
    let context = CommandContext::new(global_args);
    let (config, service) = prepare_config(&context, args, input)?;

    bootstrap(&context, &config, &service, global_args.show_credentials).await
}

fn prepare_config(
    context: &CommandContext,
    args: GitLabArgs,
    input: &mut impl OperatorInput,
) -> anyhow::Result<(BootstrapConfig, GitLabService)> {
    let network_block = network_block_or_prompt(input, args.bootstrap.network_cidr.to_owned())?;
    let domain = value_or_prompt(
        input,
        args.bootstrap.domain.to_owned(),
        "Domain (e.g. example.lab): ",
    )?;
    let admin_credential = secret_or_prompt(
        input,
        args.root_password.to_owned(),
        "GitLab initial root password: ",
    )?;

    let service = GitLabService::new(GitLabConfig {
        hostname: args.hostname,
        https: args.https,
        issuer_email: args.issuer_email,
        smtp: smtp_config(args.smtp, domain.trim()),
        storage_class: args.storage_class,
    });

    let config = build_config(
        context,
        &args.bootstrap,
        &service,
        OperatorAnswers {
            network_block,
            domain,
            admin_credential,
            config_credential: None,
        },
    )?;

    Ok((config, service))
}

fn smtp_config(args: SmtpArgs, domain: &str) -> Option<SmtpConfig> {
    let host = args.smtp_host?;

    Some(SmtpConfig {
        host,
        port: args.smtp_port,
        user: args.smtp_user,
        password: Credential::new(args.smtp_password),
        from: args.smtp_from.unwrap_or_else(|| format!("gitlab@{domain}")),
        from_name: args.smtp_from_name,
    })
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::prepare_config;
    use crate::{
        cli::{Cli, Commands},
        context::CommandContext,
        prompt::tests::ScriptedInput,
    };

    #[test]
    fn builds_the_gitlab_settings() {
        let cli = Cli::try_parse_from([
            "infractl",
            "gitlab",
            "--network-cidr",
            "172.16.0.0/20",
            "--domain",
            "armani.lab",
            "--root-password",
            "S3cret!",
            "--https",
            "--issuer-email",
            "ops@armani.lab",
            "--smtp-host",
            "smtp.armani.lab",
        ])
        .unwrap();
        let context = CommandContext::new(&cli.global_args);
        let Commands::Gitlab(args) = cli.command else {
            panic!("expected the gitlab command");
        };

        let mut input = ScriptedInput::default();
        let (config, service) = prepare_config(&context, args, &mut input).unwrap();

        assert_eq!(config.release_name, "gitlab");
        assert_eq!(config.repository.chart, "gitlab/gitlab");
        assert_eq!(service.config.url(config.domain()), "https://gitlab.armani.lab");

        let smtp = service.config.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from, "gitlab@armani.lab");
        assert_eq!(smtp.from_name, "GitLab");
    }

    #[test]
    fn smtp_stays_off_without_a_host() {
        let cli = Cli::try_parse_from(["infractl", "gitlab"]).unwrap();
        let context = CommandContext::new(&cli.global_args);
        let Commands::Gitlab(mut args) = cli.command else {
            panic!("expected the gitlab command");
        };
        args.root_password = None;

        let mut input = ScriptedInput::new(&["192.168.100.0/24", "armani.lab", "S3cret!"]);
        let (config, service) = prepare_config(&context, args, &mut input).unwrap();

        assert!(service.config.smtp.is_none());
        assert_eq!(config.admin_credential.expose(), "S3cret!");
        assert_eq!(input.prompts[2], "GitLab initial root password: ");
    }
}
