use infractl_core::{
    config::BootstrapConfig, services::OpenLdapService, validation::derive_base_identifier,
};

use crate::{
    cli::{GlobalArgs, OpenLdapArgs},
    context::CommandContext,
    prompt::{network_block_or_prompt, secret_or_prompt, value_or_prompt, OperatorInput},
};

use super::{bootstrap, build_config, OperatorAnswers};

pub async fn openldap(
    global_args: &GlobalArgs,
    args: OpenLdapArgs,
    input: &mut impl OperatorInput,
) -> anyhow::Result<()> {
    let context = CommandContext::new(global_args);
    let config = prepare_config(&context, args, input)?;

    bootstrap(&context, &config, &OpenLdapService, global_args.show_credentials).await
}

fn prepare_config(
    context: &CommandContext,
    args: OpenLdapArgs,
    input: &mut impl OperatorInput,
) -> anyhow::Result<BootstrapConfig> {
    let network_block = network_block_or_prompt(input, args.bootstrap.network_cidr.to_owned())?;
    let domain = value_or_prompt(
        input,
        args.bootstrap.domain.to_owned(),
        "Domain (e.g. example.lab): ",
    )?;
    let base_dn = derive_base_identifier(&domain);

    input.notify(&format!("LDAP admin DN will be: cn=admin,{base_dn}"));

    let admin_credential = secret_or_prompt(
        input,
        args.admin_password.to_owned(),
        &format!("LDAP admin password (for cn=admin,{base_dn}): "),
    )?;
    let config_credential = secret_or_prompt(
        input,
        args.config_password.to_owned(),
        "LDAP *config* admin password (cn=admin,cn=config) [enter to reuse same]: ",
    )?;

    build_config(
        context,
        &args.bootstrap,
        &OpenLdapService,
        OperatorAnswers {
            network_block,
            domain,
            admin_credential,
            config_credential: Some(config_credential),
        },
    )
}
