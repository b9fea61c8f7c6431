use anyhow::Context;
use log::warn;

use crate::{
    cli::{GlobalArgs, RepoAddArgs},
    context::CommandContext,
};

pub async fn repo_add(global_args: &GlobalArgs, args: RepoAddArgs) -> anyhow::Result<()> {
    let context = CommandContext::new(global_args);
    let registration = context
        .create_resolver()
        .add_repository(&args.name, &args.url)
        .await
        .with_context(|| format!("Couldn't add repository '{}'!", args.name))?;

    if let Some(reason) = &registration.fallback_reason {
        warn!("The index was downloaded through the HTTP fallback ({reason})");
    }

    println!(
        "Added repository '{}' ({}), index cached at {}",
        registration.entry.name,
        registration.entry.url,
        registration.index_path.display()
    );

    Ok(())
}
