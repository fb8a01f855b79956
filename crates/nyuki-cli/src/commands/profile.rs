use anyhow::bail;
use nyuki_core::updates::profile::ProfilePatchBuilder;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::ProfileCommands;
use crate::cli::subcommands::profile::ProfileUpdateArgs;
use crate::commands::shared::optional_field;
use crate::context::AppContext;
use crate::output::output;

/// Handle `nyuki profile <subcommand>`.
pub async fn handle(
    action: &ProfileCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    ctx.require_session()?;
    match action {
        ProfileCommands::Show => match ctx.client.session().profile() {
            Some(profile) => output(&profile, flags.format),
            None => bail!("no profile found for the signed-in user"),
        },
        ProfileCommands::Update(args) => update(args, ctx, flags).await,
    }
}

async fn update(args: &ProfileUpdateArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    validate_update_args(args)?;

    let mut builder = ProfilePatchBuilder::new();
    if let Some(first_name) = &args.first_name {
        builder = builder.first_name(first_name);
    }
    if let Some(last_name) = &args.last_name {
        builder = builder.last_name(last_name);
    }
    if let Some(avatar_url) = optional_field(args.avatar_url.as_ref(), args.clear_avatar_url) {
        builder = builder.avatar_url(avatar_url);
    }

    let profile = ctx.client.session().update_profile(&builder.build()).await?;
    output(&profile, flags.format)
}

fn validate_update_args(args: &ProfileUpdateArgs) -> anyhow::Result<()> {
    if args.first_name.is_none()
        && args.last_name.is_none()
        && args.avatar_url.is_none()
        && !args.clear_avatar_url
    {
        bail!("At least one of --first-name, --last-name, --avatar-url or --clear-avatar-url must be provided");
    }
    Ok(())
}
