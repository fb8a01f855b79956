use anyhow::bail;
use nyuki_core::entities::{Apiary, NewApiary};
use nyuki_core::updates::apiary::ApiaryPatchBuilder;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::ApiaryCommands;
use crate::cli::subcommands::apiary::ApiaryUpdateArgs;
use crate::commands::shared::{Deleted, optional_field};
use crate::context::AppContext;
use crate::output::output;

/// Handle `nyuki apiary <subcommand>`.
pub async fn handle(
    action: &ApiaryCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    ctx.require_loaded().await?;
    match action {
        ApiaryCommands::List => {
            let mut apiaries: Vec<Apiary> = ctx.client.apiaries().snapshot().iter().cloned().collect();
            apiaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            output(&apiaries, flags.format)
        }
        ApiaryCommands::Create {
            name,
            location,
            description,
            notes,
        } => {
            let apiary = ctx
                .client
                .create_apiary(NewApiary {
                    name: name.clone(),
                    location: location.clone(),
                    description: description.clone(),
                    notes: notes.clone(),
                })
                .await?;
            output(&apiary, flags.format)
        }
        ApiaryCommands::Update(args) => update(args, ctx, flags).await,
        ApiaryCommands::Delete { id } => {
            ctx.client.delete_apiary(id).await?;
            output(&Deleted { deleted: id }, flags.format)
        }
    }
}

async fn update(args: &ApiaryUpdateArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    validate_update_args(args)?;

    let mut builder = ApiaryPatchBuilder::new();
    if let Some(name) = &args.name {
        builder = builder.name(name);
    }
    if let Some(location) = &args.location {
        builder = builder.location(location);
    }
    if let Some(description) = optional_field(args.description.as_ref(), args.clear_description) {
        builder = builder.description(description);
    }
    if let Some(notes) = optional_field(args.notes.as_ref(), args.clear_notes) {
        builder = builder.notes(notes);
    }

    let apiary = ctx.client.update_apiary(&args.id, builder.build()).await?;
    output(&apiary, flags.format)
}

fn validate_update_args(args: &ApiaryUpdateArgs) -> anyhow::Result<()> {
    if args.name.is_none()
        && args.location.is_none()
        && args.description.is_none()
        && !args.clear_description
        && args.notes.is_none()
        && !args.clear_notes
    {
        bail!(
            "At least one of --name, --location, --description, --clear-description, --notes or --clear-notes must be provided"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ApiaryUpdateArgs, validate_update_args};

    fn args() -> ApiaryUpdateArgs {
        ApiaryUpdateArgs {
            id: "apy-1".into(),
            name: None,
            location: None,
            description: None,
            clear_description: false,
            notes: None,
            clear_notes: false,
        }
    }

    #[test]
    fn rejects_noop_update() {
        let err = validate_update_args(&args()).expect_err("should fail");
        assert!(err.to_string().contains("At least one of"));
    }

    #[test]
    fn accepts_single_field() {
        let mut update = args();
        update.location = Some("Arusha".into());
        assert!(validate_update_args(&update).is_ok());

        let mut clear = args();
        clear.clear_notes = true;
        assert!(validate_update_args(&clear).is_ok());
    }
}
