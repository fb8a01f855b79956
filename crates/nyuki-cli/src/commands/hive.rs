use anyhow::bail;
use nyuki_core::entities::{Hive, HiveMetrics, NewHive};
use nyuki_core::enums::HiveHealth;
use nyuki_core::updates::hive::HivePatchBuilder;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::HiveCommands;
use crate::cli::subcommands::hive::{HiveCreateArgs, HiveUpdateArgs, MetricsArgs};
use crate::commands::shared::{Deleted, optional_field, parse_enum};
use crate::context::AppContext;
use crate::output::output;

/// Handle `nyuki hive <subcommand>`.
pub async fn handle(
    action: &HiveCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    ctx.require_loaded().await?;
    match action {
        HiveCommands::List { apiary } => {
            let hives = match apiary {
                Some(apiary_id) => {
                    if ctx.client.apiaries().get(apiary_id).is_none() {
                        bail!("apiary {apiary_id} not found");
                    }
                    ctx.client.hives_in_apiary(apiary_id)
                }
                None => {
                    let mut all: Vec<Hive> = ctx.client.hives().snapshot().iter().cloned().collect();
                    all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
                    all
                }
            };
            output(&hives, flags.format)
        }
        HiveCommands::Create(args) => create(args, ctx, flags).await,
        HiveCommands::Update(args) => update(args, ctx, flags).await,
        HiveCommands::Delete { id } => {
            ctx.client.delete_hive(id).await?;
            output(&Deleted { deleted: id }, flags.format)
        }
    }
}

async fn create(args: &HiveCreateArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let health = match &args.health {
        Some(raw) => parse_enum::<HiveHealth>(raw, "health")?,
        None => HiveHealth::default(),
    };
    let hive = ctx
        .client
        .create_hive(NewHive {
            apiary_id: args.apiary.clone(),
            name: args.name.clone(),
            queen_age: args.queen_age,
            queen_color: args.queen_color.clone(),
            health,
            notes: args.notes.clone(),
            metrics: metrics(&args.metrics),
        })
        .await?;
    output(&hive, flags.format)
}

async fn update(args: &HiveUpdateArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    validate_update_args(args)?;

    let mut builder = HivePatchBuilder::new();
    if let Some(apiary_id) = &args.apiary {
        builder = builder.apiary_id(apiary_id);
    }
    if let Some(name) = &args.name {
        builder = builder.name(name);
    }
    if let Some(queen_age) = optional_field(args.queen_age.as_ref(), args.clear_queen_age) {
        builder = builder.queen_age(queen_age);
    }
    if let Some(queen_color) = optional_field(args.queen_color.as_ref(), args.clear_queen_color) {
        builder = builder.queen_color(queen_color);
    }
    if let Some(raw) = &args.health {
        builder = builder.health(parse_enum(raw, "health")?);
    }
    if let Some(notes) = optional_field(args.notes.as_ref(), args.clear_notes) {
        builder = builder.notes(notes);
    }
    if !args.metrics.is_empty() {
        builder = builder.metrics(metrics(&args.metrics));
    }

    let hive = ctx.client.update_hive(&args.id, builder.build()).await?;
    output(&hive, flags.format)
}

const fn metrics(args: &MetricsArgs) -> HiveMetrics {
    HiveMetrics {
        temperature: args.temperature,
        humidity: args.humidity,
        weight: args.weight,
    }
}

fn validate_update_args(args: &HiveUpdateArgs) -> anyhow::Result<()> {
    if args.apiary.is_none()
        && args.name.is_none()
        && args.queen_age.is_none()
        && !args.clear_queen_age
        && args.queen_color.is_none()
        && !args.clear_queen_color
        && args.health.is_none()
        && args.notes.is_none()
        && !args.clear_notes
        && args.metrics.is_empty()
    {
        bail!(
            "At least one of --apiary, --name, --queen-age, --queen-color, --health, --notes, a --clear-* flag or a metric must be provided"
        );
    }
    Ok(())
}
