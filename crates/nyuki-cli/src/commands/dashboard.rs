use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Handle `nyuki dashboard`.
pub async fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    ctx.require_loaded().await?;
    output(&ctx.client.dashboard(), flags.format)
}
