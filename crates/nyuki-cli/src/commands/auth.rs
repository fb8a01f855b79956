use nyuki_core::entities::{Profile, ProfileFields};
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AuthCommands;
use crate::cli::subcommands::auth::{AuthLoginArgs, AuthSignupArgs};
use crate::context::AppContext;
use crate::output::output;

#[derive(Serialize)]
struct SignupResponse {
    user_id: String,
    signed_in: bool,
    /// Set when the account must confirm its email before signing in.
    email_verification_required: bool,
    profile: Option<Profile>,
    warning: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    user_id: String,
    email: String,
    expires_at: String,
    profile: Option<Profile>,
}

#[derive(Serialize)]
struct AuthStatusResponse {
    authenticated: bool,
    user_id: Option<String>,
    email: Option<String>,
    expires_at: Option<String>,
    token_source: Option<&'static str>,
    profile: Option<Profile>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Handle `nyuki auth <subcommand>`.
pub async fn handle(
    action: &AuthCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        AuthCommands::Signup(args) => signup(args, ctx, flags).await,
        AuthCommands::Login(args) => login(args, ctx, flags).await,
        AuthCommands::Logout => logout(ctx, flags).await,
        AuthCommands::Status => status(ctx, flags),
        AuthCommands::Confirm { email } => confirm(email, ctx, flags).await,
    }
}

async fn signup(args: &AuthSignupArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let fields = ProfileFields {
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
        avatar_url: args.avatar_url.clone(),
    };
    let outcome = ctx
        .client
        .sign_up(&args.email, &args.password, fields)
        .await?;
    output(
        &SignupResponse {
            user_id: outcome.user_id,
            signed_in: outcome.session.is_some(),
            email_verification_required: outcome.session.is_none(),
            profile: outcome.profile,
            warning: outcome.warning.map(|w| w.to_string()),
        },
        flags.format,
    )
}

async fn login(args: &AuthLoginArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let session = ctx.client.sign_in(&args.email, &args.password).await?;
    output(
        &LoginResponse {
            user_id: session.user_id,
            email: session.email,
            expires_at: session.expires_at.to_rfc3339(),
            profile: ctx.client.session().profile(),
        },
        flags.format,
    )
}

async fn logout(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let message = if ctx.client.session().current().is_some() {
        ctx.client.sign_out().await?;
        "signed out"
    } else {
        "not signed in"
    };
    output(
        &MessageResponse {
            message: message.into(),
        },
        flags.format,
    )
}

fn status(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let session = ctx.client.session().current();
    output(
        &AuthStatusResponse {
            authenticated: session.is_some(),
            user_id: session.as_ref().map(|s| s.user_id.clone()),
            email: session.as_ref().map(|s| s.email.clone()),
            expires_at: session.as_ref().map(|s| s.expires_at.to_rfc3339()),
            token_source: ctx.tokens.detect_source(),
            profile: ctx.client.session().profile(),
        },
        flags.format,
    )
}

async fn confirm(email: &str, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    ctx.service.confirm_email(email).await?;
    output(
        &MessageResponse {
            message: format!("{email} confirmed; run `nyuki auth login`"),
        },
        flags.format,
    )
}
