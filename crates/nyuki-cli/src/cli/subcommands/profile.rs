use clap::{Args, Subcommand};

/// Profile commands.
#[derive(Clone, Debug, Subcommand)]
pub enum ProfileCommands {
    /// Show the signed-in user's profile.
    Show,
    /// Update profile fields.
    Update(ProfileUpdateArgs),
}

#[derive(Clone, Debug, Args)]
pub struct ProfileUpdateArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long, conflicts_with = "clear_avatar_url")]
    pub avatar_url: Option<String>,
    #[arg(long)]
    pub clear_avatar_url: bool,
}
