use clap::{Args, Subcommand};

/// Authentication commands.
#[derive(Clone, Debug, Subcommand)]
pub enum AuthCommands {
    /// Create an account and its profile.
    Signup(AuthSignupArgs),
    /// Sign in with email and password.
    Login(AuthLoginArgs),
    /// Revoke the session and clear stored credentials.
    Logout,
    /// Show current auth status.
    Status,
    /// Mark an account's email address as verified.
    Confirm {
        #[arg(long)]
        email: String,
    },
}

#[derive(Clone, Debug, Args)]
pub struct AuthSignupArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthLoginArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
}
