use clap::Subcommand;

use crate::cli::subcommands::{ApiaryCommands, AuthCommands, HiveCommands, ProfileCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Accounts and sessions.
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },
    /// The signed-in user's profile.
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },
    /// Apiaries.
    Apiary {
        #[command(subcommand)]
        action: ApiaryCommands,
    },
    /// Hives.
    Hive {
        #[command(subcommand)]
        action: HiveCommands,
    },
    /// Counts, most recent hives, and apiaries with a possibly stale hive count.
    Dashboard,
}
