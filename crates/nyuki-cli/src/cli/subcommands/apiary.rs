use clap::{Args, Subcommand};

/// Apiary commands.
#[derive(Clone, Debug, Subcommand)]
pub enum ApiaryCommands {
    /// List apiaries with their hive counts.
    List,
    /// Create an apiary.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Update an apiary.
    Update(ApiaryUpdateArgs),
    /// Delete an apiary that has no hives.
    Delete { id: String },
}

#[derive(Clone, Debug, Args)]
pub struct ApiaryUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    #[arg(long)]
    pub clear_description: bool,
    #[arg(long, conflicts_with = "clear_notes")]
    pub notes: Option<String>,
    #[arg(long)]
    pub clear_notes: bool,
}
