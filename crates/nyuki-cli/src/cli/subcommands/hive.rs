use clap::{Args, Subcommand};

/// Hive commands.
#[derive(Clone, Debug, Subcommand)]
pub enum HiveCommands {
    /// List hives, optionally only those in one apiary.
    List {
        #[arg(long)]
        apiary: Option<String>,
    },
    /// Create a hive in an apiary.
    Create(HiveCreateArgs),
    /// Update a hive. `--apiary` moves it.
    Update(HiveUpdateArgs),
    /// Delete a hive.
    Delete { id: String },
}

/// Sensor readings shared by create and update.
#[derive(Clone, Debug, Default, Args)]
pub struct MetricsArgs {
    #[arg(long)]
    pub temperature: Option<f64>,
    #[arg(long)]
    pub humidity: Option<f64>,
    #[arg(long)]
    pub weight: Option<f64>,
}

impl MetricsArgs {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none() && self.weight.is_none()
    }
}

#[derive(Clone, Debug, Args)]
pub struct HiveCreateArgs {
    #[arg(long)]
    pub apiary: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub queen_age: Option<i64>,
    #[arg(long)]
    pub queen_color: Option<String>,
    /// healthy, fair, poor, critical
    #[arg(long)]
    pub health: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[command(flatten)]
    pub metrics: MetricsArgs,
}

#[derive(Clone, Debug, Args)]
pub struct HiveUpdateArgs {
    pub id: String,
    /// Move the hive to this apiary.
    #[arg(long)]
    pub apiary: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, conflicts_with = "clear_queen_age")]
    pub queen_age: Option<i64>,
    #[arg(long)]
    pub clear_queen_age: bool,
    #[arg(long, conflicts_with = "clear_queen_color")]
    pub queen_color: Option<String>,
    #[arg(long)]
    pub clear_queen_color: bool,
    #[arg(long)]
    pub health: Option<String>,
    #[arg(long, conflicts_with = "clear_notes")]
    pub notes: Option<String>,
    #[arg(long)]
    pub clear_notes: bool,
    /// Replaces all readings; unset readings are cleared.
    #[command(flatten)]
    pub metrics: MetricsArgs,
}
