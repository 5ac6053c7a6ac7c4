use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "feed-keeper")]
#[command(about = "Feed and YouTube ingestion with an embedded dedup store")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration
    #[arg(long, global = true, env = "FEEDER_CONFIG", default_value = "feeder.toml")]
    pub config: String,

    /// Path to the store file (defaults to feeder.db next to the executable)
    #[arg(long, global = true, env = "FEEDER_DB_PATH")]
    pub db: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll plain feeds and YouTube channels until interrupted
    Run {
        /// Run a single pass of both services and exit
        #[arg(long)]
        once: bool,
    },

    /// List buckets with their record counts
    Buckets,

    /// Print the newest records of a bucket
    Show {
        /// Feed name or YouTube channel id
        bucket: String,

        /// Maximum number of records to print
        #[arg(long, default_value_t = 10)]
        max: usize,

        /// Hide items flagged as junk
        #[arg(long)]
        skip_junk: bool,
    },

    /// Remove a record by its identifier (GUID or video id)
    Remove {
        bucket: String,
        id: String,
    },

    /// Keep only the newest records of a bucket
    Trim {
        bucket: String,

        /// Number of records to keep
        #[arg(long)]
        keep: usize,
    },
}
