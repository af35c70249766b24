use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gcex",
    version,
    about = "Explore Compute Engine instances and move RHEL disks from BYOS to PAYG licensing"
)]
pub struct Cli {
    /// Google Cloud project ID (prompted for when omitted)
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Path to config file [default: gcex.toml if present]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress log output on stderr
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto, global = true)]
    pub output: OutputFormat,

    /// Run one action and exit instead of opening the menu
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List every instance in the project
    List,

    /// Write the instance list to {project}-instances.yml
    Export,

    /// Switch the instances in the export file from BYOS to PAYG licenses
    Convert {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Start an instance
    Start {
        name: String,
        #[arg(short, long)]
        zone: String,
    },

    /// Stop an instance
    Stop {
        name: String,
        #[arg(short, long)]
        zone: String,
    },

    /// Record a license URL in an instance's metadata (disk license unchanged)
    Annotate {
        name: String,
        #[arg(short, long)]
        zone: String,
        #[arg(short, long)]
        license: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text, with spinners when attached to a terminal
    Auto,
    /// Plain text without spinners
    Plain,
    /// JSON lines on stdout
    Json,
}
