pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "knowme")]
#[command(about = "Concurrent document screening against public registries and sanction lists")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "knowme.toml")]
    pub config: String,

    /// Single-column document file (csv, tsv or txt); overrides the
    /// configured input
    #[arg(short, long)]
    pub input: Option<String>,

    /// Comma-separated service names to run; default is every enabled
    /// service in the configuration
    #[arg(short, long, value_delimiter = ',')]
    pub services: Vec<String>,

    /// Override the configured output directory
    #[arg(short, long)]
    pub output: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log system resource usage between phases
    #[arg(long)]
    pub monitor: Option<bool>,

    /// Validate configuration and input, show the plan, then exit
    #[arg(long)]
    pub dry_run: bool,
}
