//! Clap derive structures for the `playhouse` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// playhouse -- drive a grid of lights spread over many bridges
#[derive(Debug, Parser)]
#[command(
    name = "playhouse",
    version,
    about = "Find, pair and run Hue bridges as one light grid",
    long_about = "Operator tool for a light grid spread over several Hue bridges.\n\n\
        Discovers bridges on the local network, pairs with them, resets nearby\n\
        bulbs and keeps a grid running with automatic rediscovery.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Settings file (defaults to the platform config dir)
    #[arg(long, env = "PLAYHOUSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Bridge setup document (layout, addresses, usernames)
    #[arg(long, env = "PLAYHOUSE_SETUP_FILE", global = true)]
    pub setup_file: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Bridge request timeout in milliseconds (overrides settings)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find bridges via SSDP and the remote lookup service
    #[command(alias = "d")]
    Discover(DiscoverArgs),

    /// Create a username on a bridge (press its link button first)
    Pair(PairArgs),

    /// Factory-reset the bulb closest to a bridge
    ResetBulb(ResetBulbArgs),

    /// List or search the lights of one bridge
    #[command(alias = "l")]
    Lights(LightsArgs),

    /// Load the saved setup and keep the grid alive until Ctrl-C
    Run(RunArgs),

    /// Inspect settings
    Config(ConfigArgs),
}

// ── Subcommand Args ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// SSDP search rounds (0 skips multicast)
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Skip the remote lookup service
    #[arg(long)]
    pub no_lookup: bool,
}

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Bridge address (host or host:port)
    pub address: String,

    /// Application name reported to the bridge
    #[arg(long, default_value = "playhouse")]
    pub devicetype: String,

    /// Ask for a specific username instead of a generated one
    #[arg(long)]
    pub username: Option<String>,
}

#[derive(Debug, Args)]
pub struct ResetBulbArgs {
    /// Bridge address (host or host:port)
    pub address: String,
}

#[derive(Debug, Args)]
pub struct LightsArgs {
    /// Bridge address (host or host:port)
    pub address: String,

    /// Show lights found by the last search
    #[arg(long)]
    pub new: bool,

    /// Start a search for new lights
    #[arg(long, conflicts_with = "new")]
    pub search: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Do not start the reachability monitor
    #[arg(long)]
    pub no_monitor: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective settings as TOML
    Show,

    /// Print the settings and setup file locations
    Path,
}
