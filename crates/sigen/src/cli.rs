//! Clap derive structures for the `sigen` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sigen -- control a Sigenergy solar/battery station from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "sigen",
    version,
    about = "Monitor and control Sigenergy solar/battery systems",
    long_about = "Talks to the Sigenergy cloud: station info, energy flow, \
        operational modes, smart loads,\nnorthbound (developer) API calls, \
        and the live MQTT telemetry stream.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "SIGEN_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Cloud region: eu, cn, apac, us (overrides profile)
    #[arg(long, short = 'r', env = "SIGEN_REGION", global = true)]
    pub region: Option<String>,

    /// API base URL (overrides the region's endpoint)
    #[arg(long, env = "SIGEN_BASE_URL", global = true, hide = true)]
    pub base_url: Option<String>,

    /// Account username (password login)
    #[arg(long, short = 'u', env = "SIGEN_USERNAME", global = true)]
    pub username: Option<String>,

    /// Northbound app key (key login)
    #[arg(long, env = "SIGEN_APP_KEY", global = true, hide_env = true)]
    pub app_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SIGEN_OUTPUT",
        default_value = "table",
        global = true
    )]
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "SIGEN_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
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
    /// YAML
    Yaml,
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
    /// Show station identity and capabilities
    #[command(alias = "st")]
    Station,

    /// Show the live energy flow
    #[command(alias = "flow")]
    Energy,

    /// List, inspect and switch operational modes
    #[command(alias = "mode")]
    Modes(ModesArgs),

    /// List and switch smart loads
    #[command(alias = "load")]
    Loads(LoadsArgs),

    /// Northbound (developer) API: onboarding and mode control
    #[command(alias = "nb")]
    Northbound(NorthboundArgs),

    /// Live MQTT telemetry stream and instructions
    Stream(StreamArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  MODES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ModesArgs {
    #[command(subcommand)]
    pub command: ModesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ModesCommand {
    /// List built-in modes and custom energy profiles
    #[command(alias = "ls")]
    List,

    /// Show the active mode
    Current,

    /// Switch mode by name, or by raw value with --raw
    Set {
        /// Mode or profile name (case and separators ignored)
        #[arg(required_unless_present = "raw")]
        name: Option<String>,

        /// Raw operation mode value
        #[arg(long, conflicts_with = "name")]
        raw: Option<i64>,

        /// Profile id sent with --raw (custom profiles use mode 9)
        #[arg(long, requires = "raw", allow_hyphen_values = true)]
        profile_id: Option<i64>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SMART LOADS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoadsArgs {
    #[command(subcommand)]
    pub command: LoadsCommand,
}

#[derive(Debug, Subcommand)]
pub enum LoadsCommand {
    /// List smart loads with consumption counters
    #[command(alias = "ls")]
    List,

    /// Switch a smart load on
    On(LoadTarget),

    /// Switch a smart load off
    Off(LoadTarget),
}

#[derive(Debug, Args)]
pub struct LoadTarget {
    /// Load name (case and separators ignored)
    #[arg(required_unless_present = "path")]
    pub name: Option<String>,

    /// Load path number instead of a name
    #[arg(long, conflicts_with = "name")]
    pub path: Option<i64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NORTHBOUND
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct NorthboundArgs {
    #[command(subcommand)]
    pub command: NorthboundCommand,
}

#[derive(Debug, Subcommand)]
pub enum NorthboundCommand {
    /// Authorize systems for this app
    Onboard {
        /// System ids (defaults to the station id)
        system_ids: Vec<String>,
    },

    /// Revoke authorization for systems
    Offboard {
        /// System ids (defaults to the station id)
        system_ids: Vec<String>,
    },

    /// Read the energy-storage operating mode
    Query {
        /// System id (defaults to the station id)
        #[arg(long, short = 's')]
        system: Option<String>,
    },

    /// Switch the energy-storage operating mode
    Switch {
        /// Target mode
        mode: NorthboundModeArg,

        /// System id (defaults to the station id)
        #[arg(long, short = 's')]
        system: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum NorthboundModeArg {
    /// Maximum self-consumption
    Msc,
    /// Fully feed-in to grid
    Ffg,
    /// Virtual power plant
    Vpp,
    /// North bound (instructions accepted)
    Nbi,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STREAM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StreamArgs {
    #[command(subcommand)]
    pub command: StreamCommand,
}

#[derive(Debug, Subcommand)]
pub enum StreamCommand {
    /// Print stream events until interrupted
    Watch {
        /// Stop after this many events
        #[arg(long, short = 'n')]
        count: Option<usize>,

        /// Only show events of this kind
        #[arg(long, short = 'k')]
        kind: Option<EventKind>,
    },

    /// Publish an instruction batch (JSON array, at most 24 entries)
    Send {
        /// File holding the JSON array of commands ("-" for stdin)
        file: PathBuf,

        /// Seconds to wait for the stream to come up
        #[arg(long, default_value = "30")]
        wait: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventKind {
    Telemetry,
    Change,
    Alarm,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Set a value on the active profile
    Set {
        /// Profile key (e.g. region, auth_mode, username, system_ids)
        key: String,

        /// Value to set (comma-separated for system_ids)
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the profile's password or app secret in the system keyring
    SetSecret {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
