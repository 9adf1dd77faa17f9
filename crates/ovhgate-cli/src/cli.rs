//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::{Path, PathBuf};

/// ovhgate - OVHcloud web hosting and domain operations as callable tools
///
/// Runs catalog tools or raw requests against the OVHcloud API using signed
/// requests, OAuth2 client credentials or a caller-supplied bearer token.
#[derive(Parser, Debug)]
#[command(
    name = "ovhgate",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "OVHGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the available tools, or show one tool's input schema
    Tools(ToolsArgs),

    /// Run a single tool
    Call(CallArgs),

    /// Send a raw request to the API
    Request(RequestArgs),

    /// Serve tool calls as line-delimited JSON over stdin/stdout
    Serve(ServeArgs),

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

/// Arguments for the tools command
#[derive(Parser, Debug)]
pub struct ToolsArgs {
    /// Show details for this tool only
    #[arg(value_name = "TOOL")]
    pub name: Option<String>,
}

/// Arguments for the call command
#[derive(Parser, Debug)]
pub struct CallArgs {
    /// Tool name, e.g. list_hosting_services
    #[arg(value_name = "TOOL")]
    pub tool: String,

    /// Tool arguments as a JSON object
    #[arg(short, long, value_name = "JSON")]
    pub args: Option<String>,

    /// Bearer token for this call (bearer auth method only)
    #[arg(long, env = "OVH_BEARER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Arguments for the request command
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(value_name = "METHOD")]
    pub method: String,

    /// Path relative to the API root, e.g. /hosting/web
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Request body as JSON
    #[arg(long, value_name = "JSON")]
    pub body: Option<String>,

    /// Make exactly one attempt
    #[arg(long)]
    pub no_retry: bool,

    /// Bearer token for this request (bearer auth method only)
    #[arg(long, env = "OVH_BEARER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Maximum number of calls processed at the same time
    #[arg(long, default_value = "16")]
    pub max_concurrency: usize,

    /// Bearer token for requests that do not carry their own
    #[arg(long, env = "OVH_BEARER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Arguments for generating shell completions
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl Cli {
    /// Parse command-line arguments
    ///
    /// `.env` is loaded first so flags backed by environment variables,
    /// such as `--token`, see its values.
    pub fn parse_args() -> Self {
        Self::parse_with_env_file(None, std::env::args_os())
    }

    /// Load environment variables from `env_file` (or a `.env` found from
    /// the working directory), then parse `args`
    pub fn parse_with_env_file<I, T>(env_file: Option<&Path>, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let _ = match env_file {
            Some(path) => dotenv::from_path(path),
            None => dotenv::dotenv().map(|_| ()),
        };
        Self::parse_from(args)
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}

impl Commands {
    /// Subcommand name, safe to log
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Tools(_) => "tools",
            Commands::Call(_) => "call",
            Commands::Request(_) => "request",
            Commands::Serve(_) => "serve",
            Commands::Completions(_) => "completions",
        }
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}
