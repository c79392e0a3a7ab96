//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "shunt",
    bin_name = "shunt",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Materialize projects from templated YAML Shuntfiles",
    long_about = "Shunt resolves YAML documents with template placeholders and \
                  @directives to a fixpoint, then renders the views and copies \
                  the resources a Shuntfile names.",
    after_help = "EXAMPLES:\n\
        \x20 shunt materialize\n\
        \x20 shunt materialize path/to/project -t ~/shared-shunts\n\
        \x20 shunt resolve config.yaml --format json\n\
        \x20 shunt completions bash > /usr/share/bash-completion/completions/shunt",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Materialize the project around a path.
    #[command(
        visible_alias = "m",
        about = "Materialize the nearest Shuntfile",
        after_help = "EXAMPLES:\n\
            \x20 shunt materialize\n\
            \x20 shunt materialize services/api\n\
            \x20 shunt materialize --template-path ../common/shunts --max-passes 8"
    )]
    Materialize(MaterializeArgs),

    /// Resolve a single document and print it.
    #[command(
        visible_alias = "r",
        about = "Resolve a document and print the result",
        after_help = "EXAMPLES:\n\
            \x20 shunt resolve Shuntfile\n\
            \x20 shunt resolve settings.yaml --format json"
    )]
    Resolve(ResolveArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 shunt completions bash > ~/.local/share/bash-completion/completions/shunt\n\
            \x20 shunt completions zsh  > ~/.zfunc/_shunt\n\
            \x20 shunt completions fish > ~/.config/fish/completions/shunt.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the effective configuration.
    #[command(
        about = "Configuration inspection",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 shunt config get resolution.max_passes\n\
            \x20 shunt config list\n\
            \x20 shunt config path"
    )]
    Config(ConfigCommands),
}

// ── shared ────────────────────────────────────────────────────────────────────

/// Knobs of the resolution loop, overriding the configuration.
#[derive(Debug, Args)]
pub struct ResolutionArgs {
    /// Cap on resolution iterations.
    #[arg(long = "max-passes", value_name = "N", help = "Maximum resolution passes")]
    pub max_passes: Option<usize>,

    /// Keep intermediate documents in temp files while each pass runs.
    #[arg(long = "spool", help = "Spool intermediate documents to temp files")]
    pub spool: bool,

    /// Extra template directory, searched after the project's own.
    #[arg(
        short = 't',
        long = "template-path",
        value_name = "DIR",
        help = "Additional template directory (repeatable)"
    )]
    pub template_paths: Vec<PathBuf>,
}

// ── materialize ───────────────────────────────────────────────────────────────

/// Arguments for `shunt materialize`.
#[derive(Debug, Args)]
pub struct MaterializeArgs {
    /// Where to start looking for a Shuntfile.
    #[arg(value_name = "PATH", default_value = ".", help = "Start directory")]
    pub path: PathBuf,

    #[command(flatten)]
    pub resolution: ResolutionArgs,
}

// ── resolve ───────────────────────────────────────────────────────────────────

/// Arguments for `shunt resolve`.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Document to resolve.
    #[arg(value_name = "FILE", help = "Document to resolve")]
    pub file: PathBuf,

    /// Output format of the resolved document.
    #[arg(
        long = "format",
        value_enum,
        default_value = "yaml",
        help = "Document output format"
    )]
    pub format: DocumentFormat,

    #[command(flatten)]
    pub resolution: ResolutionArgs,
}

/// Serialization of a resolved document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `shunt completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `shunt config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `resolution.max_passes`.
        key: String,
    },
    /// Print all configuration values.
    List,
    /// Print the path to the active configuration file.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────
