use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "modman")]
#[command(about = "Inspect and toggle Maya module descriptor files")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Base directory (default: ~/.modman)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Module search directory (repeatable, overrides MAYA_MODULE_PATH)
    #[arg(long = "module-path", value_name = "DIR", global = true)]
    pub module_paths: Vec<PathBuf>,

    /// Maya version to check modules against (e.g., 2024)
    #[arg(long, global = true)]
    pub maya_version: Option<String>,

    /// Platform to check modules against (linux, win64, mac)
    #[arg(long, global = true)]
    pub platform: Option<String>,

    /// UI locale to check modules against (e.g., en_US)
    #[arg(long, global = true)]
    pub locale: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List module descriptor files found on the search path
    Files,

    /// List modules of every descriptor file
    List {
        /// Include modules that do not match the current environment
        #[arg(short, long)]
        all: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show details of a module
    Show {
        /// Module name
        name: String,
    },

    /// Enable a module
    Enable {
        #[command(flatten)]
        target: ModuleTarget,
    },

    /// Disable a module
    Disable {
        #[command(flatten)]
        target: ModuleTarget,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Selects the module lines to enable or disable
#[derive(clap::Args, Debug, Clone)]
pub struct ModuleTarget {
    /// Module name
    pub name: String,

    /// Only lines with this module version
    #[arg(long = "module-version", value_name = "VERSION")]
    pub version: Option<String>,

    /// Only lines in this descriptor file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Also change lines that do not match the current environment
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., environment.maya_version)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., search.paths)
        key: String,

        /// Value to set (e.g., "/studio/modules,/opt/modules" or "2024")
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}
