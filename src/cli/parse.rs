//! CLI parse: clap types for stubcache. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stubcache CLI - keeps generated stubs of binary modules up to date
#[derive(Parser)]
#[command(name = "stubcache")]
#[command(about = "Refresh the stub cache of a runtime's binary modules")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring the stub cache of one interpreter up to date
    Refresh {
        /// Interpreter home path
        #[arg(long)]
        home: PathBuf,
        /// Runtime version string, e.g. "Python 3.11.4"
        #[arg(long)]
        version: Option<String>,
        /// Library root searched for binaries (repeatable)
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
        /// Stub cache directory (default: derived from the home path)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Home of the base interpreter whose stubs may be reused
        #[arg(long)]
        base_home: Option<PathBuf>,
        /// Library root of the base interpreter (repeatable)
        #[arg(long = "base-root", requires = "base_home")]
        base_roots: Vec<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List stub files and their provenance headers
    Inspect {
        #[arg(long)]
        cache_dir: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the modules whose generation is suppressed
    Blacklist {
        #[arg(long)]
        cache_dir: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Remove stubs whose binaries no longer exist
    Clean {
        #[arg(long)]
        cache_dir: PathBuf,
    },
}
