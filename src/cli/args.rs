//! CLI argument definitions using clap derive

use crate::config::Config;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Morph - local caches for source mirrors and build artifacts
///
/// Mirrors git repositories (seeded from pre-packed bundles when a bundle
/// server is configured), resolves refs to commits and manages the local
/// artifact cache.
#[derive(Parser, Debug)]
#[command(name = "morph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "MORPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, global = true, env = "MORPH_CACHEDIR")]
    pub cachedir: Option<PathBuf>,

    /// Base URL of the bundle server
    #[arg(long, global = true, env = "MORPH_BUNDLE_SERVER")]
    pub bundle_server: Option<String>,

    /// Give up on fetches and clones after N seconds (0 = never)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref dir) = self.cachedir {
            config.cache.dir = Some(dir.clone());
        }
        if let Some(ref server) = self.bundle_server {
            config.cache.bundle_server = Some(server.clone());
        }
        if let Some(secs) = self.timeout {
            config.git.timeout_secs = secs;
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the cache key (escaped form) of a repository URL
    Escape {
        /// Repository URL
        url: String,
    },

    /// Manage repository mirrors
    Repo(RepoArgs),

    /// Resolve a ref in a repository to a commit
    Resolve(ResolveArgs),

    /// Manage the artifact cache
    Artifacts(ArtifactsArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the repo command
#[derive(Parser, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub action: RepoAction,
}

/// Repo subcommands
#[derive(Subcommand, Debug)]
pub enum RepoAction {
    /// Mirror a repository unless already cached
    Cache {
        /// Repository name or URL
        name: String,
    },

    /// Check whether a repository is cached (exit status 1 if not)
    Has {
        /// Repository name or URL
        name: String,
    },

    /// Fetch new history into a cached repository
    Update {
        /// Repository name or URL
        name: String,
    },
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Repository name or URL
    pub repo: String,

    /// Branch, tag, ref path or commit id
    pub reference: String,

    /// Do not list submodules
    #[arg(long)]
    pub ignore_submodules: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the artifacts command
#[derive(Parser, Debug)]
pub struct ArtifactsArgs {
    #[command(subcommand)]
    pub action: ArtifactsAction,
}

/// Artifacts subcommands
#[derive(Subcommand, Debug)]
pub enum ArtifactsAction {
    /// List cached artifacts and metadata
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove artifacts not written for a while
    Gc {
        /// Remove artifacts older than N days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every cached artifact
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
