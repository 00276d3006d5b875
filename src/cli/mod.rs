//! Command-line interface for search-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Applying argument overrides to the configuration
//! - Utility subcommands (version, completion, config)

use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::config::{Config, LogLevel};
use crate::error::Result;
use crate::export::{FailurePolicy, StagingLayout};

pub mod completion;

/// Export search indexes to XML files
#[derive(Parser, Debug)]
#[command(
    name = "search-export",
    version,
    about = "Export one or all search indexes of a subscription",
    long_about = "Exports every document of the search indexes that belong to a subscription
into one XML file per document, optionally compressed into a .tar.gz per index."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for search-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export one or all indexes of the subscription
    Export(ExportArgs),

    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Arguments of the `export` subcommand
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Directory the export is saved to
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Only export this index, e.g. ABCD-12345
    #[arg(short = 'i', long, value_name = "ID")]
    pub index: Option<String>,

    /// Staging directory (defaults to PATH)
    #[arg(short = 't', long = "tmp", value_name = "DIR")]
    pub tmp: Option<PathBuf>,

    /// Store each index as <ID>-<timestamp>.tar.gz
    #[arg(short = 'c', long)]
    pub compressed: bool,

    /// Keep going with the next index when one fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Fail instead of creating a missing destination directory
    #[arg(long)]
    pub no_create: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and environment, then apply arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        if let Commands::Export(export) = &args.command {
            Self::apply_export_args(config, export);
        }
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply export-related CLI arguments to configuration
    fn apply_export_args(config: &mut Config, args: &ExportArgs) {
        if let Some(tmp) = &args.tmp {
            config.export.staging_dir = Some(tmp.clone());
        }
        if args.compressed {
            config.export.compressed = true;
        }
        if args.continue_on_error {
            config.export.failure_policy = FailurePolicy::Continue;
        }
        if args.no_create {
            config.export.create_destination = false;
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Export arguments, when the export subcommand was given
    pub fn export_args(&self) -> Option<&ExportArgs> {
        match &self.args.command {
            Commands::Export(args) => Some(args),
            _ => None,
        }
    }

    /// Staging layout for an export into `destination`
    pub fn staging_layout(&self, destination: &Path) -> StagingLayout {
        StagingLayout::new(destination, self.config.export.staging_dir.clone())
            .with_create_missing(self.config.export.create_destination)
    }

    /// Whether to draw progress bars
    pub fn show_progress(&self) -> bool {
        let disabled = self.export_args().is_some_and(|a| a.no_progress);
        !disabled && !self.args.quiet && std::io::stderr().is_terminal()
    }

    /// Handle utility subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if a subcommand was handled, false to export
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Version => {
                self.show_version();
                Ok(true)
            }
            Commands::Completion { shell } => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Commands::Config { show, validate } => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Commands::Export(_) => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("search-export version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Get the configuration file path in use
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("❌ Configuration file does not exist");
            return;
        }

        match Config::from_file(&path) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("✅ Configuration is valid"),
                Err(e) => println!("❌ Configuration validation failed: {}", e),
            },
            Err(e) => println!("❌ Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration, with the account key masked
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();

        let mut shown = self.config.clone();
        if shown.network.key.is_some() {
            shown.network.key = Some("***".to_string());
        }
        println!("{}", shown.to_toml()?);
        Ok(())
    }
}
