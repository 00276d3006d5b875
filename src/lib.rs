//! Search Index Export Library
//!
//! This library exports every document of a hosted search index into
//! per-document XML files, optionally bundled into a compressed archive.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `client`: Account and search service clients
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Export pipeline (pagination, encoding, staging, archiving)
//!
//! # Example
//!
//! ```no_run
//! use search_export::client::{HttpAccountService, HttpSearchService};
//! use search_export::export::{ExportCoordinator, StagingLayout};
//! use search_export::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let account = HttpAccountService::new(&config.network)?;
//!     let search = HttpSearchService::new(&config.search)?;
//!
//!     let layout = StagingLayout::new("/tmp/as_export", config.export.staging_dir.clone());
//!     let coordinator =
//!         ExportCoordinator::new(&account, &search, layout, config.export_options(false));
//!     let report = coordinator.run(None).await?;
//!
//!     println!("Exported {} documents", report.total_documents());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportCoordinator, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
