//! Error handling for export runs.
//!
//! The error kinds mirror the failure classes of an export:
//! - `ConfigurationError`: bad destination or settings
//! - `DiscoveryError`: no usable index list
//! - `EmptyIndexError`: introspection without a document count
//! - `FilesystemError`: any directory or file failure
//! - `NetworkError`: account or search service failures
//!
//! # Example
//!
//! ```rust,no_run
//! use search_export::error::{ExportError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ExportError::EmptyIndex("ABCD-12345".to_string()))
//! }
//!
//! if let Err(e) = example_operation() {
//!     eprintln!("{}: {}", e.kind(), e);
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    ConfigError, DiscoveryError, ExportError, FilesystemError, NetworkError, Result,
};
