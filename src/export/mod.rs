//! Export pipeline for search indexes
//!
//! This module exports every document of one or more search indexes into
//! per-document XML files, optionally bundled into a `.tar.gz` archive.
//!
//! # Architecture
//!
//! The pipeline is built from small, single-purpose components:
//!
//! 1. **IndexResolver**: discovers the indexes of a subscription
//! 2. **PagedQuery**: pages through one index by offset, sorted by `id`
//! 3. **XmlEncoder**: turns a document into a `<doc>` fragment
//! 4. **StagingArea**: writes files and publishes them to the destination
//! 5. **archive**: bundles a staging area into one compressed artifact
//!
//! These components are orchestrated by the **ExportCoordinator**.
//!
//! # Example
//!
//! ```no_run
//! use search_export::client::{HttpAccountService, HttpSearchService};
//! use search_export::config::Config;
//! use search_export::export::{ExportCoordinator, ExportOptions, StagingLayout};
//!
//! # async fn example() -> search_export::Result<()> {
//! let config = Config::default();
//! let account = HttpAccountService::new(&config.network)?;
//! let search = HttpSearchService::new(&config.search)?;
//! let layout = StagingLayout::new("/tmp/as_export", None);
//!
//! let coordinator = ExportCoordinator::new(&account, &search, layout, ExportOptions::default());
//! let report = coordinator.run(Some("ABCD-12345")).await?;
//! println!("{} documents exported", report.total_documents());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod coordinator;
pub mod document;
pub mod encoder;
pub mod pagination;
pub mod progress;
pub mod resolver;
pub mod sanitize;
pub mod staging;

pub use coordinator::{
    ExportCoordinator, ExportOptions, FailurePolicy, IndexFailure, IndexReport, RunReport,
};
pub use document::{Document, FieldValue};
pub use encoder::XmlEncoder;
pub use pagination::{DocumentStream, ExportJob, PagedQuery};
pub use progress::ProgressTracker;
pub use resolver::IndexResolver;
pub use sanitize::sanitize_file_name;
pub use staging::{StagingArea, StagingLayout};
