//! Offset pagination over a search index
//!
//! This module turns repeated `query` calls into a stream of document pages.
//! The stream stops once the sampled document count has been reached, or as
//! soon as the index returns an empty page, whichever comes first.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::client::{PageRequest, SearchIndex};
use crate::error::Result;

use super::document::Document;

/// Page size used when none is configured
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Trait for streaming documents page by page
#[async_trait]
pub trait DocumentStream: Send {
    /// Fetch the next page of documents
    ///
    /// # Returns
    /// * `Result<Option<Vec<Document>>>` - Next page, or None if exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>>;
}

/// Per-index progress state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub index_id: String,
    /// Sampled count, a target rather than a bound
    pub num_documents: u64,
    pub processed_count: u64,
    /// Advanced by the size of each received page
    pub offset: u64,
}

impl ExportJob {
    pub fn new(index_id: impl Into<String>, num_documents: u64) -> Self {
        Self {
            index_id: index_id.into(),
            num_documents,
            processed_count: 0,
            offset: 0,
        }
    }

    /// Whether the sampled count has been reached
    pub fn is_complete(&self) -> bool {
        self.processed_count >= self.num_documents
    }

    fn record_page(&mut self, received: usize) {
        self.processed_count += received as u64;
        self.offset += received as u64;
    }
}

/// How a paged query ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Still pages to fetch
    Running,
    /// Processed count reached the sampled count
    TargetReached,
    /// Index returned an empty page before the target was reached
    EmptyPage,
}

/// Paged query against one index, sorted by `id` ascending
pub struct PagedQuery<'a> {
    index: &'a dyn SearchIndex,
    page_size: u32,
    job: ExportJob,
    state: Exhaustion,
}

impl<'a> PagedQuery<'a> {
    /// Create a new paged query
    ///
    /// # Arguments
    /// * `index` - Index client to query
    /// * `job` - Progress state, normally fresh from introspection
    /// * `page_size` - Requested rows per query (must be > 0)
    pub fn new(index: &'a dyn SearchIndex, job: ExportJob, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        let state = if job.is_complete() {
            Exhaustion::TargetReached
        } else {
            Exhaustion::Running
        };
        Self {
            index,
            page_size,
            job,
            state,
        }
    }

    pub fn job(&self) -> &ExportJob {
        &self.job
    }

    pub fn exhaustion(&self) -> Exhaustion {
        self.state
    }

    /// Consume the query, returning the final job state
    pub fn into_job(self) -> ExportJob {
        self.job
    }
}

#[async_trait]
impl DocumentStream for PagedQuery<'_> {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        if self.state != Exhaustion::Running {
            return Ok(None);
        }

        let request = PageRequest::by_id(self.job.offset, self.page_size);
        debug!(
            "Querying {} at offset {} (rows {})",
            self.job.index_id, request.offset, request.page_size
        );

        let page = self.index.query(&request).await?;
        let received = page.documents.len();

        if received == 0 {
            warn!(
                "Index {} returned an empty page after {} of {} documents, stopping",
                self.job.index_id, self.job.processed_count, self.job.num_documents
            );
            self.state = Exhaustion::EmptyPage;
            return Ok(None);
        }

        self.job.record_page(received);
        info!("Found {} documents. Exporting...", received);

        if self.job.is_complete() {
            self.state = Exhaustion::TargetReached;
        }

        Ok(Some(page.documents))
    }
}
