//! Remote service boundary
//!
//! The export pipeline never talks HTTP directly. It consumes two traits:
//!
//! 1. **AccountService**: returns the subscription metadata that lists the
//!    search indexes belonging to an already-authenticated account
//! 2. **SearchService** / **SearchIndex**: per-index ping, introspection and
//!    paged queries
//!
//! `http` provides the production implementations; tests use in-memory fakes.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::export::Document;

pub mod http;

pub use http::{HttpAccountService, HttpSearchService, SolrIndex};

/// One search index discovered from the subscription metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index identifier, e.g. `ABCD-12345`
    pub id: String,
}

impl IndexDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Result of introspecting an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of documents at sampling time
    pub num_documents: u64,
}

/// Paged query request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub page_size: u32,
    /// Sort clause, `<field> asc|desc`
    pub sort: String,
}

impl PageRequest {
    /// Request sorted by `id` ascending, the only order that keeps offset
    /// pagination stable
    pub fn by_id(offset: u64, page_size: u32) -> Self {
        Self {
            offset,
            page_size,
            sort: "id asc".to_string(),
        }
    }
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    /// Documents in index order
    pub documents: Vec<Document>,
    /// Document count reported alongside the page
    pub num_documents: u64,
}

/// Account service returning subscription metadata
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Fetch the raw subscription metadata
    async fn subscription(&self) -> Result<Value>;
}

/// Factory for per-index clients
pub trait SearchService: Send + Sync {
    /// Build a client bound to a single index
    fn index(&self, descriptor: &IndexDescriptor) -> Result<Box<dyn SearchIndex>>;
}

/// Operations the exporter needs from one index
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Check that the index answers
    async fn ping(&self) -> Result<()>;

    /// Sample the document count
    async fn introspect(&self) -> Result<IndexStats>;

    /// Fetch one page of documents
    async fn query(&self, request: &PageRequest) -> Result<QueryPage>;
}
