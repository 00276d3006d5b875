//! Export coordinator for orchestrating export runs
//!
//! This module brings together index discovery, paged retrieval, XML encoding
//! and staging to export every index of a subscription:
//!
//! 1. Resolve the indexes to export
//! 2. Per index: ping, introspect, open a fresh staging area
//! 3. Page through the index, writing one XML file per document
//! 4. Publish the files, or an archive of them
//!
//! Everything runs sequentially: one index, one page, one file at a time.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::client::{AccountService, IndexDescriptor, SearchService};
use crate::error::{ExportError, Result};

use super::archive::archive_and_publish;
use super::encoder::XmlEncoder;
use super::pagination::{DEFAULT_PAGE_SIZE, DocumentStream, Exhaustion, ExportJob, PagedQuery};
use super::progress::ProgressTracker;
use super::resolver::IndexResolver;
use super::staging::StagingLayout;

/// What to do when one index fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run on the first error
    #[default]
    Abort,
    /// Record the failure and move on to the next index
    Continue,
}

/// Options for an export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Rows requested per query
    pub page_size: u32,
    /// Publish a `.tar.gz` instead of individual files
    pub compressed: bool,
    pub failure_policy: FailurePolicy,
    /// Show a progress bar per index
    pub show_progress: bool,
    pub encoder: XmlEncoder,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            compressed: false,
            failure_policy: FailurePolicy::Abort,
            show_progress: false,
            encoder: XmlEncoder::default(),
        }
    }
}

/// Result of exporting one index
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub index_id: String,
    /// Count sampled before paging
    pub expected_documents: u64,
    /// Documents received from the index
    pub documents_exported: u64,
    /// XML files written (documents without an id are skipped)
    pub files_written: u64,
    pub exhaustion: Exhaustion,
    /// Published archive, in compressed mode
    pub archive: Option<PathBuf>,
    /// Directory holding the published output
    pub output_dir: PathBuf,
    pub elapsed_ms: u64,
}

impl IndexReport {
    /// Whether the processed count matches the sampled count
    pub fn is_complete(&self) -> bool {
        self.documents_exported == self.expected_documents
    }
}

/// An index that failed under [`FailurePolicy::Continue`]
#[derive(Debug)]
pub struct IndexFailure {
    pub index_id: String,
    pub error: ExportError,
}

/// Result of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    pub indexes: Vec<IndexReport>,
    pub failures: Vec<IndexFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total_documents(&self) -> u64 {
        self.indexes.iter().map(|r| r.documents_exported).sum()
    }
}

type TimestampSource = Box<dyn Fn() -> i64 + Send + Sync>;

/// Coordinator for export runs
///
/// Receives already-authenticated service clients; it never reads
/// credentials itself.
pub struct ExportCoordinator<'a> {
    account: &'a dyn AccountService,
    search: &'a dyn SearchService,
    layout: StagingLayout,
    options: ExportOptions,
    timestamp: TimestampSource,
}

impl<'a> ExportCoordinator<'a> {
    /// Create a new export coordinator
    pub fn new(
        account: &'a dyn AccountService,
        search: &'a dyn SearchService,
        layout: StagingLayout,
        options: ExportOptions,
    ) -> Self {
        Self {
            account,
            search,
            layout,
            options,
            timestamp: Box::new(|| chrono::Utc::now().timestamp()),
        }
    }

    /// Override the clock used for archive names
    pub fn with_timestamp_source(
        mut self,
        source: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Self {
        self.timestamp = Box::new(source);
        self
    }

    /// Export every index, or only `filter` when given
    ///
    /// Discovery and destination errors always end the run. Per-index errors
    /// end it under [`FailurePolicy::Abort`] and are collected in the report
    /// under [`FailurePolicy::Continue`].
    pub async fn run(&self, filter: Option<&str>) -> Result<RunReport> {
        let indexes = IndexResolver::new(self.account).resolve(filter).await?;
        let mut report = RunReport::default();
        if indexes.is_empty() {
            return Ok(report);
        }

        self.layout.prepare_roots().await?;

        for descriptor in &indexes {
            match self.export_index(descriptor).await {
                Ok(index_report) => report.indexes.push(index_report),
                Err(e) => match self.options.failure_policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Continue => {
                        error!("Export of {} failed ({}): {}", descriptor.id, e.kind(), e);
                        report.failures.push(IndexFailure {
                            index_id: descriptor.id.clone(),
                            error: e,
                        });
                    }
                },
            }
        }

        info!(
            "Run finished: {} indexes exported, {} failed, {} documents",
            report.indexes.len(),
            report.failures.len(),
            report.total_documents()
        );
        Ok(report)
    }

    /// Export a single index
    pub async fn export_index(&self, descriptor: &IndexDescriptor) -> Result<IndexReport> {
        let index = self.search.index(descriptor)?;

        index.ping().await?;
        let stats = index.introspect().await?;
        debug!("Index {} reports {} documents", descriptor.id, stats.num_documents);

        let mut area = self.layout.open(&descriptor.id).await?;
        let tracker = ProgressTracker::new(
            &descriptor.id,
            stats.num_documents,
            self.options.show_progress,
        );

        info!("Exporting all documents for index {}.", descriptor.id);
        let mut query = PagedQuery::new(
            &*index,
            ExportJob::new(&descriptor.id, stats.num_documents),
            self.options.page_size,
        );

        while let Some(documents) = query.next_batch().await? {
            for document in &documents {
                let Some(id) = document.id() else {
                    warn!("Skipping a document without id in {}", descriptor.id);
                    continue;
                };
                let xml = self.options.encoder.encode(document);
                area.write_document(id, &xml).await?;
            }
            tracker.update(query.job().processed_count);
            info!(
                "Exported {} documents. Checking for more documents",
                documents.len()
            );
        }
        tracker.finish();

        let exhaustion = query.exhaustion();
        let job = query.into_job();
        if job.processed_count != job.num_documents {
            warn!(
                "Index {} changed during export: expected {} documents, exported {}",
                descriptor.id, job.num_documents, job.processed_count
            );
        }

        let archive = if self.options.compressed {
            Some(archive_and_publish(&area, (self.timestamp)()).await?)
        } else {
            area.publish().await?;
            None
        };

        info!(
            "Exported {} documents. Finished export for {}. Exports can be found in {}",
            job.processed_count,
            descriptor.id,
            area.destination_dir().display()
        );

        Ok(IndexReport {
            index_id: descriptor.id.clone(),
            expected_documents: job.num_documents,
            documents_exported: job.processed_count,
            files_written: area.written(),
            exhaustion,
            archive,
            output_dir: area.destination_dir().to_path_buf(),
            elapsed_ms: tracker.elapsed_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{PageRequest, SearchIndex};
    use crate::error::NetworkError;
    use crate::export::pagination::tests::FakeIndex;
    use crate::export::resolver::tests::{FakeAccount, subscription_with};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    type RequestLog = Arc<Mutex<Vec<PageRequest>>>;

    /// Search service building fake indexes from (num_documents, pages)
    struct FakeSearch {
        indexes: HashMap<String, (Option<u64>, Vec<usize>)>,
        failures: HashMap<String, usize>,
        requests: Mutex<HashMap<String, RequestLog>>,
    }

    impl FakeSearch {
        fn new(entries: &[(&str, Option<u64>, Vec<usize>)]) -> Self {
            Self {
                indexes: entries
                    .iter()
                    .map(|(id, n, pages)| (id.to_string(), (*n, pages.clone())))
                    .collect(),
                failures: HashMap::new(),
                requests: Mutex::new(HashMap::new()),
            }
        }

        /// Make the `call`-th query (zero-based) of index `id` fail
        fn failing_at(mut self, id: &str, call: usize) -> Self {
            self.failures.insert(id.to_string(), call);
            self
        }

        fn offsets(&self, id: &str) -> Vec<u64> {
            self.requests
                .lock()
                .unwrap()
                .get(id)
                .map(|log| log.lock().unwrap().iter().map(|r| r.offset).collect())
                .unwrap_or_default()
        }
    }

    impl SearchService for FakeSearch {
        fn index(&self, descriptor: &IndexDescriptor) -> Result<Box<dyn SearchIndex>> {
            let (n, pages) = self
                .indexes
                .get(&descriptor.id)
                .cloned()
                .ok_or_else(|| ExportError::Generic(format!("unknown index {}", descriptor.id)))?;
            let mut index = FakeIndex::new(n.unwrap_or(0), pages);
            index.num_documents = n;
            index.fail_at = self.failures.get(&descriptor.id).copied();
            self.requests
                .lock()
                .unwrap()
                .insert(descriptor.id.clone(), index.requests.clone());
            Ok(Box::new(index))
        }
    }

    fn file_names(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_end_to_end_plain_export() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let account = FakeAccount(subscription_with(&["TEST-001"]));
        let search = FakeSearch::new(&[("TEST-001", Some(450), vec![200, 200, 50])]);
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(&out, None),
            ExportOptions::default(),
        );

        let report = coordinator.run(None).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.indexes.len(), 1);
        assert_eq!(report.indexes[0].documents_exported, 450);
        assert!(report.indexes[0].is_complete());

        let names = file_names(&out.join("TEST-001"));
        assert_eq!(names.len(), 450);
        assert!(names.iter().all(|n| n.starts_with("doc-") && n.ends_with(".xml")));

        let first = std::fs::read_to_string(out.join("TEST-001").join("doc-00000.xml")).unwrap();
        assert_eq!(first, "<doc><field name=\"id\">doc-00000</field>\n</doc>");
    }

    #[tokio::test]
    async fn test_separate_staging_and_archive() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("out");
        let stage = tmp.path().join("stage");

        let account = FakeAccount(subscription_with(&["IDX1"]));
        let search = FakeSearch::new(&[("IDX1", Some(3), vec![2, 1])]);
        let options = ExportOptions {
            compressed: true,
            page_size: 2,
            ..ExportOptions::default()
        };
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(&out, Some(stage.clone())),
            options,
        )
        .with_timestamp_source(|| 1700000000);

        let report = coordinator.run(None).await.unwrap();
        let archive = report.indexes[0].archive.clone().unwrap();
        assert_eq!(archive, out.join("IDX1").join("IDX1-1700000000.tar.gz"));
        assert_eq!(file_names(&out.join("IDX1")), vec!["IDX1-1700000000.tar.gz"]);
        assert!(file_names(&stage.join("IDX1")).is_empty());
    }

    #[tokio::test]
    async fn test_filter_selects_single_index() {
        let tmp = tempdir().unwrap();
        let account = FakeAccount(subscription_with(&["A", "B"]));
        let search = FakeSearch::new(&[("A", Some(1), vec![1]), ("B", Some(1), vec![1])]);
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(tmp.path(), None),
            ExportOptions::default(),
        );

        let report = coordinator.run(Some("B")).await.unwrap();
        assert_eq!(report.indexes.len(), 1);
        assert_eq!(report.indexes[0].index_id, "B");
        assert!(!tmp.path().join("A").exists());
    }

    #[tokio::test]
    async fn test_unmatched_filter_exports_nothing() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("never-created");
        let account = FakeAccount(subscription_with(&["A"]));
        let search = FakeSearch::new(&[("A", Some(1), vec![1])]);
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(&out, None),
            ExportOptions::default(),
        );

        let report = coordinator.run(Some("missing")).await.unwrap();
        assert!(report.indexes.is_empty());
        assert!(report.is_success());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_abort_policy_stops_on_first_failure() {
        let tmp = tempdir().unwrap();
        let account = FakeAccount(subscription_with(&["BAD", "GOOD"]));
        let search = FakeSearch::new(&[("BAD", None, vec![]), ("GOOD", Some(1), vec![1])]);
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(tmp.path(), None),
            ExportOptions::default(),
        );

        let err = coordinator.run(None).await.unwrap_err();
        assert!(matches!(err, ExportError::EmptyIndex(_)));
        assert!(!tmp.path().join("GOOD").exists());
    }

    #[tokio::test]
    async fn test_continue_policy_isolates_failures() {
        let tmp = tempdir().unwrap();
        let account = FakeAccount(subscription_with(&["BAD", "GOOD"]));
        let search = FakeSearch::new(&[("BAD", None, vec![]), ("GOOD", Some(2), vec![2])]);
        let options = ExportOptions {
            failure_policy: FailurePolicy::Continue,
            ..ExportOptions::default()
        };
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(tmp.path(), None),
            options,
        );

        let report = coordinator.run(None).await.unwrap();
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index_id, "BAD");
        assert_eq!(report.indexes.len(), 1);
        assert_eq!(file_names(&tmp.path().join("GOOD")).len(), 2);
    }

    #[tokio::test]
    async fn test_index_shrinking_mid_export_is_partial() {
        let tmp = tempdir().unwrap();
        let account = FakeAccount(subscription_with(&["IDX"]));
        let search = FakeSearch::new(&[("IDX", Some(500), vec![200, 100])]);
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(tmp.path(), None),
            ExportOptions::default(),
        );

        let report = coordinator.run(None).await.unwrap();
        let index = &report.indexes[0];
        assert_eq!(index.documents_exported, 300);
        assert_eq!(index.expected_documents, 500);
        assert_eq!(index.exhaustion, Exhaustion::EmptyPage);
        assert!(!index.is_complete());
    }

    #[tokio::test]
    async fn test_empty_index_creates_empty_directory() {
        let tmp = tempdir().unwrap();
        let account = FakeAccount(subscription_with(&["EMPTY"]));
        let search = FakeSearch::new(&[("EMPTY", Some(0), vec![])]);
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(tmp.path(), None),
            ExportOptions::default(),
        );

        let report = coordinator.run(None).await.unwrap();
        assert_eq!(report.indexes[0].documents_exported, 0);
        assert!(file_names(&tmp.path().join("EMPTY")).is_empty());
    }

    #[tokio::test]
    async fn test_discovery_error_is_fatal_even_when_continuing() {
        let tmp = tempdir().unwrap();
        let account = FakeAccount(serde_json::json!({ "heartbeat_data": {} }));
        let search = FakeSearch::new(&[]);
        let options = ExportOptions {
            failure_policy: FailurePolicy::Continue,
            ..ExportOptions::default()
        };
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(tmp.path(), None),
            options,
        );

        let err = coordinator.run(None).await.unwrap_err();
        assert!(matches!(err, ExportError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_default_layout_archive_survives_publish() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("out");

        let account = FakeAccount(subscription_with(&["IDX1"]));
        let search = FakeSearch::new(&[("IDX1", Some(3), vec![2, 1])]);
        let options = ExportOptions {
            compressed: true,
            page_size: 2,
            ..ExportOptions::default()
        };
        let coordinator =
            ExportCoordinator::new(&account, &search, StagingLayout::new(&out, None), options)
                .with_timestamp_source(|| 1700000000);

        let report = coordinator.run(None).await.unwrap();
        let archive = report.indexes[0].archive.clone().unwrap();
        assert_eq!(archive, out.join("IDX1").join("IDX1-1700000000.tar.gz"));
        assert!(archive.is_file());
        assert_eq!(file_names(&out.join("IDX1")), vec!["IDX1-1700000000.tar.gz"]);
        assert_eq!(file_names(&out), vec!["IDX1"]);
    }

    #[tokio::test]
    async fn test_network_error_mid_index_aborts_run() {
        let tmp = tempdir().unwrap();
        let account = FakeAccount(subscription_with(&["FLAKY", "NEXT"]));
        let search = FakeSearch::new(&[
            ("FLAKY", Some(400), vec![200, 200]),
            ("NEXT", Some(1), vec![1]),
        ])
        .failing_at("FLAKY", 1);
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(tmp.path(), None),
            ExportOptions::default(),
        );

        let err = coordinator.run(None).await.unwrap_err();
        assert!(matches!(err, ExportError::Network(NetworkError::ConnectionFailed(_))));
        assert_eq!(err.kind(), "NetworkError");
        // the failing page is the last request, the next index is never touched
        assert_eq!(search.offsets("FLAKY"), vec![0, 200]);
        assert!(search.offsets("NEXT").is_empty());
        assert!(!tmp.path().join("NEXT").exists());
    }

    #[tokio::test]
    async fn test_network_error_mid_index_is_recorded_when_continuing() {
        let tmp = tempdir().unwrap();
        let account = FakeAccount(subscription_with(&["FLAKY", "NEXT"]));
        let search = FakeSearch::new(&[
            ("FLAKY", Some(400), vec![200, 200]),
            ("NEXT", Some(2), vec![2]),
        ])
        .failing_at("FLAKY", 1);
        let options = ExportOptions {
            failure_policy: FailurePolicy::Continue,
            ..ExportOptions::default()
        };
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(tmp.path(), None),
            options,
        );

        let report = coordinator.run(None).await.unwrap();
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index_id, "FLAKY");
        assert!(matches!(
            report.failures[0].error,
            ExportError::Network(NetworkError::ConnectionFailed(_))
        ));
        assert_eq!(search.offsets("FLAKY"), vec![0, 200]);

        assert_eq!(report.indexes.len(), 1);
        assert_eq!(report.indexes[0].index_id, "NEXT");
        assert_eq!(file_names(&tmp.path().join("NEXT")).len(), 2);
    }

    #[tokio::test]
    async fn test_uncreatable_destination_ends_run_when_continuing() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let account = FakeAccount(subscription_with(&["IDX"]));
        let search = FakeSearch::new(&[("IDX", Some(1), vec![1])]);
        let options = ExportOptions {
            failure_policy: FailurePolicy::Continue,
            ..ExportOptions::default()
        };
        let coordinator = ExportCoordinator::new(
            &account,
            &search,
            StagingLayout::new(blocker.join("out"), None),
            options,
        );

        let err = coordinator.run(None).await.unwrap_err();
        assert!(matches!(
            err,
            ExportError::Filesystem(crate::error::FilesystemError::CreateDir { .. })
        ));
        assert!(search.offsets("IDX").is_empty());
    }
}
