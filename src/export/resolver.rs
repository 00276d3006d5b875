//! Index discovery from subscription metadata
//!
//! The account service returns a subscription document; the indexes live at
//! `heartbeat_data.search_cores[].core_id`.

use serde_json::Value;
use tracing::{info, warn};

use crate::client::{AccountService, IndexDescriptor};
use crate::error::{DiscoveryError, ExportError, Result};

/// Resolves which indexes a run should export
pub struct IndexResolver<'a> {
    account: &'a dyn AccountService,
}

impl<'a> IndexResolver<'a> {
    pub fn new(account: &'a dyn AccountService) -> Self {
        Self { account }
    }

    /// Fetch the subscription and list its indexes
    ///
    /// # Arguments
    /// * `filter` - Optional index id; when set only that index is returned
    ///
    /// # Returns
    /// * `Result<Vec<IndexDescriptor>>` - Indexes to export, possibly empty
    ///   when the filter matches nothing
    pub async fn resolve(&self, filter: Option<&str>) -> Result<Vec<IndexDescriptor>> {
        info!("Checking if the given subscription has search indexes...");
        let subscription = self.account.subscription().await?;

        let indexes = parse_indexes(&subscription)?;
        info!("Found {} search indexes.", indexes.len());

        let selected = filter_indexes(indexes, filter);
        if let Some(id) = filter {
            if selected.is_empty() {
                warn!("Index {} is not part of this subscription, nothing to export", id);
            }
        }
        Ok(selected)
    }
}

/// Extract index descriptors from subscription metadata
pub fn parse_indexes(subscription: &Value) -> Result<Vec<IndexDescriptor>> {
    let cores = subscription
        .get("heartbeat_data")
        .and_then(|h| h.get("search_cores"))
        .ok_or(DiscoveryError::MissingIndexList)?;

    let list = cores.as_array().ok_or_else(|| {
        DiscoveryError::InvalidIndexList(format!("expected a list, found {}", json_kind(cores)))
    })?;
    if list.is_empty() {
        return Err(DiscoveryError::MissingIndexList.into());
    }

    list.iter()
        .enumerate()
        .map(|(i, core)| {
            core.get("core_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(IndexDescriptor::new)
                .ok_or_else(|| {
                    ExportError::from(DiscoveryError::InvalidIndexList(format!(
                        "entry {i} has no core_id"
                    )))
                })
        })
        .collect()
}

/// Keep only the index matching `filter`, or all when no filter is given
pub fn filter_indexes(indexes: Vec<IndexDescriptor>, filter: Option<&str>) -> Vec<IndexDescriptor> {
    match filter {
        Some(id) => indexes.into_iter().filter(|d| d.id == id).collect(),
        None => indexes,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
