//! HTTP clients for the account and search services
//!
//! The search service speaks the Solr HTTP API. Every request asks for JSON
//! (`wt=json`); any transport failure, non-success status or undecodable body
//! surfaces as a `NetworkError`.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{NetworkConfig, SearchConfig};
use crate::error::{ExportError, NetworkError, Result};
use crate::export::Document;

use super::{
    AccountService, IndexDescriptor, IndexStats, PageRequest, QueryPage, SearchIndex,
    SearchService,
};

/// Parse a base URL, making sure it ends with `/` so joins append
fn base_url(raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| NetworkError::InvalidUrl(format!("{raw}: {e}")).into())
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| NetworkError::InvalidUrl(format!("{base}{path}: {e}")).into())
}

/// Send a GET and decode the JSON body
async fn get_json(client: &Client, request: reqwest::RequestBuilder) -> Result<Value> {
    let request = request.build()?;
    let url = request.url().to_string();
    debug!("GET {}", url);

    let response = client.execute(request).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::Status {
            url,
            status: status.as_u16(),
        }
        .into());
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| NetworkError::InvalidResponse(format!("{url}: {e}")).into())
}

/// Account service client authenticating with HTTP basic auth
pub struct HttpAccountService {
    client: Client,
    base: Url,
    identifier: String,
    key: String,
}

impl HttpAccountService {
    /// Build a client from configuration
    ///
    /// Both the identifier and the key must already be present; prompting for
    /// them is the caller's job.
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let identifier = config
            .identifier
            .clone()
            .ok_or_else(|| crate::error::ConfigError::MissingField("network.identifier".into()))?;
        let key = config
            .key
            .clone()
            .ok_or_else(|| crate::error::ConfigError::MissingField("network.key".into()))?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base: base_url(&config.url)?,
            identifier,
            key,
        })
    }

    fn subscription_url(&self) -> Result<Url> {
        join(&self.base, "subscription")
    }
}

#[async_trait]
impl AccountService for HttpAccountService {
    async fn subscription(&self) -> Result<Value> {
        let request = self
            .client
            .get(self.subscription_url()?)
            .basic_auth(&self.identifier, Some(&self.key));
        get_json(&self.client, request).await
    }
}

/// Factory for per-index Solr clients sharing one connection pool
pub struct HttpSearchService {
    client: Client,
    base: Url,
}

impl HttpSearchService {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base: base_url(&config.url)?,
        })
    }
}

impl SearchService for HttpSearchService {
    fn index(&self, descriptor: &IndexDescriptor) -> Result<Box<dyn SearchIndex>> {
        Ok(Box::new(SolrIndex::new(
            self.client.clone(),
            &self.base,
            &descriptor.id,
        )?))
    }
}

/// Client bound to one Solr core
pub struct SolrIndex {
    client: Client,
    index_id: String,
    root: Url,
}

#[derive(Debug, Deserialize)]
struct LukeResponse {
    index: Option<LukeIndex>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LukeIndex {
    num_docs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectBody {
    #[serde(default)]
    num_found: u64,
    #[serde(default)]
    docs: Vec<Map<String, Value>>,
}

impl SolrIndex {
    pub fn new(client: Client, base: &Url, index_id: &str) -> Result<Self> {
        // the id is one encoded path segment, never a relative reference
        let mut root = base.clone();
        root.path_segments_mut()
            .map_err(|_| NetworkError::InvalidUrl(format!("{base} cannot hold an index path")))?
            .pop_if_empty()
            .push(index_id)
            .push("");
        Ok(Self {
            client,
            index_id: index_id.to_string(),
            root,
        })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    fn ping_url(&self) -> Result<Url> {
        let mut url = join(&self.root, "admin/ping")?;
        url.query_pairs_mut().append_pair("wt", "json");
        Ok(url)
    }

    fn luke_url(&self) -> Result<Url> {
        let mut url = join(&self.root, "admin/luke")?;
        url.query_pairs_mut()
            .append_pair("wt", "json")
            .append_pair("numTerms", "0");
        Ok(url)
    }

    fn select_url(&self, request: &PageRequest) -> Result<Url> {
        let mut url = join(&self.root, "select")?;
        url.query_pairs_mut()
            .append_pair("qt", "standard")
            .append_pair("q", "*:*")
            .append_pair("start", &request.offset.to_string())
            .append_pair("rows", &request.page_size.to_string())
            .append_pair("sort", &request.sort)
            .append_pair("fl", "*")
            .append_pair("wt", "json");
        Ok(url)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, what: &str, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| {
            NetworkError::InvalidResponse(format!("{} {what}: {e}", self.index_id)).into()
        })
    }

    fn parse_stats(&self, value: Value) -> Result<IndexStats> {
        let luke: LukeResponse = self.decode("introspection", value)?;
        luke.index
            .and_then(|i| i.num_docs)
            .map(|num_documents| IndexStats { num_documents })
            .ok_or_else(|| ExportError::EmptyIndex(self.index_id.clone()))
    }

    fn parse_page(&self, value: Value) -> Result<QueryPage> {
        let select: SelectResponse = self.decode("query", value)?;
        Ok(QueryPage {
            documents: select
                .response
                .docs
                .iter()
                .map(Document::from_json_object)
                .collect(),
            num_documents: select.response.num_found,
        })
    }
}

#[async_trait]
impl SearchIndex for SolrIndex {
    async fn ping(&self) -> Result<()> {
        get_json(&self.client, self.client.get(self.ping_url()?)).await?;
        Ok(())
    }

    async fn introspect(&self) -> Result<IndexStats> {
        let value = get_json(&self.client, self.client.get(self.luke_url()?)).await?;
        self.parse_stats(value)
    }

    async fn query(&self, request: &PageRequest) -> Result<QueryPage> {
        let value = get_json(&self.client, self.client.get(self.select_url(request)?)).await?;
        self.parse_page(value)
    }
}
