//! Data source contract and its two bundled implementations.
//!
//! - `HttpDataSource` queries an HTTP(S) JSON endpoint with the filter as
//!   query-string parameters (`q`, `subject`, `predicate`, `object`, repeated
//!   `field`, and `suggest` for autocomplete).
//! - `FileDataSource` reads a static JSON dataset from disk and answers
//!   queries locally; this is the default fallback resource.

use crate::error::SyncError;
use crate::filter::{self, GraphFilter};
use crate::models::{Dataset, Suggestion};
use crate::query::{QueryModel, QueryParams};
use crate::session::bearer_token;
use crate::url_validator::{validate_api_url, ApiEndpoint};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Where datasets and suggestions come from.
///
/// Implementations are transport-agnostic from the engine's point of view.
/// Every error is terminal for the one call that produced it.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the dataset matching `params`.
    async fn search(&self, params: &QueryParams, headers: &HeaderMap) -> Result<Dataset, SyncError>;

    /// Fetch autocomplete entries for `prefix`.
    async fn suggest(&self, prefix: &str, headers: &HeaderMap) -> Result<Vec<Suggestion>, SyncError>;
}

/// Build the data source named by a configured API base.
pub fn connect(api_base_url: &str, timeout: Duration) -> Result<Arc<dyn DataSource>, SyncError> {
    match validate_api_url(api_base_url)? {
        ApiEndpoint::Http(url) => Ok(Arc::new(HttpDataSource::new(url, timeout)?)),
        ApiEndpoint::File(path) => Ok(Arc::new(FileDataSource::new(path))),
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Suggestion endpoints answer with either a bare array or a wrapper object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SuggestResponse {
    List(Vec<Suggestion>),
    Wrapped { suggestions: Vec<Suggestion> },
}

impl From<SuggestResponse> for Vec<Suggestion> {
    fn from(resp: SuggestResponse) -> Self {
        match resp {
            SuggestResponse::List(list) => list,
            SuggestResponse::Wrapped { suggestions } => suggestions,
        }
    }
}

pub struct HttpDataSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpDataSource {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("graphsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    async fn get_bytes(&self, params: &QueryParams, headers: &HeaderMap) -> Result<Vec<u8>, SyncError> {
        let url = params.apply_to(&self.base);
        tracing::debug!(%url, "fetching");

        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn search(&self, params: &QueryParams, headers: &HeaderMap) -> Result<Dataset, SyncError> {
        let body = self.get_bytes(params, headers).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn suggest(&self, prefix: &str, headers: &HeaderMap) -> Result<Vec<Suggestion>, SyncError> {
        let params = QueryModel::to_suggest_params(prefix);
        let body = self.get_bytes(&params, headers).await?;
        let resp: SuggestResponse = serde_json::from_slice(&body)?;
        Ok(resp.into())
    }
}

// ============================================================================
// Static file
// ============================================================================

/// Static JSON dataset on disk, re-read on every call so edits show up on the
/// next query.
pub struct FileDataSource {
    path: PathBuf,
}

impl FileDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the dataset, scoped to what the caller may see. A file has no
    /// way to verify credentials, so any bearer token counts as a session.
    async fn load(&self, headers: &HeaderMap) -> Result<Dataset, SyncError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| SyncError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        let dataset: Dataset = serde_json::from_slice(&bytes)?;
        Ok(filter::visible_to(&dataset, bearer_token(headers).is_some()))
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    async fn search(&self, params: &QueryParams, headers: &HeaderMap) -> Result<Dataset, SyncError> {
        let dataset = self.load(headers).await?;
        Ok(filter::apply(&dataset, &GraphFilter::from_params(params)))
    }

    async fn suggest(&self, prefix: &str, headers: &HeaderMap) -> Result<Vec<Suggestion>, SyncError> {
        let dataset = self.load(headers).await?;
        Ok(filter::suggest(&dataset, prefix))
    }
}
