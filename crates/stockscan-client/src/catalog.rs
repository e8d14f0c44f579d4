//! # Catalog Client
//!
//! Remote item lookup used to resolve scans, plus the alert feed.
//!
//! ## Endpoints
//! ```text
//! GET {base}/items?barcode={code}    exact barcode match (404 = no match)
//! GET {base}/items?search={query}    free-text search
//! GET {base}/alerts                  stock alerts
//! ```
//!
//! Every list endpoint may answer with a bare JSON array or with an envelope
//! (`{"items": [...]}` or `{"data": [...]}`); all three are accepted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use stockscan_core::{Alert, Item};

use crate::config::CatalogSettings;
use crate::error::{ScanError, ScanResult};

// =============================================================================
// Traits
// =============================================================================

/// Item lookup used by the coordinator.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Items whose barcode equals `code`. Empty when nothing matches.
    async fn find_by_code(&self, code: &str) -> ScanResult<Vec<Item>>;

    /// Items matching a free-text query.
    async fn search_catalog(&self, query: &str) -> ScanResult<Vec<Item>>;
}

/// Source of stock alerts for the polling coordinator.
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn fetch_alerts(&self) -> ScanResult<Vec<Alert>>;
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Longest error body echoed into a `LookupStatus` message.
const MAX_ERROR_BODY: usize = 200;

/// JSON-over-HTTP catalog client.
#[derive(Clone)]
pub struct HttpCatalogClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl HttpCatalogClient {
    pub fn new(settings: &CatalogSettings) -> ScanResult<Self> {
        let base = Url::parse(&settings.base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ScanError::InvalidUrl(format!(
                "unsupported scheme: {}",
                base.scheme()
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(concat!("stockscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScanError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(HttpCatalogClient {
            http,
            base,
            token: settings.api_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        url: Url,
        not_found_is_empty: bool,
    ) -> ScanResult<Vec<T>> {
        debug!(%url, "Catalog request");

        let mut request = self.http.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND && not_found_is_empty {
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Catalog request rejected");
            return Err(ScanError::LookupStatus {
                status: status.as_u16(),
                message: truncate(&body, MAX_ERROR_BODY),
            });
        }

        parse_list(&body)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn find_by_code(&self, code: &str) -> ScanResult<Vec<Item>> {
        let url = endpoint(&self.base, "items", &[("barcode", code)])?;
        self.get_list(url, true).await
    }

    async fn search_catalog(&self, query: &str) -> ScanResult<Vec<Item>> {
        let url = endpoint(&self.base, "items", &[("search", query)])?;
        self.get_list(url, false).await
    }
}

#[async_trait]
impl AlertSource for HttpCatalogClient {
    async fn fetch_alerts(&self) -> ScanResult<Vec<Alert>> {
        let url = endpoint(&self.base, "alerts", &[])?;
        self.get_list(url, false).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Appends `segment` to the base path and sets the query string.
fn endpoint(base: &Url, segment: &str, query: &[(&str, &str)]) -> ScanResult<Url> {
    let mut url = base.clone();

    url.path_segments_mut()
        .map_err(|_| ScanError::InvalidUrl(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .push(segment);

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    Ok(url)
}

/// Shapes a list endpoint may answer with.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Items { items: Vec<T> },
    Data { data: Vec<T> },
}

fn parse_list<T: DeserializeOwned>(body: &str) -> ScanResult<Vec<T>> {
    let parsed: ListBody<T> = serde_json::from_str(body)?;

    Ok(match parsed {
        ListBody::Bare(list) => list,
        ListBody::Items { items } => items,
        ListBody::Data { data } => data,
    })
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
