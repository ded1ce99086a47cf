//! Zotero Web API v3 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use tracing::{debug, info};
use zotrag_core::{LibraryError, LibraryItem, LibrarySource};

use crate::config::ZoteroConfig;

const API_VERSION: &str = "3";
const TOTAL_RESULTS_HEADER: &str = "Total-Results";

/// A [`LibrarySource`] talking to `api.zotero.org`.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ZoteroClient {
    http: Client,
    config: ZoteroConfig,
}

impl ZoteroClient {
    pub fn new(config: ZoteroConfig) -> Result<Self, LibraryError> {
        let mut headers = HeaderMap::new();
        headers.insert("Zotero-API-Version", HeaderValue::from_static(API_VERSION));
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| LibraryError::MissingCredentials(format!("invalid API key: {e}")))?;
        headers.insert("Zotero-API-Key", key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("zotrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LibraryError::Request(e.to_string()))?;

        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &ZoteroConfig {
        &self.config
    }

    fn items_url(&self) -> String {
        format!("{}/items", self.config.library_url())
    }

    fn file_url(&self, attachment_key: &str) -> String {
        format!("{}/items/{}/file", self.config.library_url(), attachment_key)
    }

    async fn fetch_page(&self, start: usize) -> Result<(Vec<LibraryItem>, Option<usize>), LibraryError> {
        let response = self
            .http
            .get(self.items_url())
            .query(&[
                ("format", "json".to_string()),
                ("start", start.to_string()),
                ("limit", self.config.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| LibraryError::Request(format!("failed to list items: {e}")))?;

        let response = check_status(response).await?;
        let total = response
            .headers()
            .get(TOTAL_RESULTS_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let items: Vec<LibraryItem> = response
            .json()
            .await
            .map_err(|e| LibraryError::Decode(format!("failed to parse item listing: {e}")))?;

        Ok((items, total))
    }
}

#[async_trait]
impl LibrarySource for ZoteroClient {
    async fn list_items(&self) -> Result<Vec<LibraryItem>, LibraryError> {
        let mut all = Vec::new();
        let mut start = 0;

        loop {
            let (page, total) = self.fetch_page(start).await?;
            let len = page.len();
            all.extend(page);
            debug!("Listed {} items (start={}, total={:?})", len, start, total);

            start += len;
            let done = match total {
                Some(total) => start >= total,
                None => len < self.config.page_size,
            };
            if done || len == 0 {
                break;
            }
        }

        info!("Listed {} library items", all.len());
        Ok(all)
    }

    async fn fetch_attachment(&self, attachment_key: &str) -> Result<Vec<u8>, LibraryError> {
        let response = self
            .http
            .get(self.file_url(attachment_key))
            .send()
            .await
            .map_err(|e| LibraryError::Request(format!("failed to fetch {attachment_key}: {e}")))?;

        let response = check_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LibraryError::Request(format!("failed to read {attachment_key}: {e}")))?;

        debug!("Fetched attachment {} ({} bytes)", attachment_key, bytes.len());
        Ok(bytes.to_vec())
    }
}

async fn check_status(response: Response) -> Result<Response, LibraryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LibraryError::Status {
        status: status.as_u16(),
        message: body.trim().to_string(),
    })
}
