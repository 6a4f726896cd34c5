//! Backend for applications that render item pages on the server
//!
//! Pages are fetched with a plain HTTP GET and queried with CSS selectors.
//! There is nothing to wait for: once the body has arrived an element is
//! either present or it is not, so timeouts are ignored.

use crate::config::{ExtractionConfig, TargetConfig};
use crate::page::{
    BackendError, BackendResult, BrowserSession, ItemDescriptor, ItemExtractor, PageNavigator,
};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

/// A page session over server-rendered HTML
pub struct StaticHtmlSession {
    client: Client,
    target: TargetConfig,
    extraction: ExtractionConfig,
    current_url: Option<String>,
    body: Option<String>,
}

/// Builds the HTTP client used to fetch item pages
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("branchmap/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

impl StaticHtmlSession {
    pub fn new(target: TargetConfig, extraction: ExtractionConfig) -> BackendResult<Self> {
        Ok(Self::with_client(build_http_client()?, target, extraction))
    }

    pub fn with_client(client: Client, target: TargetConfig, extraction: ExtractionConfig) -> Self {
        Self {
            client,
            target,
            extraction,
            current_url: None,
            body: None,
        }
    }

    fn select_items(&self, selector: &str) -> BackendResult<Vec<ItemDescriptor>> {
        let Some(body) = &self.body else {
            return Ok(Vec::new());
        };
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(body);

        let mut items = Vec::new();
        for element in document.select(&selector) {
            let location = element
                .value()
                .attr(&self.extraction.location_attribute)
                .map(str::trim)
                .unwrap_or("");
            if location.is_empty() {
                tracing::debug!(
                    "Skipping element without {} attribute",
                    self.extraction.location_attribute
                );
                continue;
            }

            let title = element.text().collect::<String>().trim().to_string();
            items.push(ItemDescriptor::new(location, title));
        }

        Ok(items)
    }
}

fn parse_selector(selector: &str) -> BackendResult<Selector> {
    Selector::parse(selector).map_err(|e| BackendError::Selector(format!("{}: {:?}", selector, e)))
}

#[async_trait]
impl PageNavigator for StaticHtmlSession {
    async fn navigate_to(&mut self, location: &str) -> BackendResult<()> {
        let url = self.target.item_url(location);
        tracing::debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;

        self.current_url = Some(final_url);
        self.body = Some(body);
        Ok(())
    }

    async fn wait_for_landmark(&mut self, text: &str, _timeout: Duration) -> BackendResult<bool> {
        let Some(body) = &self.body else {
            return Ok(false);
        };
        let selector = parse_selector(&self.extraction.landmark)?;
        let document = Html::parse_document(body);

        let found = document
            .select(&selector)
            .any(|element| element.text().collect::<String>().contains(text));
        Ok(found)
    }

    async fn current_location(&mut self) -> BackendResult<String> {
        Ok(self.current_url.clone().unwrap_or_default())
    }
}

#[async_trait]
impl ItemExtractor for StaticHtmlSession {
    async fn query_container_children(
        &mut self,
        _timeout: Duration,
    ) -> BackendResult<Vec<ItemDescriptor>> {
        self.select_items(&self.extraction.containers)
    }

    async fn query_leaf_children(
        &mut self,
        _timeout: Duration,
    ) -> BackendResult<Vec<ItemDescriptor>> {
        self.select_items(&self.extraction.leaves)
    }
}

#[async_trait]
impl BrowserSession for StaticHtmlSession {
    async fn open(&mut self) -> BackendResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> BackendResult<()> {
        self.current_url = None;
        self.body = None;
        Ok(())
    }
}
