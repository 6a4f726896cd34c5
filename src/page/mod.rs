//! Page capabilities consumed by the crawler
//!
//! The crawler never talks to a browser directly. It drives anything that
//! can navigate to a location, wait for a landmark, and list the children
//! shown on the current page:
//! - `webdriver`: a real browser behind a W3C WebDriver server
//! - `static_html`: server-rendered pages fetched over plain HTTP

mod static_html;
mod webdriver;

pub use static_html::StaticHtmlSession;
pub use webdriver::{xpath_literal, Credentials, WebDriverSession};

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a page backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("WebDriver error ({error}): {message}")]
    WebDriver { error: String, message: String },

    #[error("Unexpected driver response: {0}")]
    Protocol(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("No page session is open")]
    NoSession,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// A child item shown on a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemDescriptor {
    /// Stable identifier of the item, used as the dedup key
    pub location: String,
    /// Display name as rendered
    pub title: String,
}

impl ItemDescriptor {
    pub fn new(location: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            title: title.into(),
        }
    }
}

/// Drives the rendering backend to a location
#[async_trait]
pub trait PageNavigator: Send {
    /// Starts loading the page for `location`
    async fn navigate_to(&mut self, location: &str) -> BackendResult<()>;

    /// Waits until a landmark containing `text` is visible
    ///
    /// Returns `Ok(false)` when the timeout expires first.
    async fn wait_for_landmark(&mut self, text: &str, timeout: Duration) -> BackendResult<bool>;

    /// The location currently rendered, as the backend reports it
    async fn current_location(&mut self) -> BackendResult<String>;
}

/// Reads the children listed on the current page
///
/// A region that never appears within `timeout` yields an empty list.
#[async_trait]
pub trait ItemExtractor: Send {
    async fn query_container_children(
        &mut self,
        timeout: Duration,
    ) -> BackendResult<Vec<ItemDescriptor>>;

    async fn query_leaf_children(&mut self, timeout: Duration)
        -> BackendResult<Vec<ItemDescriptor>>;
}

/// Acquire and release of the authenticated session
#[async_trait]
pub trait BrowserSession: Send {
    async fn open(&mut self) -> BackendResult<()>;

    async fn close(&mut self) -> BackendResult<()>;
}

/// Everything a crawl needs from one backend
pub trait PageSession: BrowserSession + PageNavigator + ItemExtractor {}

impl<T: BrowserSession + PageNavigator + ItemExtractor + ?Sized> PageSession for T {}

/// Whether a rendered URL already shows `location`
///
/// The location must appear as a whole segment of the URL, raw or
/// percent-decoded: `.../item/12/` does not show location `1`.
pub fn location_matches(current: &str, location: &str) -> bool {
    if location.is_empty() {
        return false;
    }
    if contains_segment(current, location) {
        return true;
    }
    percent_decode_str(current)
        .decode_utf8()
        .map(|decoded| contains_segment(&decoded, location))
        .unwrap_or(false)
}

fn contains_segment(url: &str, segment: &str) -> bool {
    const OPENERS: &[char] = &['/', '#', '?', '&', '='];
    const CLOSERS: &[char] = &['/', '#', '?', '&'];

    url.match_indices(segment).any(|(start, _)| {
        let before = url[..start].chars().next_back();
        let after = url[start + segment.len()..].chars().next();
        before.map_or(true, |c| OPENERS.contains(&c))
            && after.map_or(true, |c| CLOSERS.contains(&c))
    })
}
