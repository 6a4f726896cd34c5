//! W3C WebDriver backend
//!
//! Talks JSON over HTTP to a driver server (geckodriver, chromedriver or a
//! Selenium grid), which owns the actual browser. One `WebDriverSession` is
//! one browser session, held for the whole crawl.

use crate::config::{BackendConfig, ExtractionConfig, SessionConfig, TargetConfig};
use crate::page::{
    BackendError, BackendResult, BrowserSession, ItemDescriptor, ItemExtractor, PageNavigator,
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;

/// Key under which the protocol returns element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(30);

/// Account used for the sign-in page flow
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A browser session behind a WebDriver server
pub struct WebDriverSession {
    client: Client,
    endpoint: String,
    backend: BackendConfig,
    target: TargetConfig,
    extraction: ExtractionConfig,
    sign_in_flow: Option<(SessionConfig, Credentials)>,
    session_id: Option<String>,
}

impl WebDriverSession {
    pub fn new(
        backend: BackendConfig,
        target: TargetConfig,
        extraction: ExtractionConfig,
    ) -> BackendResult<Self> {
        // Waits are driven from this side; a single command never takes long
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: backend.webdriver_url.trim_end_matches('/').to_string(),
            backend,
            target,
            extraction,
            sign_in_flow: None,
            session_id: None,
        })
    }

    /// Signs in with `credentials` once the browser session is created
    pub fn with_sign_in(mut self, flow: SessionConfig, credentials: Credentials) -> Self {
        self.sign_in_flow = Some((flow, credentials));
        self
    }

    /// The WebDriver session ID, once opened
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// New-session capabilities for the configured browser
    pub fn capabilities(&self) -> Value {
        let browser = self.backend.browser.to_lowercase();
        let mut always_match = json!({ "browserName": browser });

        match browser.as_str() {
            "firefox" => {
                let mut options = json!({
                    // Client certificate prompts would otherwise block the page
                    "prefs": { "security.default_personal_cert": "Select Automatically" }
                });
                if self.backend.headless {
                    options["args"] = json!(["-headless"]);
                }
                always_match["moz:firefoxOptions"] = options;
            }
            "chrome" | "chromium" => {
                if self.backend.headless {
                    always_match["goog:chromeOptions"] = json!({ "args": ["--headless=new"] });
                }
            }
            _ => {}
        }

        json!({ "capabilities": { "alwaysMatch": always_match } })
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> BackendResult<Value> {
        let url = format!("{}/{}", self.endpoint, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let mut payload: Value = response.json().await?;
        let value = payload
            .get_mut("value")
            .map(Value::take)
            .unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(BackendError::WebDriver {
                error: value["error"].as_str().unwrap_or("unknown error").to_string(),
                message: value["message"].as_str().unwrap_or_default().to_string(),
            });
        }

        Ok(value)
    }

    fn session_path(&self, suffix: &str) -> BackendResult<String> {
        let id = self.session_id.as_deref().ok_or(BackendError::NoSession)?;
        Ok(format!("session/{}/{}", id, suffix))
    }

    async fn find_elements(&self, xpath: &str) -> BackendResult<Vec<String>> {
        let path = self.session_path("elements")?;
        let value = self
            .command(
                Method::POST,
                &path,
                Some(json!({ "using": "xpath", "value": xpath })),
            )
            .await?;

        let elements = value
            .as_array()
            .ok_or_else(|| BackendError::Protocol(format!("elements response: {}", value)))?;

        elements
            .iter()
            .map(|element| {
                element[ELEMENT_KEY]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| BackendError::Protocol(format!("element reference: {}", element)))
            })
            .collect()
    }

    async fn is_displayed(&self, element: &str) -> BackendResult<bool> {
        let path = self.session_path(&format!("element/{}/displayed", element))?;
        match self.command(Method::GET, &path, None).await {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            // Re-rendered between lookup and check
            Err(BackendError::WebDriver { error, .. }) if error == "stale element reference" => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn element_text(&self, element: &str) -> BackendResult<String> {
        let path = self.session_path(&format!("element/{}/text", element))?;
        let value = self.command(Method::GET, &path, None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn element_attribute(&self, element: &str, name: &str) -> BackendResult<Option<String>> {
        let path = self.session_path(&format!("element/{}/attribute/{}", element, name))?;
        let value = self.command(Method::GET, &path, None).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self, element: &str) -> BackendResult<()> {
        let path = self.session_path(&format!("element/{}/click", element))?;
        self.command(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    async fn send_keys(&self, element: &str, text: &str) -> BackendResult<()> {
        let path = self.session_path(&format!("element/{}/value", element))?;
        self.command(Method::POST, &path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn go_to_url(&self, url: &str) -> BackendResult<()> {
        let path = self.session_path("url")?;
        self.command(Method::POST, &path, Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    /// Polls until every element matching `xpath` is displayed
    ///
    /// Returns an empty list when nothing visible shows up before `timeout`.
    async fn wait_for_visible(&self, xpath: &str, timeout: Duration) -> BackendResult<Vec<String>> {
        let deadline = Instant::now() + timeout;

        loop {
            let elements = self.find_elements(xpath).await?;
            if !elements.is_empty() {
                let mut all_visible = true;
                for element in &elements {
                    if !self.is_displayed(element).await? {
                        all_visible = false;
                        break;
                    }
                }
                if all_visible {
                    return Ok(elements);
                }
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_one(&self, xpath: &str) -> BackendResult<String> {
        self.wait_for_visible(xpath, SIGN_IN_TIMEOUT)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Protocol(format!("element never appeared: {}", xpath)))
    }

    async fn extract(&self, xpath: &str, timeout: Duration) -> BackendResult<Vec<ItemDescriptor>> {
        let elements = self.wait_for_visible(xpath, timeout).await?;

        let mut items = Vec::with_capacity(elements.len());
        for element in &elements {
            let location = self
                .element_attribute(element, &self.extraction.location_attribute)
                .await?
                .map(|l| l.trim().to_string())
                .unwrap_or_default();
            if location.is_empty() {
                tracing::debug!(
                    "Skipping element without {} attribute",
                    self.extraction.location_attribute
                );
                continue;
            }

            let title = self.element_text(element).await?.trim().to_string();
            items.push(ItemDescriptor { location, title });
        }

        Ok(items)
    }

    async fn sign_in(&self, flow: &SessionConfig, credentials: &Credentials) -> BackendResult<()> {
        let home = format!(
            "{}/{}",
            self.target.base_url.trim_end_matches('/'),
            flow.home_path.trim_start_matches('/')
        );
        tracing::info!("Signing in as {}", credentials.username);
        self.go_to_url(&home).await?;

        let username = self.wait_for_one(&flow.username_field).await?;
        self.send_keys(&username, &credentials.username).await?;
        let password = self.wait_for_one(&flow.password_field).await?;
        self.send_keys(&password, &credentials.password).await?;
        let submit = self.wait_for_one(&flow.submit_button).await?;
        self.click(&submit).await?;

        self.wait_for_one(&flow.ready_landmark).await?;
        Ok(())
    }

    async fn sign_out(&self, flow: &SessionConfig) -> BackendResult<()> {
        let (Some(user_menu), Some(sign_out)) = (&flow.user_menu, &flow.sign_out) else {
            return Ok(());
        };

        let menu = self.wait_for_one(user_menu).await?;
        self.click(&menu).await?;
        let button = self.wait_for_one(sign_out).await?;
        self.click(&button).await?;
        Ok(())
    }
}

/// Quotes `text` as an XPath string literal
///
/// XPath 1.0 has no escapes, so text containing both quote kinds is built
/// with `concat()`.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{}'", text);
    }
    if !text.contains('"') {
        return format!("\"{}\"", text);
    }

    let parts: Vec<String> = text.split('\'').map(|part| format!("'{}'", part)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

#[async_trait]
impl PageNavigator for WebDriverSession {
    async fn navigate_to(&mut self, location: &str) -> BackendResult<()> {
        let url = self.target.item_url(location);
        tracing::debug!("Navigating to {}", url);
        self.go_to_url(&url).await
    }

    async fn wait_for_landmark(&mut self, text: &str, timeout: Duration) -> BackendResult<bool> {
        let xpath = self
            .extraction
            .landmark
            .replace("{title}", &xpath_literal(text));
        Ok(!self.wait_for_visible(&xpath, timeout).await?.is_empty())
    }

    async fn current_location(&mut self) -> BackendResult<String> {
        let path = self.session_path("url")?;
        let value = self.command(Method::GET, &path, None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl ItemExtractor for WebDriverSession {
    async fn query_container_children(
        &mut self,
        timeout: Duration,
    ) -> BackendResult<Vec<ItemDescriptor>> {
        self.extract(&self.extraction.containers, timeout).await
    }

    async fn query_leaf_children(
        &mut self,
        timeout: Duration,
    ) -> BackendResult<Vec<ItemDescriptor>> {
        self.extract(&self.extraction.leaves, timeout).await
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn open(&mut self) -> BackendResult<()> {
        if self.session_id.is_some() {
            return Ok(());
        }

        let value = self
            .command(Method::POST, "session", Some(self.capabilities()))
            .await?;
        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| BackendError::Protocol(format!("new session response: {}", value)))?;
        tracing::info!("Opened {} session {}", self.backend.browser, id);
        self.session_id = Some(id.to_string());

        if let Some((flow, credentials)) = &self.sign_in_flow {
            self.sign_in(flow, credentials).await?;
        }

        Ok(())
    }

    async fn close(&mut self) -> BackendResult<()> {
        let Some(id) = self.session_id.clone() else {
            return Ok(());
        };

        if let Some((flow, _)) = &self.sign_in_flow {
            if let Err(e) = self.sign_out(flow).await {
                tracing::warn!("Sign-out failed: {}", e);
            }
        }

        let result = self
            .command(Method::DELETE, &format!("session/{}", id), None)
            .await;
        self.session_id = None;
        tracing::info!("Closed session {}", id);
        result.map(|_| ())
    }
}
