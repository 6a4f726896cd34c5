use serde::Deserialize;

/// Main configuration structure for Branchmap
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub session: Option<SessionConfig>,
    #[serde(default)]
    pub crawl: CrawlConfig,
    pub output: OutputConfig,
}

/// The application being snapshotted
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Base URL of the application, without a trailing slash
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Dataset name stamped on every node
    #[serde(rename = "scope-name")]
    pub scope_name: String,

    /// Path segment between the base URL and an item location
    #[serde(rename = "item-path", default = "default_item_path")]
    pub item_path: String,

    /// Appended after the location's trailing slash
    #[serde(rename = "item-suffix", default)]
    pub item_suffix: String,
}

impl TargetConfig {
    /// Builds the page URL for an item location
    pub fn item_url(&self, location: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.item_path.trim_matches('/'),
            location,
            self.item_suffix
        )
    }
}

/// Which automation backend renders pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// A W3C WebDriver server driving a real browser
    Webdriver,
    /// Plain HTTP fetches of server-rendered HTML
    Static,
}

/// Browser backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,

    /// WebDriver server endpoint (geckodriver, chromedriver, selenium)
    #[serde(rename = "webdriver-url", default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_browser")]
    pub browser: String,

    #[serde(default)]
    pub headless: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            webdriver_url: default_webdriver_url(),
            browser: default_browser(),
            headless: false,
        }
    }
}

/// Navigation retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between attempts (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// How long one attempt waits for the landmark (seconds)
    #[serde(rename = "landmark-timeout-secs", default = "default_landmark_timeout")]
    pub landmark_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            landmark_timeout_secs: default_landmark_timeout(),
        }
    }
}

/// Selectors used to find the landmark and the children on a page
///
/// XPath for the webdriver backend, CSS for the static backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// How long to wait for each child region (seconds)
    #[serde(rename = "timeout-secs", default = "default_extraction_timeout")]
    pub timeout_secs: u64,

    /// Element attribute holding the item location
    #[serde(rename = "location-attribute", default = "default_location_attribute")]
    pub location_attribute: String,

    #[serde(default = "default_landmark")]
    pub landmark: String,

    #[serde(default = "default_containers")]
    pub containers: String,

    #[serde(default = "default_leaves")]
    pub leaves: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extraction_timeout(),
            location_attribute: default_location_attribute(),
            landmark: default_landmark(),
            containers: default_containers(),
            leaves: default_leaves(),
        }
    }
}

/// Sign-in and sign-out page flow (webdriver only)
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "home-path", default = "default_home_path")]
    pub home_path: String,

    #[serde(rename = "username-field")]
    pub username_field: String,

    #[serde(rename = "password-field")]
    pub password_field: String,

    #[serde(rename = "submit-button")]
    pub submit_button: String,

    /// Element that appears once the home page has loaded after sign-in
    #[serde(rename = "ready-landmark")]
    pub ready_landmark: String,

    #[serde(rename = "user-menu", default)]
    pub user_menu: Option<String>,

    #[serde(rename = "sign-out", default)]
    pub sign_out: Option<String>,
}

/// Traversal behavior
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlConfig {
    #[serde(default)]
    pub revisit: crate::crawler::RevisitPolicy,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_item_path() -> String {
    "#insights/item".to_string()
}

fn default_backend_kind() -> BackendKind {
    BackendKind::Webdriver
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_browser() -> String {
    "firefox".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    5000
}

fn default_landmark_timeout() -> u64 {
    30
}

fn default_extraction_timeout() -> u64 {
    5
}

fn default_location_attribute() -> String {
    "data-cpn-factsheet-item-id".to_string()
}

fn default_landmark() -> String {
    "//h1[contains(text(), {title})]".to_string()
}

fn default_containers() -> String {
    "//div[@data-cpn-factsheet-mark='propertyContent' and descendant::h2[contains(text(),'Subgrupos')]]//a"
        .to_string()
}

fn default_leaves() -> String {
    "//div[@data-cpn-factsheet-mark='propertyContent' and descendant::h2[contains(text(),'Modelos')]]//a"
        .to_string()
}

fn default_home_path() -> String {
    "#default/home".to_string()
}
