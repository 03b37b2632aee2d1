use serde::Deserialize;

const DEFAULT_INDEX_URL: &str = "https://www.ia.org.hk/en/legislative_framework/circulars/antimoney_laundering/circulars_on_anti-money_laundering_matters.html";
const DEFAULT_YEAR_LINK_PATTERN: &str = "circulars_on_anti-money_laundering_matters_{year}";
const DEFAULT_YEAR_PAGE_TEMPLATE: &str = "https://www.ia.org.hk/en/legislative_framework/circulars/antimoney_laundering/circulars_on_anti-money_laundering_matters_{year}.html";

/// Placeholder substituted with the four-digit year in site patterns
pub const YEAR_PLACEHOLDER: &str = "{year}";

/// Main configuration structure for Sanctions-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Layout of the regulator's circular listing pages
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Master index page linking to each year's listing
    #[serde(rename = "index-url", default = "default_index_url")]
    pub index_url: String,

    /// Substring an index anchor must contain to be the year's page
    #[serde(rename = "year-link-pattern", default = "default_year_link_pattern")]
    pub year_link_pattern: String,

    /// Predicted year page URL used when the index has no link for a year
    #[serde(rename = "year-page-template", default = "default_year_page_template")]
    pub year_page_template: String,
}

impl SiteConfig {
    /// The href fragment identifying `year`'s listing page on the index
    pub fn year_link_needle(&self, year: i32) -> String {
        self.year_link_pattern
            .replace(YEAR_PLACEHOLDER, &year.to_string())
    }

    /// The fallback listing URL for `year`
    pub fn fallback_year_url(&self, year: i32) -> String {
        self.year_page_template
            .replace(YEAR_PLACEHOLDER, &year.to_string())
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            year_link_pattern: default_year_link_pattern(),
            year_page_template: default_year_page_template(),
        }
    }
}

/// Which years a crawl revisits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearPolicy {
    /// Full backfill on an empty store, otherwise only the current year
    Auto,
    /// Always only the current calendar year
    Current,
    /// Always every year from the epoch through the current year
    Backfill,
}

/// Crawl pipeline limits and cadence
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First year circulars were published
    #[serde(rename = "epoch-year", default = "default_epoch_year")]
    pub epoch_year: i32,

    /// Pages read per document; the rest are ignored
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Commit interval inside a document, in pages
    #[serde(rename = "commit-every-pages", default = "default_commit_every_pages")]
    pub commit_every_pages: u32,

    /// Wall-clock ceiling for one invocation (seconds)
    #[serde(rename = "time-budget-secs", default = "default_time_budget_secs")]
    pub time_budget_secs: u64,

    /// Timeout for HTML listing requests (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for PDF downloads (seconds)
    #[serde(rename = "download-timeout-secs", default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Write buffer size for streamed downloads (bytes)
    #[serde(rename = "chunk-size", default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Documents between storage memory reclamation
    #[serde(
        rename = "reclaim-every-documents",
        default = "default_reclaim_every_documents"
    )]
    pub reclaim_every_documents: u32,

    #[serde(rename = "year-policy", default = "default_year_policy")]
    pub year_policy: YearPolicy,

    /// Names shorter than this are not persisted
    #[serde(rename = "min-name-length", default = "default_min_name_length")]
    pub min_name_length: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            epoch_year: default_epoch_year(),
            max_pages: default_max_pages(),
            commit_every_pages: default_commit_every_pages(),
            time_budget_secs: default_time_budget_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            chunk_size: default_chunk_size(),
            reclaim_every_documents: default_reclaim_every_documents(),
            year_policy: default_year_policy(),
            min_name_length: default_min_name_length(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

/// Database locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Local working copy of the SQLite database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Durable location the working copy is restored from and backed up to
    #[serde(rename = "backup-path", default)]
    pub backup_path: Option<String>,
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSink {
    Console,
    File,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_sink")]
    pub sink: LogSink,

    /// Required when `sink = "file"`
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            sink: default_log_sink(),
            file: None,
        }
    }
}

fn default_index_url() -> String {
    DEFAULT_INDEX_URL.to_string()
}

fn default_year_link_pattern() -> String {
    DEFAULT_YEAR_LINK_PATTERN.to_string()
}

fn default_year_page_template() -> String {
    DEFAULT_YEAR_PAGE_TEMPLATE.to_string()
}

fn default_epoch_year() -> i32 {
    2001
}

fn default_max_pages() -> u32 {
    30
}

fn default_commit_every_pages() -> u32 {
    10
}

fn default_time_budget_secs() -> u64 {
    50 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    60
}

fn default_chunk_size() -> usize {
    8192
}

fn default_reclaim_every_documents() -> u32 {
    5
}

fn default_year_policy() -> YearPolicy {
    YearPolicy::Auto
}

fn default_min_name_length() -> usize {
    4
}

fn default_crawler_name() -> String {
    "SanctionsHarvest".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_log_sink() -> LogSink {
    LogSink::Console
}
