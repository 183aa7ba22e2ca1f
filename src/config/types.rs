use serde::Deserialize;

/// Main configuration structure for Docket
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub family: FamilyConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Crawl scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of leading listing pages re-visited on every incremental cycle
    #[serde(rename = "window-size")]
    pub window_size: u32,

    /// Maximum number of listing pages visited per cycle
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Delay after each page or document fetch (milliseconds)
    #[serde(rename = "politeness-delay-ms")]
    pub politeness_delay_ms: u64,

    /// Upper bound on pagination links returned per page
    #[serde(rename = "max-next-pages", default = "default_max_next_pages")]
    pub max_next_pages: usize,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_next_pages() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    30
}

/// Retry policy for transient fetch failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

/// Pool of client identities rotated across retry attempts
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    pub identities: Vec<String>,
}

/// Identity cache behavior
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Warm the identity cache from the store before each cycle
    #[serde(rename = "preload-cache")]
    pub preload_cache: bool,

    /// Maximum number of entries held per cache map
    #[serde(rename = "cache-capacity")]
    pub cache_capacity: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            preload_cache: true,
            cache_capacity: 50_000,
        }
    }
}

/// Family clustering parameters
#[derive(Debug, Clone, Deserialize)]
pub struct FamilyConfig {
    /// Minimum normalized title similarity for joining an existing family
    #[serde(rename = "similarity-threshold")]
    pub similarity_threshold: f64,

    /// Number of member embeddings averaged into the family centroid
    #[serde(rename = "centroid-sample-size")]
    pub centroid_sample_size: usize,
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            centroid_sample_size: 10,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A crawlable listing source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique source name
    pub name: String,

    /// Scraper variant token (e.g. "generic", "table-listing", "archive")
    #[serde(rename = "source-type", default = "default_source_type")]
    pub source_type: String,

    /// First listing page
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Category applied when metadata extraction finds none
    #[serde(default)]
    pub category: Option<String>,

    /// Owner applied when metadata extraction finds none
    #[serde(default)]
    pub owner: Option<String>,

    /// Per-source override of `crawler.window-size`
    #[serde(rename = "window-size", default)]
    pub window_size: Option<u32>,

    /// Per-source override of `crawler.max-pages`
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Ignore previous frontier state and walk the whole listing
    #[serde(rename = "force-full-scan", default)]
    pub force_full_scan: bool,
}

fn default_source_type() -> String {
    "generic".to_string()
}

impl SourceConfig {
    pub fn window_size(&self, crawler: &CrawlerConfig) -> u32 {
        self.window_size.unwrap_or(crawler.window_size)
    }

    pub fn max_pages(&self, crawler: &CrawlerConfig) -> u32 {
        self.max_pages.unwrap_or(crawler.max_pages)
    }
}
