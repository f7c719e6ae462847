use serde::Deserialize;

/// Default user agent; many sites serve degraded markup to obvious bots.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Main configuration structure for a mirror job
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    pub job: JobConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub headless: HeadlessConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub heuristics: HeuristicsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl MirrorConfig {
    /// Builds a configuration with defaults for everything but the start URL
    pub fn for_url(start_url: impl Into<String>) -> Self {
        Self {
            job: JobConfig {
                start_url: start_url.into(),
                max_pages: default_max_pages(),
                use_sitemap: true,
            },
            fetch: FetchConfig::default(),
            headless: HeadlessConfig::default(),
            assets: AssetsConfig::default(),
            heuristics: HeuristicsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// What to mirror
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// The page the crawl starts from; its host defines the origin
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Maximum number of pages fetched successfully before the crawl stops
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Whether conventional sitemap locations are consulted when seeding
    #[serde(rename = "use-sitemap", default = "default_true")]
    pub use_sitemap: bool,
}

/// Which fetch backend a job starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Render pages in headless Chromium, falling back to HTTP on failure
    #[default]
    Headless,
    /// Plain HTTP requests only
    Http,
}

/// Transport behaviour shared by every network call of a job
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient failures (connection errors, timeouts, 5xx)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubled on each further retry
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Redirect hops followed per request (at most 5)
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Refuse TLS certificates that do not validate
    #[serde(rename = "reject-invalid-certs", default = "default_true")]
    pub reject_invalid_certs: bool,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_redirects: default_max_redirects(),
            reject_invalid_certs: true,
            user_agent: default_user_agent(),
        }
    }
}

/// Headless rendering and content materialization timings
#[derive(Debug, Clone, Deserialize)]
pub struct HeadlessConfig {
    /// Explicit Chromium executable; searched on PATH when absent
    #[serde(rename = "chrome-path", default)]
    pub chrome_path: Option<String>,

    #[serde(rename = "navigation-timeout-secs", default = "default_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Initial wait on the first page of a crawl
    #[serde(rename = "first-page-wait-ms", default = "default_first_page_wait_ms")]
    pub first_page_wait_ms: u64,

    /// Initial wait on every later page
    #[serde(rename = "page-wait-ms", default = "default_page_wait_ms")]
    pub page_wait_ms: u64,

    /// Per-image load timeout used by the image wait steps
    #[serde(rename = "image-timeout-ms", default = "default_image_timeout_ms")]
    pub image_timeout_ms: u64,

    /// Number of "next" clicks used to cycle carousels
    #[serde(rename = "carousel-rounds", default = "default_carousel_rounds")]
    pub carousel_rounds: u32,

    #[serde(rename = "scroll-step-px", default = "default_scroll_step_px")]
    pub scroll_step_px: u32,

    #[serde(rename = "scroll-delay-ms", default = "default_scroll_delay_ms")]
    pub scroll_delay_ms: u64,

    /// Final settle delay before the HTML is captured
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Backend-level failures tolerated before downgrading to HTTP
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            navigation_timeout_secs: default_timeout_secs(),
            first_page_wait_ms: default_first_page_wait_ms(),
            page_wait_ms: default_page_wait_ms(),
            image_timeout_ms: default_image_timeout_ms(),
            carousel_rounds: default_carousel_rounds(),
            scroll_step_px: default_scroll_step_px(),
            scroll_delay_ms: default_scroll_delay_ms(),
            settle_ms: default_settle_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Feature toggles for the asset and content stages
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Download stylesheets, rewrite their `url()`s and build the consolidated CSS
    #[serde(default = "default_true")]
    pub css: bool,

    /// Download images (including srcset candidates, lazy-load and background images)
    #[serde(default = "default_true")]
    pub images: bool,

    /// Download font files referenced from CSS and Google Fonts
    #[serde(default = "default_true")]
    pub fonts: bool,

    /// Download external scripts referenced by `<script src>`
    #[serde(default = "default_true")]
    pub scripts: bool,

    /// Derive per-page titles and slugs for packaging
    #[serde(default = "default_true")]
    pub content: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            css: true,
            images: true,
            fonts: true,
            scripts: true,
            content: true,
        }
    }
}

/// Tunable string heuristics
#[derive(Debug, Clone, Deserialize)]
pub struct HeuristicsConfig {
    /// Regexes identifying placeholder image sources (matched case-insensitively)
    #[serde(rename = "placeholder-patterns", default = "default_placeholder_patterns")]
    pub placeholder_patterns: Vec<String>,

    /// Regex a first path segment must match to be treated as a bare domain
    #[serde(rename = "domain-like-pattern", default = "default_domain_like_pattern")]
    pub domain_like_pattern: String,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            placeholder_patterns: default_placeholder_patterns(),
            domain_like_pattern: default_domain_like_pattern(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the mirror is written into
    #[serde(default = "default_output_directory")]
    pub directory: String,

    /// Optional path of the markdown job report
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            summary_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_pages() -> usize {
    200
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_first_page_wait_ms() -> u64 {
    4000
}

fn default_page_wait_ms() -> u64 {
    1500
}

fn default_image_timeout_ms() -> u64 {
    5000
}

fn default_carousel_rounds() -> u32 {
    6
}

fn default_scroll_step_px() -> u32 {
    400
}

fn default_scroll_delay_ms() -> u64 {
    100
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_output_directory() -> String {
    "./mirror".to_string()
}

pub(crate) fn default_placeholder_patterns() -> Vec<String> {
    [
        r"^data:",
        r"1x1",
        r"pixel\.(gif|png)",
        r"blank\.(gif|png|jpe?g|svg)",
        r"(^|/)(loading|loader|lazy|lazyload)[^/]*\.(gif|png|svg|webp)",
        r"spacer\.(gif|png)",
        r"transparent\.(gif|png)",
        r"placeholder",
        r"empty\.(gif|png)",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

pub(crate) fn default_domain_like_pattern() -> String {
    r"^(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,24}(?::\d+)?$".to_string()
}
