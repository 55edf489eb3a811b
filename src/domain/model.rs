use crate::utils::error::{Result, ScraperError};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use url::Url;

/// 一次抓取的結果。`url` 為重新導向後的最終網址，用來解析相對連結。
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: Url,
    pub html: String,
    pub rendered: bool,
}

impl PageContent {
    pub fn new(url: Url, html: impl Into<String>, rendered: bool) -> Self {
        Self {
            url,
            html: html.into(),
            rendered,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.html.trim().is_empty()
    }
}

pub const MAX_CRAWL_DEPTH: u32 = 50;

/// Number of "next page" hops followed per repository source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct CrawlDepth(u32);

impl CrawlDepth {
    pub fn new(hops: u32) -> Result<Self> {
        if hops > MAX_CRAWL_DEPTH {
            return Err(ScraperError::InvalidConfigValueError {
                field: "crawl.depth".to_string(),
                value: hops.to_string(),
                reason: format!("Depth must be between 0 and {}", MAX_CRAWL_DEPTH),
            });
        }
        Ok(Self(hops))
    }

    pub fn hops(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for CrawlDepth {
    type Error = ScraperError;

    fn try_from(value: i64) -> Result<Self> {
        let hops = u32::try_from(value).map_err(|_| ScraperError::InvalidConfigValueError {
            field: "crawl.depth".to_string(),
            value: value.to_string(),
            reason: "Depth must be a non-negative integer".to_string(),
        })?;
        Self::new(hops)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyPolicy {
    pub max_workers: usize,
}

impl ConcurrencyPolicy {
    pub const DEFAULT_WORKERS: usize = 4;

    pub fn new(max_workers: usize) -> Result<Self> {
        crate::utils::validation::validate_positive_number("crawl.concurrency", max_workers, 1)?;
        Ok(Self { max_workers })
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            max_workers: Self::DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupStatus {
    Pending,
    JobPageFound,
    JobPageNotFound,
    FetchFailed,
}

impl StartupStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StartupStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StartupStatus::Pending => "pending",
            StartupStatus::JobPageFound => "job_page_found",
            StartupStatus::JobPageNotFound => "job_page_not_found",
            StartupStatus::FetchFailed => "fetch_failed",
        }
    }
}

impl fmt::Display for StartupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a startup URL came from. The first source to report a URL keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySource {
    Repository(String),
    Manual,
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoverySource::Repository(name) => f.write_str(name),
            DiscoverySource::Manual => f.write_str("manual"),
        }
    }
}

impl Serialize for DiscoverySource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Terminal outcome of resolving one startup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    JobPageFound {
        job_page_url: Url,
        keyword_hits: Vec<String>,
    },
    JobPageNotFound,
    FetchFailed {
        job_page_url: Option<Url>,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StartupRecord {
    #[serde(serialize_with = "serialize_url")]
    pub home_url: Url,
    pub name: String,
    pub discovered_via: DiscoverySource,
    #[serde(serialize_with = "serialize_optional_url")]
    pub job_page_url: Option<Url>,
    pub keyword_hits: Vec<String>,
    pub status: StartupStatus,
    pub failure_reason: Option<String>,
}

impl StartupRecord {
    pub fn new(home_url: Url, discovered_via: DiscoverySource) -> Self {
        let name = name_from_url(&home_url);
        Self {
            home_url,
            name,
            discovered_via,
            job_page_url: None,
            keyword_hits: Vec::new(),
            status: StartupStatus::Pending,
            failure_reason: None,
        }
    }

    /// 只允許 Pending → 終態，回傳是否有套用
    pub fn advance(&mut self, resolution: Resolution) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        match resolution {
            Resolution::JobPageFound {
                job_page_url,
                keyword_hits,
            } => {
                self.job_page_url = Some(job_page_url);
                self.keyword_hits = keyword_hits;
                self.status = StartupStatus::JobPageFound;
            }
            Resolution::JobPageNotFound => {
                self.status = StartupStatus::JobPageNotFound;
            }
            Resolution::FetchFailed {
                job_page_url,
                reason,
            } => {
                self.job_page_url = job_page_url;
                self.failure_reason = Some(reason);
                self.status = StartupStatus::FetchFailed;
            }
        }
        true
    }

    pub fn has_job(&self) -> bool {
        !self.keyword_hits.is_empty()
    }
}

/// `https://www.lyst.com/` → `lyst`, `https://app.foo.io` → `appfoo`
pub fn name_from_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let without_tld = match host.rfind('.') {
        Some(idx) => &host[..idx],
        None => host,
    };
    without_tld.replace('.', "")
}

/// Identity of a home page for deduplication: `http://www.lyst.com` and
/// `https://lyst.com/` are the same startup.
pub fn home_url_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let path = url.path().trim_end_matches('/');
    match url.query() {
        Some(q) => format!("{}{}?{}", host, path, q),
        None => format!("{}{}", host, path),
    }
}

fn serialize_url<S: Serializer>(url: &Url, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(url.as_str())
}

fn serialize_optional_url<S: Serializer>(
    url: &Option<Url>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match url {
        Some(url) => serializer.serialize_some(url.as_str()),
        None => serializer.serialize_none(),
    }
}

/// One line of the exported report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub home_url: String,
    pub job_page_url: String,
    pub status: StartupStatus,
    pub matched_keywords: String,
}

impl From<&StartupRecord> for ResultRow {
    fn from(record: &StartupRecord) -> Self {
        Self {
            home_url: record.home_url.to_string(),
            job_page_url: record
                .job_page_url
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_default(),
            status: record.status,
            matched_keywords: record.keyword_hits.join(","),
        }
    }
}
