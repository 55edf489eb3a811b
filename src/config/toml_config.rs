use crate::adapters::http::{FetcherSettings, DEFAULT_USER_AGENT};
use crate::adapters::repository::{adapter_for_kind, RepositoryAdapter, RepositorySource, SelectorAdapter, SourceRegistry};
use crate::core::job_page::{JobPagePredicates, DEFAULT_LINK_TERMS};
use crate::core::matcher::{KeywordSet, MatchMode};
use crate::domain::model::{ConcurrencyPolicy, CrawlDepth, MAX_CRAWL_DEPTH};
use crate::utils::error::{Result, ScraperError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub crawl: CrawlConfig,
    pub keywords: KeywordConfig,
    pub job_page: JobPageConfig,
    pub sources: Vec<SourceDefinition>,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub sources: Vec<String>,
    pub depth: u32,
    pub concurrency: usize,
    pub fetch_timeout_seconds: u64,
    pub render: bool,
    pub max_render_sessions: usize,
    pub max_crawl_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            sources: vec!["startupranking".to_string()],
            depth: 3,
            concurrency: ConcurrencyPolicy::DEFAULT_WORKERS,
            fetch_timeout_seconds: 20,
            render: false,
            max_render_sessions: 2,
            max_crawl_seconds: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub terms: Vec<String>,
    pub match_mode: MatchMode,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            terms: ["data scientist", "machine learning", "artificial intelligence"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            match_mode: MatchMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPageConfig {
    /// 依優先順序排列，第一個命中的詞決定職缺頁
    pub link_terms: Vec<String>,
    pub same_domain_only: bool,
}

impl Default for JobPageConfig {
    fn default() -> Self {
        Self {
            link_terms: DEFAULT_LINK_TERMS.iter().map(|s| s.to_string()).collect(),
            same_domain_only: false,
        }
    }
}

/// A `[[sources]]` entry. Entries win over built-ins with the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub name: String,
    pub adapter: String,
    pub base_url: String,
    pub entry_selector: Option<String>,
    pub entry_pattern: Option<String>,
    /// Listing links point straight at startup home pages.
    #[serde(default)]
    pub entries_external: bool,
    pub next_selector: Option<String>,
    pub home_selector: Option<String>,
    #[serde(default)]
    pub requires_render: bool,
}

impl SourceDefinition {
    fn adapter(&self) -> Result<Arc<dyn RepositoryAdapter>> {
        if self.adapter == "selectors" {
            let entry_pattern = match &self.entry_pattern {
                Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                    ScraperError::InvalidConfigValueError {
                        field: format!("sources.{}.entry_pattern", self.name),
                        value: pattern.clone(),
                        reason: e.to_string(),
                    }
                })?),
                None => None,
            };
            return Ok(Arc::new(SelectorAdapter {
                entry_selector: self.entry_selector.clone(),
                entry_pattern,
                entries_external: self.entries_external,
                next_selector: self.next_selector.clone(),
                home_selector: self.home_selector.clone(),
                requires_render: self.requires_render,
            }));
        }

        adapter_for_kind(&self.adapter).ok_or_else(|| ScraperError::InvalidConfigValueError {
            field: format!("sources.{}.adapter", self.name),
            value: self.adapter.clone(),
            reason: "Expected one of: startupranking, startupsbe, selectors".to_string(),
        })
    }

    fn validate_rules(&self) -> Result<()> {
        let field = |key: &str| format!("sources.{}.{}", self.name, key);

        if self.name.trim().is_empty() {
            return Err(ScraperError::MissingConfigError {
                field: "sources.name".to_string(),
            });
        }
        validation::validate_url(&field("base_url"), &self.base_url)?;
        for (key, selector) in [
            ("entry_selector", &self.entry_selector),
            ("next_selector", &self.next_selector),
            ("home_selector", &self.home_selector),
        ] {
            if let Some(selector) = selector {
                validation::validate_selector(&field(key), selector)?;
            }
        }
        if let Some(pattern) = &self.entry_pattern {
            validation::validate_regex(&field("entry_pattern"), pattern)?;
        }
        self.adapter().map(|_| ())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    /// Home pages appended by hand, on top of whatever the sources yield.
    pub startups: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output/results.csv".to_string(),
            startups: Vec::new(),
        }
    }
}

impl ScraperConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScraperError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ScraperError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DIRECTORY_URL})，未設定的變數保留原字串
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("env placeholder pattern is valid");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn crawl_depth(&self) -> Result<CrawlDepth> {
        CrawlDepth::new(self.crawl.depth)
    }

    pub fn concurrency_policy(&self) -> Result<ConcurrencyPolicy> {
        ConcurrencyPolicy::new(self.crawl.concurrency)
    }

    pub fn keyword_set(&self) -> KeywordSet {
        KeywordSet::new(&self.keywords.terms, self.keywords.match_mode)
    }

    pub fn predicates(&self) -> JobPagePredicates {
        JobPagePredicates::new(&self.job_page.link_terms).same_domain_only(self.job_page.same_domain_only)
    }

    pub fn fetcher_settings(&self) -> FetcherSettings {
        FetcherSettings {
            timeout: Duration::from_secs(self.crawl.fetch_timeout_seconds),
            user_agent: self
                .crawl
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_render_sessions: self.crawl.max_render_sessions,
            ..FetcherSettings::default()
        }
    }

    pub fn max_crawl_duration(&self) -> Option<Duration> {
        self.crawl.max_crawl_seconds.map(Duration::from_secs)
    }

    pub fn manual_urls(&self) -> Result<Vec<Url>> {
        self.output
            .startups
            .iter()
            .map(|raw| {
                validation::validate_url("output.startups", raw)?;
                Url::parse(raw).map_err(|e| ScraperError::InvalidConfigValueError {
                    field: "output.startups".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Built-in sources merged with `[[sources]]`.
    pub fn registry(&self) -> Result<SourceRegistry> {
        let mut registry = SourceRegistry::builtin();
        for definition in &self.sources {
            let base_url = Url::parse(&definition.base_url).map_err(|e| {
                ScraperError::InvalidConfigValueError {
                    field: format!("sources.{}.base_url", definition.name),
                    value: definition.base_url.clone(),
                    reason: e.to_string(),
                }
            })?;
            registry.register(RepositorySource::new(
                definition.name.clone(),
                base_url,
                definition.adapter()?,
            ));
        }
        Ok(registry)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_range("crawl.depth", self.crawl.depth, 0, MAX_CRAWL_DEPTH)?;
        validation::validate_positive_number("crawl.concurrency", self.crawl.concurrency, 1)?;
        validation::validate_positive_number(
            "crawl.fetch_timeout_seconds",
            self.crawl.fetch_timeout_seconds as usize,
            1,
        )?;
        validation::validate_positive_number(
            "crawl.max_render_sessions",
            self.crawl.max_render_sessions,
            1,
        )?;
        if let Some(seconds) = self.crawl.max_crawl_seconds {
            validation::validate_positive_number("crawl.max_crawl_seconds", seconds as usize, 1)?;
        }

        validation::validate_non_empty_list("keywords.terms", &self.keywords.terms)?;
        validation::validate_non_empty_list("job_page.link_terms", &self.job_page.link_terms)?;

        for definition in &self.sources {
            definition.validate_rules()?;
        }

        validation::validate_path("output.path", &self.output.path)?;
        self.manual_urls()?;

        // 來源名稱必須對得上內建或 [[sources]]
        let registry = self.registry()?;
        registry.resolve(self.crawl.sources.as_slice())?;

        Ok(())
    }
}

impl Validate for ScraperConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
