//! Directory sites that list startups, one adapter per site markup.

use crate::core::links::{Link, LinkFilter};
use crate::utils::error::{Result, ScraperError};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Site-specific rules for walking one repository listing.
pub trait RepositoryAdapter: Send + Sync + fmt::Debug {
    fn kind(&self) -> &'static str;

    /// Listing pages are client-rendered and need the browser.
    fn requires_render(&self) -> bool {
        false
    }

    /// Links to individual startups on a listing page.
    fn entry_filter(&self) -> LinkFilter;

    /// "Next page" links on a listing page. No match means end of listing.
    fn next_page_filter(&self) -> LinkFilter;

    /// When entries are profile pages on the directory itself, the rule that
    /// finds the startup's own website on that profile.
    fn home_page_filter(&self) -> Option<LinkFilter> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct RepositorySource {
    pub name: String,
    pub base_url: Url,
    pub adapter: Arc<dyn RepositoryAdapter>,
}

impl RepositorySource {
    pub fn new(name: impl Into<String>, base_url: Url, adapter: Arc<dyn RepositoryAdapter>) -> Self {
        Self {
            name: name.into(),
            base_url,
            adapter,
        }
    }
}

const SOCIAL_HOSTS: [&str; 10] = [
    "twitter.com",
    "x.com",
    "facebook.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "github.com",
    "medium.com",
    "crunchbase.com",
    "angel.co",
];

fn is_social(link: &Link) -> bool {
    let host = link.url.host_str().unwrap_or_default();
    SOCIAL_HOSTS
        .iter()
        .any(|social| host == *social || host.ends_with(&format!(".{}", social)))
}

fn slug_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in slug pattern is valid")
}

const NEXT_PAGE_SCOPE: &str = "a[rel~=next], .pagination a.next, .pagination .next a, li.next a";

/// startupranking.com country rankings: `/top/<country>` lists profiles
/// (`/<slug>`) whose logo links to the startup's website.
#[derive(Debug, Default)]
pub struct StartupRankingAdapter;

impl RepositoryAdapter for StartupRankingAdapter {
    fn kind(&self) -> &'static str {
        "startupranking"
    }

    fn entry_filter(&self) -> LinkFilter {
        LinkFilter::within(".ranks")
            .same_domain()
            .path_matches(slug_pattern(r"^/[a-z0-9-]+/?$"))
            .strip_query()
    }

    fn next_page_filter(&self) -> LinkFilter {
        LinkFilter::within(NEXT_PAGE_SCOPE).same_domain()
    }

    fn home_page_filter(&self) -> Option<LinkFilter> {
        Some(LinkFilter::within(".su-logo").external().strip_query())
    }
}

/// data.startups.be actor directory (client-rendered).
#[derive(Debug, Default)]
pub struct StartupsBeAdapter;

impl RepositoryAdapter for StartupsBeAdapter {
    fn kind(&self) -> &'static str {
        "startupsbe"
    }

    fn requires_render(&self) -> bool {
        true
    }

    fn entry_filter(&self) -> LinkFilter {
        LinkFilter::any()
            .same_domain()
            .path_matches(slug_pattern(r"^/actors/[^/]+/?$"))
            .strip_query()
    }

    fn next_page_filter(&self) -> LinkFilter {
        LinkFilter::within(NEXT_PAGE_SCOPE).same_domain()
    }

    fn home_page_filter(&self) -> Option<LinkFilter> {
        Some(
            LinkFilter::any()
                .external()
                .custom(|link, _| !is_social(link))
                .strip_query(),
        )
    }
}

/// Config-driven adapter for directories without a dedicated implementation.
#[derive(Debug, Clone, Default)]
pub struct SelectorAdapter {
    pub entry_selector: Option<String>,
    pub entry_pattern: Option<Regex>,
    pub entries_external: bool,
    pub next_selector: Option<String>,
    pub home_selector: Option<String>,
    pub requires_render: bool,
}

impl RepositoryAdapter for SelectorAdapter {
    fn kind(&self) -> &'static str {
        "selectors"
    }

    fn requires_render(&self) -> bool {
        self.requires_render
    }

    fn entry_filter(&self) -> LinkFilter {
        let mut filter = match &self.entry_selector {
            Some(selector) => LinkFilter::within(selector.clone()),
            None => LinkFilter::any(),
        };
        filter = if self.entries_external {
            filter.external().custom(|link, _| !is_social(link))
        } else {
            filter.same_domain()
        };
        if let Some(pattern) = &self.entry_pattern {
            filter = filter.path_matches(pattern.clone());
        }
        filter.strip_query()
    }

    fn next_page_filter(&self) -> LinkFilter {
        match &self.next_selector {
            Some(selector) => LinkFilter::within(selector.clone()).same_domain(),
            // 沒有設定分頁：任何連結都不算下一頁
            None => LinkFilter::any().custom(|_, _| false),
        }
    }

    fn home_page_filter(&self) -> Option<LinkFilter> {
        self.home_selector.as_ref().map(|selector| {
            LinkFilter::within(selector.clone())
                .external()
                .strip_query()
        })
    }
}

/// Adapter kinds addressable from configuration.
pub fn adapter_for_kind(kind: &str) -> Option<Arc<dyn RepositoryAdapter>> {
    match kind {
        "startupranking" => Some(Arc::new(StartupRankingAdapter)),
        "startupsbe" => Some(Arc::new(StartupsBeAdapter)),
        _ => None,
    }
}

/// Named sources known to this run: built-ins plus configured ones.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, RepositorySource>,
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        let builtins: [(&str, &str, Arc<dyn RepositoryAdapter>); 2] = [
            (
                "startupranking",
                "https://www.startupranking.com/top/belgium",
                Arc::new(StartupRankingAdapter),
            ),
            (
                "startupsbe",
                "https://data.startups.be/actors",
                Arc::new(StartupsBeAdapter),
            ),
        ];
        for (name, base, adapter) in builtins {
            if let Ok(base_url) = Url::parse(base) {
                registry.register(RepositorySource::new(name, base_url, adapter));
            }
        }
        registry
    }

    /// Later registrations replace earlier ones with the same name.
    pub fn register(&mut self, source: RepositorySource) {
        self.sources.insert(source.name.clone(), source);
    }

    pub fn get(&self, name: &str) -> Result<&RepositorySource> {
        self.sources
            .get(name)
            .ok_or_else(|| ScraperError::UnknownSource {
                name: name.to_string(),
            })
    }

    /// Resolves every name up front so an unknown one fails before any fetch.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<RepositorySource>> {
        names
            .iter()
            .map(|name| self.get(name.as_ref()).cloned())
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}
