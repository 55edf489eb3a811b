//! Link extraction over fetched pages.
//!
//! Anchors are collected from the parsed document up front (`scraper::Html`
//! cannot cross an `.await`), then resolved, filtered and deduplicated lazily
//! while the returned [`Links`] iterator is consumed.

use crate::domain::model::PageContent;
use crate::utils::error::{Result, ScraperError};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: Url,
    pub text: String,
}

pub type LinkPredicate = Arc<dyn Fn(&Link, &Url) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum LinkRule {
    SameDomain,
    ExternalDomain,
    PathMatches(Regex),
    /// Case-insensitive; any term may match.
    TextOrHrefContains(Vec<String>),
    Custom(LinkPredicate),
}

impl LinkRule {
    fn accepts(&self, link: &Link, page_url: &Url) -> bool {
        match self {
            LinkRule::SameDomain => same_site(&link.url, page_url),
            LinkRule::ExternalDomain => !same_site(&link.url, page_url),
            LinkRule::PathMatches(re) => re.is_match(link.url.path()),
            LinkRule::TextOrHrefContains(terms) => terms
                .iter()
                .any(|term| link_mentions(link, page_url, &term.to_lowercase())),
            LinkRule::Custom(predicate) => predicate(link, page_url),
        }
    }
}

impl fmt::Debug for LinkRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRule::SameDomain => write!(f, "SameDomain"),
            LinkRule::ExternalDomain => write!(f, "ExternalDomain"),
            LinkRule::PathMatches(re) => write!(f, "PathMatches({})", re.as_str()),
            LinkRule::TextOrHrefContains(terms) => write!(f, "TextOrHrefContains({:?})", terms),
            LinkRule::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// 檢查連結文字或網址是否包含關鍵字。同站連結只看路徑，避免網域名稱本身誤判。
pub fn link_mentions(link: &Link, page_url: &Url, term_lower: &str) -> bool {
    if link.text.to_lowercase().contains(term_lower) {
        return true;
    }

    let href = if same_site(&link.url, page_url) {
        match link.url.query() {
            Some(q) => format!("{}?{}", link.url.path(), q),
            None => link.url.path().to_string(),
        }
    } else {
        format!("{}{}", link.url.host_str().unwrap_or_default(), link.url.path())
    };
    href.to_lowercase().contains(term_lower)
}

/// `www.` 前綴視為同一站
pub fn same_site(a: &Url, b: &Url) -> bool {
    fn bare(u: &Url) -> &str {
        let host = u.host_str().unwrap_or_default();
        host.strip_prefix("www.").unwrap_or(host)
    }
    bare(a).eq_ignore_ascii_case(bare(b))
}

/// Caller-supplied selection rules for [`extract_links`]. All rules must pass.
#[derive(Clone, Default, Debug)]
pub struct LinkFilter {
    scope: Option<String>,
    rules: Vec<LinkRule>,
    strip_query: bool,
}

impl LinkFilter {
    pub fn any() -> Self {
        Self::default()
    }

    /// Only consider anchors inside elements matching `selector`.
    pub fn within(selector: impl Into<String>) -> Self {
        Self {
            scope: Some(selector.into()),
            ..Self::default()
        }
    }

    pub fn rule(mut self, rule: LinkRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn same_domain(self) -> Self {
        self.rule(LinkRule::SameDomain)
    }

    pub fn external(self) -> Self {
        self.rule(LinkRule::ExternalDomain)
    }

    pub fn path_matches(self, re: Regex) -> Self {
        self.rule(LinkRule::PathMatches(re))
    }

    pub fn text_or_href_contains<I, S>(self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule(LinkRule::TextOrHrefContains(
            terms.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn custom<F>(self, predicate: F) -> Self
    where
        F: Fn(&Link, &Url) -> bool + Send + Sync + 'static,
    {
        self.rule(LinkRule::Custom(Arc::new(predicate)))
    }

    /// Drop query strings from results (directory sites append tracking params).
    pub fn strip_query(mut self) -> Self {
        self.strip_query = true;
        self
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn accepts(&self, link: &Link, page_url: &Url) -> bool {
        self.rules.iter().all(|rule| rule.accepts(link, page_url))
    }
}

#[derive(Debug)]
struct RawAnchor {
    href: String,
    text: String,
}

/// Lazy, finite, single-pass sequence of absolute links from one page.
#[derive(Debug)]
pub struct Links {
    anchors: std::vec::IntoIter<RawAnchor>,
    base: Url,
    page_url: Url,
    filter: LinkFilter,
    seen: HashSet<String>,
}

impl Links {
    fn empty(page_url: Url, filter: LinkFilter) -> Self {
        Self {
            anchors: Vec::new().into_iter(),
            base: page_url.clone(),
            page_url,
            filter,
            seen: HashSet::new(),
        }
    }
}

impl Iterator for Links {
    type Item = Link;

    fn next(&mut self) -> Option<Link> {
        loop {
            let anchor = self.anchors.next()?;

            let Ok(mut url) = self.base.join(anchor.href.trim()) else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            url.set_fragment(None);
            if self.filter.strip_query {
                url.set_query(None);
            }

            let link = Link {
                url,
                text: anchor.text,
            };
            if !self.filter.accepts(&link, &self.page_url) {
                continue;
            }
            if !self.seen.insert(link.url.as_str().to_string()) {
                continue;
            }
            return Some(link);
        }
    }
}

pub fn extract_links(content: &PageContent, filter: &LinkFilter) -> Links {
    match collect_anchors(content, filter) {
        Ok((base, anchors)) => Links {
            anchors: anchors.into_iter(),
            base,
            page_url: content.url.clone(),
            filter: filter.clone(),
            seen: HashSet::new(),
        },
        Err(e) => {
            // 解析失敗等同「沒有連結」
            tracing::debug!(url = %content.url, "No links extracted: {}", e);
            Links::empty(content.url.clone(), filter.clone())
        }
    }
}

/// True when the page offers at least one followable http(s) link.
pub fn has_usable_links(content: &PageContent) -> bool {
    extract_links(content, &LinkFilter::any()).next().is_some()
}

fn collect_anchors(content: &PageContent, filter: &LinkFilter) -> Result<(Url, Vec<RawAnchor>)> {
    if content.is_blank() {
        return Err(ScraperError::ExtractionError {
            message: "empty document".to_string(),
        });
    }

    let document = Html::parse_document(&content.html);
    let base = resolve_base(&document, &content.url)?;
    let anchor_selector = parse_selector("a[href]")?;

    let to_raw = |el: scraper::ElementRef<'_>| {
        let href = el.value().attr("href").unwrap_or_default().to_string();
        let mut text = el.text().collect::<Vec<_>>().join(" ");
        if text.trim().is_empty() {
            // 圖示連結常只有 aria-label / title
            text = el
                .value()
                .attr("aria-label")
                .or_else(|| el.value().attr("title"))
                .unwrap_or_default()
                .to_string();
        }
        RawAnchor {
            href,
            text: normalize_whitespace(&text),
        }
    };

    let anchors = match filter.scope() {
        Some(scope) => {
            let scope_selector = parse_selector(scope)?;
            document
                .select(&scope_selector)
                .flat_map(|container| {
                    // 範圍選擇器本身就是 <a> 的情況
                    let own = container
                        .value()
                        .attr("href")
                        .is_some()
                        .then_some(container);
                    own.into_iter()
                        .chain(container.select(&anchor_selector))
                        .collect::<Vec<_>>()
                })
                .map(to_raw)
                .collect()
        }
        None => document.select(&anchor_selector).map(to_raw).collect(),
    };

    Ok((base, anchors))
}

fn resolve_base(document: &Html, page_url: &Url) -> Result<Url> {
    if page_url.cannot_be_a_base() {
        return Err(ScraperError::ExtractionError {
            message: format!("{} cannot be used to resolve relative links", page_url),
        });
    }

    let base_selector = parse_selector("base[href]")?;
    let declared = document
        .select(&base_selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"));

    Ok(declared.unwrap_or_else(|| page_url.clone()))
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScraperError::ExtractionError {
        message: format!("invalid selector '{}': {}", selector, e),
    })
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
