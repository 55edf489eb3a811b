use crate::core::links::{extract_links, link_mentions, same_site, Link, LinkFilter};
use crate::domain::model::PageContent;

pub const DEFAULT_LINK_TERMS: [&str; 6] = ["career", "job", "join us", "vacanc", "hiring", "work with us"];

/// Ordered list of terms used to spot a careers link on a home page.
///
/// Terms are tried in priority order; for each term the page's links are
/// scanned in document order and the first match wins. A page with both
/// "Jobs" and "Careers" links therefore resolves to "Careers".
#[derive(Debug, Clone)]
pub struct JobPagePredicates {
    terms: Vec<String>,
    same_domain_only: bool,
}

impl JobPagePredicates {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            terms,
            same_domain_only: false,
        }
    }

    /// Ignore hosted job boards (e.g. `jobs.lever.co`) and only accept links on the startup's own site.
    pub fn same_domain_only(mut self, enabled: bool) -> Self {
        self.same_domain_only = enabled;
        self
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Pick the job page candidate from a fetched home page.
    pub fn select(&self, home: &PageContent) -> Option<Link> {
        let mut filter = LinkFilter::any();
        if self.same_domain_only {
            filter = filter.same_domain();
        }

        let links: Vec<Link> = extract_links(home, &filter)
            // 指回首頁本身的連結不算
            .filter(|link| !is_same_page(&link.url, &home.url))
            .collect();

        for term in &self.terms {
            if let Some(link) = links.iter().find(|link| link_mentions(link, &home.url, term)) {
                tracing::debug!(
                    home = %home.url,
                    term = %term,
                    candidate = %link.url,
                    "Job page candidate selected"
                );
                return Some(link.clone());
            }
        }
        None
    }
}

impl Default for JobPagePredicates {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_TERMS)
    }
}

fn is_same_page(a: &url::Url, b: &url::Url) -> bool {
    same_site(a, b) && a.path().trim_end_matches('/') == b.path().trim_end_matches('/') && a.query() == b.query()
}
