use crate::adapters::repository::RepositorySource;
use crate::core::links::extract_links;
use crate::domain::model::{home_url_key, CrawlDepth, PageContent};
use crate::domain::ports::PageFetcher;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A startup home page and the repository source that reported it first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUrl {
    pub url: Url,
    pub source: String,
}

/// Walks repository listings breadth-first and collects startup home pages.
pub struct RepositoryLocator {
    fetcher: Arc<dyn PageFetcher>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl RepositoryLocator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Traverses every source concurrently and merges the results in the
    /// order the sources were given, so the first source listing a URL keeps it.
    pub async fn locate(&self, sources: &[RepositorySource], depth: CrawlDepth) -> Vec<DiscoveredUrl> {
        let per_source = futures::future::join_all(
            sources.iter().map(|source| self.locate_source(source, depth)),
        )
        .await;

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for (source, urls) in sources.iter().zip(per_source) {
            for url in urls {
                if seen.insert(home_url_key(&url)) {
                    merged.push(DiscoveredUrl {
                        url,
                        source: source.name.clone(),
                    });
                } else {
                    tracing::debug!(url = %url, source = %source.name, "Already discovered via another source");
                }
            }
        }
        merged
    }

    /// Home page URLs listed by one source, in discovery order.
    pub async fn locate_source(&self, source: &RepositorySource, depth: CrawlDepth) -> Vec<Url> {
        let adapter = &source.adapter;
        let render = self.render_for(source);
        let entry_filter = adapter.entry_filter();
        let next_filter = adapter.next_page_filter();

        tracing::info!(
            source = %source.name,
            adapter = adapter.kind(),
            base_url = %source.base_url,
            depth = depth.hops(),
            "🔎 Traversing repository"
        );

        let mut visited: HashSet<String> = HashSet::from([source.base_url.to_string()]);
        let mut entry_keys: HashSet<String> = HashSet::new();
        let mut entries: Vec<Url> = Vec::new();
        let mut frontier = vec![source.base_url.clone()];

        'hops: for hop in 0..=depth.hops() {
            if frontier.is_empty() {
                tracing::debug!(source = %source.name, hop, "No next page, end of listing");
                break;
            }

            let mut next_frontier = Vec::new();
            let mut new_entries = 0usize;

            for page_url in std::mem::take(&mut frontier) {
                if self.cancel.is_cancelled() {
                    tracing::warn!(source = %source.name, hop, "Traversal cancelled");
                    break 'hops;
                }
                // 單一頁面失敗只放棄這條分支
                let Some(page) = self.fetch(&page_url, render).await else {
                    continue;
                };

                for link in extract_links(&page, &entry_filter) {
                    if entry_keys.insert(link.url.to_string()) {
                        entries.push(link.url);
                        new_entries += 1;
                    }
                }

                if hop < depth.hops() {
                    for link in extract_links(&page, &next_filter) {
                        if visited.insert(link.url.to_string()) {
                            next_frontier.push(link.url);
                        }
                    }
                }
            }

            tracing::info!(source = %source.name, hop, new_entries, "Listing hop done");
            // 第一頁沒有條目時仍會跟隨下一頁
            if hop > 0 && new_entries == 0 {
                break;
            }
            frontier = next_frontier;
        }

        match adapter.home_page_filter() {
            Some(_) => self.resolve_home_pages(source, entries).await,
            None => entries,
        }
    }

    /// Follows profile pages on the directory to the startups' own websites.
    async fn resolve_home_pages(&self, source: &RepositorySource, profiles: Vec<Url>) -> Vec<Url> {
        let Some(home_filter) = source.adapter.home_page_filter() else {
            return profiles;
        };
        let render = self.render_for(source);
        let home_filter = &home_filter;

        tracing::info!(source = %source.name, profiles = profiles.len(), "Resolving profile pages");

        // buffered 保持原本的發現順序
        let homes: Vec<Option<Url>> = stream::iter(profiles)
            .map(|profile| async move {
                if self.cancel.is_cancelled() {
                    return None;
                }
                let page = self.fetch(&profile, render).await?;
                let home = extract_links(&page, home_filter).next().map(|link| link.url);
                if home.is_none() {
                    tracing::warn!(profile = %profile, "Profile page has no home page link, skipping");
                }
                home
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut seen = HashSet::new();
        homes
            .into_iter()
            .flatten()
            .filter(|url| seen.insert(home_url_key(url)))
            .collect()
    }

    /// Rendered fetches only when the adapter asks for them and a renderer is
    /// attached; otherwise the source is read from its static HTML.
    fn render_for(&self, source: &RepositorySource) -> bool {
        if !source.adapter.requires_render() {
            return false;
        }
        if !self.fetcher.can_render() {
            tracing::warn!(
                source = %source.name,
                "⚠️ Source prefers rendered pages but no renderer is available, using static HTML"
            );
            return false;
        }
        true
    }

    async fn fetch(&self, url: &Url, render: bool) -> Option<PageContent> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = self.fetcher.fetch(url, render) => match result {
                Ok(page) => Some(page),
                Err(e) => {
                    tracing::warn!(url = %url, "⚠️ Abandoning branch: {}", e);
                    None
                }
            },
        }
    }
}
