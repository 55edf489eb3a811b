use crate::adapters::repository::SourceRegistry;
use crate::core::export::{render_csv, render_json, ExportFormat, StatusCounts};
use crate::core::job_page::JobPagePredicates;
use crate::core::locator::RepositoryLocator;
use crate::core::matcher::KeywordSet;
use crate::core::startup::{ResolveContext, Startup};
use crate::domain::model::{
    home_url_key, ConcurrencyPolicy, CrawlDepth, DiscoverySource, ResultRow, StartupRecord,
};
use crate::domain::ports::{PageFetcher, Storage};
use crate::utils::error::{Result, ScraperError};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub counts: StatusCounts,
    /// The run stopped early. Unfinished startups are still `Pending`.
    pub cancelled: bool,
}

/// Owns the discovered URLs and the startups built from them.
pub struct StartupList {
    fetcher: Arc<dyn PageFetcher>,
    registry: SourceRegistry,
    predicates: Arc<JobPagePredicates>,
    urls: Vec<(Url, DiscoverySource)>,
    url_keys: HashSet<String>,
    startups: Vec<Startup>,
    cancel: CancellationToken,
    locate_concurrency: usize,
}

impl StartupList {
    pub fn new(fetcher: Arc<dyn PageFetcher>, registry: SourceRegistry) -> Self {
        Self {
            fetcher,
            registry,
            predicates: Arc::new(JobPagePredicates::default()),
            urls: Vec::new(),
            url_keys: HashSet::new(),
            startups: Vec::new(),
            cancel: CancellationToken::new(),
            locate_concurrency: ConcurrencyPolicy::DEFAULT_WORKERS,
        }
    }

    pub fn with_predicates(mut self, predicates: JobPagePredicates) -> Self {
        self.predicates = Arc::new(predicates);
        self
    }

    /// Profile pages fetched in parallel while locating.
    pub fn with_locate_concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.locate_concurrency = policy.max_workers;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 先解析所有來源名稱，未知名稱在任何抓取之前就失敗
    pub async fn locate_startups<S: AsRef<str>>(&mut self, names: &[S], depth: CrawlDepth) -> Result<usize> {
        let sources = self.registry.resolve(names)?;
        tracing::info!(
            "🔎 Locating startups in {} source(s), depth {}",
            sources.len(),
            depth.hops()
        );

        let locator = RepositoryLocator::new(self.fetcher.clone(), self.locate_concurrency)
            .with_cancellation(self.cancel.clone());
        let discovered = locator.locate(&sources, depth).await;

        let before = self.urls.len();
        for found in discovered {
            self.insert_url(found.url, DiscoverySource::Repository(found.source));
        }
        let added = self.urls.len() - before;

        if self.cancel.is_cancelled() {
            tracing::warn!("⏹️ Locating cancelled, keeping {} URL(s) found so far", added);
        } else {
            tracing::info!("📋 Located {} new startup URL(s)", added);
        }
        Ok(added)
    }

    /// Adds a manually supplied home page. Returns false for a duplicate.
    pub fn append_url(&mut self, url: Url) -> bool {
        self.insert_url(url, DiscoverySource::Manual)
    }

    fn insert_url(&mut self, url: Url, via: DiscoverySource) -> bool {
        if !self.url_keys.insert(home_url_key(&url)) {
            tracing::debug!(url = %url, "Duplicate startup URL skipped");
            return false;
        }
        self.urls.push((url, via));
        true
    }

    /// URLs are append-only, so everything past the last materialized index is new.
    pub fn create_startups(&mut self) -> Result<usize> {
        if self.urls.is_empty() {
            return Err(ScraperError::ProcessingError {
                message: "No startup URLs located or appended".to_string(),
            });
        }

        let created = self.urls.len() - self.startups.len();
        let fresh: Vec<Startup> = self.urls[self.startups.len()..]
            .iter()
            .map(|(url, via)| Startup::new(url.clone(), via.clone()))
            .collect();
        self.startups.extend(fresh);

        tracing::info!(
            "🏗️ Created {} startup(s), {} in total",
            created,
            self.startups.len()
        );
        Ok(created)
    }

    /// Resolves every `Pending` startup with at most `policy.max_workers` in flight.
    pub async fn scrape_startups(&mut self, keywords: Arc<KeywordSet>, policy: ConcurrencyPolicy) -> ScrapeSummary {
        let ctx = ResolveContext::new(self.fetcher.clone(), self.predicates.clone(), keywords);
        let cancel = self.cancel.clone();
        let pending = self
            .startups
            .iter()
            .filter(|s| !s.status().is_terminal())
            .count();
        tracing::info!(
            "🚀 Scraping {} startup(s) with {} worker(s)",
            pending,
            policy.max_workers
        );

        let cancelled = {
            let ctx = &ctx;
            // 每個 future 各自借用一個 &mut Startup，取消時未完成的 future 直接被丟棄
            let work = stream::iter(self.startups.iter_mut().filter(|s| !s.status().is_terminal()))
                .map(|startup| async move { startup.resolve(ctx).await })
                .buffer_unordered(policy.max_workers.max(1))
                .for_each(|_| async {});

            tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = work => false,
            }
        };

        let summary = ScrapeSummary {
            counts: StatusCounts::from_records(self.startups.iter().map(Startup::record)),
            cancelled,
        };
        if cancelled {
            tracing::warn!(
                "⏹️ Scrape cancelled, {} startup(s) left pending",
                summary.counts.pending
            );
        }
        tracing::info!(
            "📊 found={} not_found={} failed={} pending={}",
            summary.counts.job_page_found,
            summary.counts.job_page_not_found,
            summary.counts.fetch_failed,
            summary.counts.pending
        );
        summary
    }

    pub fn urls(&self) -> impl Iterator<Item = &Url> {
        self.urls.iter().map(|(url, _)| url)
    }

    pub fn startups(&self) -> &[Startup] {
        &self.startups
    }

    pub fn results(&self) -> Vec<ResultRow> {
        self.startups.iter().map(|s| ResultRow::from(s.record())).collect()
    }

    /// Writes every startup, whatever its status. Returns the number of rows.
    pub async fn save_results<S: Storage>(&self, storage: &S, path: &str) -> Result<usize> {
        let data = match ExportFormat::from_path(path) {
            ExportFormat::Json => {
                let records: Vec<StartupRecord> =
                    self.startups.iter().map(|s| s.record().clone()).collect();
                render_json(&records)?
            }
            ExportFormat::Csv => render_csv(&self.results())?,
        };

        tracing::debug!("Writing {} bytes to {}", data.len(), path);
        storage.write_file(path, &data).await?;
        tracing::info!("💾 Saved {} result(s) to {}", self.startups.len(), path);
        Ok(self.startups.len())
    }
}
