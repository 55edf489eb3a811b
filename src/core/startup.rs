use crate::core::job_page::JobPagePredicates;
use crate::core::links::has_usable_links;
use crate::core::matcher::{visible_text, KeywordSet};
use crate::domain::model::{DiscoverySource, PageContent, Resolution, StartupRecord, StartupStatus};
use crate::domain::ports::PageFetcher;
use crate::utils::error::FetchError;
use std::sync::Arc;
use url::Url;

/// Read-only collaborators shared by every startup during a scrape.
#[derive(Clone)]
pub struct ResolveContext {
    pub fetcher: Arc<dyn PageFetcher>,
    pub predicates: Arc<JobPagePredicates>,
    pub keywords: Arc<KeywordSet>,
}

impl ResolveContext {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        predicates: Arc<JobPagePredicates>,
        keywords: Arc<KeywordSet>,
    ) -> Self {
        Self {
            fetcher,
            predicates,
            keywords,
        }
    }
}

/// One candidate company and its job page resolution.
#[derive(Debug, Clone)]
pub struct Startup {
    record: StartupRecord,
}

impl Startup {
    pub fn new(home_url: Url, discovered_via: DiscoverySource) -> Self {
        Self {
            record: StartupRecord::new(home_url, discovered_via),
        }
    }

    pub fn record(&self) -> &StartupRecord {
        &self.record
    }

    pub fn home_url(&self) -> &Url {
        &self.record.home_url
    }

    pub fn status(&self) -> StartupStatus {
        self.record.status
    }

    /// Runs at most once. Later calls return the cached terminal status.
    ///
    /// The record is only written after the outcome is known, so a resolution
    /// dropped halfway (cancellation) leaves the startup `Pending`.
    pub async fn resolve(&mut self, ctx: &ResolveContext) -> StartupStatus {
        if self.record.status.is_terminal() {
            return self.record.status;
        }

        let resolution = self.find_job_page(ctx).await;
        self.record.advance(resolution);

        match self.record.status {
            StartupStatus::JobPageFound => tracing::info!(
                startup = %self.record.name,
                job_page = ?self.record.job_page_url.as_ref().map(Url::as_str),
                hits = ?self.record.keyword_hits,
                "✅ Job page scanned"
            ),
            StartupStatus::FetchFailed => tracing::warn!(
                startup = %self.record.name,
                reason = ?self.record.failure_reason,
                "❌ Fetch failed"
            ),
            status => tracing::info!(startup = %self.record.name, %status, "Resolved"),
        }
        self.record.status
    }

    async fn find_job_page(&self, ctx: &ResolveContext) -> Resolution {
        let fetcher = ctx.fetcher.as_ref();
        let home_url = &self.record.home_url;

        let home = match fetcher.fetch(home_url, false).await {
            Ok(page) => page,
            Err(e) => {
                return Resolution::FetchFailed {
                    job_page_url: None,
                    reason: e.to_string(),
                }
            }
        };

        // 靜態 HTML 沒有任何連結時，多半是前端渲染的網站，改用瀏覽器再抓一次
        let home = if !has_usable_links(&home) && fetcher.can_render() {
            tracing::debug!(url = %home_url, "No links in static home page, rendering once");
            match fetcher.fetch(home_url, true).await {
                Ok(rendered) => rendered,
                Err(e) => {
                    tracing::debug!(url = %home_url, "Rendered fallback failed: {}", e);
                    home
                }
            }
        } else {
            home
        };

        let Some(candidate) = ctx.predicates.select(&home) else {
            return Resolution::JobPageNotFound;
        };
        let job_page_url = candidate.url;

        match fetch_job_page(fetcher, &job_page_url).await {
            Ok(page) => Resolution::JobPageFound {
                keyword_hits: ctx.keywords.scan_page(&page),
                job_page_url,
            },
            Err(e) => Resolution::FetchFailed {
                job_page_url: Some(job_page_url),
                reason: e.to_string(),
            },
        }
    }
}

/// Static fetch first; rendered fetch when that fails or comes back without text.
async fn fetch_job_page(fetcher: &dyn PageFetcher, url: &Url) -> Result<PageContent, FetchError> {
    match fetcher.fetch(url, false).await {
        Ok(page) if !fetcher.can_render() || visible_text(&page).is_some() => Ok(page),
        Ok(page) => {
            tracing::debug!(url = %url, "Job page has no text, rendering");
            match fetcher.fetch(url, true).await {
                Ok(rendered) => Ok(rendered),
                Err(e) => {
                    tracing::debug!(url = %url, "Rendered fallback failed: {}", e);
                    Ok(page)
                }
            }
        }
        Err(e) if fetcher.can_render() => {
            tracing::debug!(url = %url, "Static fetch failed ({}), rendering", e);
            fetcher.fetch(url, true).await.map_err(|_| e)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matcher::MatchMode;
    use crate::utils::error::FetchFailure;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Reply {
        Html(&'static str),
        Fail(FetchFailure),
    }

    /// 靜態與渲染兩種回應分開設定
    #[derive(Default)]
    struct FakeFetcher {
        static_pages: HashMap<String, Reply>,
        rendered_pages: HashMap<String, Reply>,
        can_render: bool,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl FakeFetcher {
        fn serve(mut self, url: &str, reply: Reply) -> Self {
            self.static_pages.insert(url.to_string(), reply);
            self
        }

        fn render(mut self, url: &str, reply: Reply) -> Self {
            self.can_render = true;
            self.rendered_pages.insert(url.to_string(), reply);
            self
        }

        fn calls(&self) -> Vec<(String, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &Url, render: bool) -> Result<PageContent, FetchError> {
            self.calls.lock().unwrap().push((url.to_string(), render));
            let pages = if render { &self.rendered_pages } else { &self.static_pages };
            match pages.get(url.as_str()) {
                Some(Reply::Html(html)) => Ok(PageContent::new(url.clone(), *html, render)),
                Some(Reply::Fail(reason)) => Err(FetchError::new(url.as_str(), reason.clone())),
                None => Err(FetchError::new(url.as_str(), FetchFailure::Status(404))),
            }
        }

        fn can_render(&self) -> bool {
            self.can_render
        }
    }

    fn ctx(fetcher: FakeFetcher, keywords: &[&str]) -> (ResolveContext, Arc<FakeFetcher>) {
        let fetcher = Arc::new(fetcher);
        let ctx = ResolveContext::new(
            fetcher.clone(),
            Arc::new(JobPagePredicates::default()),
            Arc::new(KeywordSet::new(keywords.iter().copied(), MatchMode::Substring)),
        );
        (ctx, fetcher)
    }

    fn startup(url: &str) -> Startup {
        Startup::new(Url::parse(url).unwrap(), DiscoverySource::Manual)
    }

    #[tokio::test]
    async fn test_careers_link_is_fetched_and_scanned() {
        let fetcher = FakeFetcher::default()
            .serve(
                "https://lyst.com/",
                Reply::Html(r#"<a href="/about">About</a><a href="/careers">Careers</a>"#),
            )
            .serve(
                "https://lyst.com/careers",
                Reply::Html("<body>We are hiring a Backend Engineer, remote OK</body>"),
            );
        let (ctx, fetcher) = ctx(fetcher, &["backend", "remote", "frontend"]);
        let mut s = startup("https://lyst.com");

        let status = s.resolve(&ctx).await;

        assert_eq!(status, StartupStatus::JobPageFound);
        assert_eq!(
            s.record().job_page_url.as_ref().map(Url::as_str),
            Some("https://lyst.com/careers")
        );
        assert_eq!(s.record().keyword_hits, vec!["backend".to_string(), "remote".to_string()]);
        assert!(fetcher.calls().contains(&("https://lyst.com/careers".to_string(), false)));
    }

    #[tokio::test]
    async fn test_job_page_without_hits_is_still_found() {
        let fetcher = FakeFetcher::default()
            .serve("https://lyst.com/", Reply::Html(r#"<a href="/jobs">Jobs</a>"#))
            .serve("https://lyst.com/jobs", Reply::Html("<p>No openings</p>"));
        let (ctx, _) = ctx(fetcher, &["backend"]);
        let mut s = startup("https://lyst.com");

        assert_eq!(s.resolve(&ctx).await, StartupStatus::JobPageFound);
        assert!(s.record().keyword_hits.is_empty());
    }

    #[tokio::test]
    async fn test_home_timeout_is_fetch_failed() {
        let fetcher = FakeFetcher::default().serve("https://lyst.com/", Reply::Fail(FetchFailure::Timeout));
        let (ctx, _) = ctx(fetcher, &["backend"]);
        let mut s = startup("https://lyst.com");

        assert_eq!(s.resolve(&ctx).await, StartupStatus::FetchFailed);
        assert!(s.record().keyword_hits.is_empty());
        assert!(s.record().job_page_url.is_none());
        assert_eq!(
            s.record().failure_reason.as_deref(),
            Some("fetch of https://lyst.com/ failed: request timed out")
        );
    }

    #[tokio::test]
    async fn test_no_candidate_is_not_found() {
        let fetcher = FakeFetcher::default().serve("https://lyst.com/", Reply::Html(r#"<a href="/about">About</a>"#));
        let (ctx, _) = ctx(fetcher, &["backend"]);
        let mut s = startup("https://lyst.com");

        assert_eq!(s.resolve(&ctx).await, StartupStatus::JobPageNotFound);
        assert!(s.record().job_page_url.is_none());
    }

    #[tokio::test]
    async fn test_job_page_fetch_failure_keeps_candidate_url() {
        let fetcher = FakeFetcher::default().serve("https://lyst.com/", Reply::Html(r#"<a href="/careers">Careers</a>"#));
        let (ctx, _) = ctx(fetcher, &["backend"]);
        let mut s = startup("https://lyst.com");

        assert_eq!(s.resolve(&ctx).await, StartupStatus::FetchFailed);
        assert_eq!(
            s.record().job_page_url.as_ref().map(Url::as_str),
            Some("https://lyst.com/careers")
        );
        assert!(s.record().keyword_hits.is_empty());
    }

    #[tokio::test]
    async fn test_client_rendered_home_falls_back_to_browser_once() {
        let fetcher = FakeFetcher::default()
            .serve("https://lyst.com/", Reply::Html(r#"<div id="root"></div><script src="/app.js"></script>"#))
            .render("https://lyst.com/", Reply::Html(r#"<div id="root"><a href="/careers">Careers</a></div>"#))
            .serve("https://lyst.com/careers", Reply::Html("<p>Remote backend roles</p>"));
        let (ctx, fetcher) = ctx(fetcher, &["backend"]);
        let mut s = startup("https://lyst.com");

        assert_eq!(s.resolve(&ctx).await, StartupStatus::JobPageFound);
        let home_renders = fetcher
            .calls()
            .iter()
            .filter(|(url, render)| url == "https://lyst.com/" && *render)
            .count();
        assert_eq!(home_renders, 1);
    }

    #[tokio::test]
    async fn test_empty_job_page_uses_rendered_content() {
        let fetcher = FakeFetcher::default()
            .serve("https://lyst.com/", Reply::Html(r#"<a href="/careers">Careers</a>"#))
            .serve("https://lyst.com/careers", Reply::Html("<body><div id=app></div></body>"))
            .render("https://lyst.com/careers", Reply::Html("<body>Data scientist, remote</body>"));
        let (ctx, _) = ctx(fetcher, &["data scientist"]);
        let mut s = startup("https://lyst.com");

        assert_eq!(s.resolve(&ctx).await, StartupStatus::JobPageFound);
        assert_eq!(s.record().keyword_hits, vec!["data scientist".to_string()]);
    }

    #[tokio::test]
    async fn test_resolution_runs_at_most_once() {
        let fetcher = FakeFetcher::default().serve("https://lyst.com/", Reply::Html(r#"<a href="/about">About</a>"#));
        let (ctx, fetcher) = ctx(fetcher, &["backend"]);
        let mut s = startup("https://lyst.com");

        assert_eq!(s.resolve(&ctx).await, StartupStatus::JobPageNotFound);
        let calls_after_first = fetcher.calls().len();
        assert_eq!(s.resolve(&ctx).await, StartupStatus::JobPageNotFound);
        assert_eq!(fetcher.calls().len(), calls_after_first);
    }
}
