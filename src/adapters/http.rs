use crate::domain::model::PageContent;
use crate::domain::ports::{PageFetcher, Renderer};
use crate::utils::error::{FetchError, FetchFailure, Result, ScraperError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_render_sessions: usize,
    pub max_redirects: usize,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_render_sessions: 2,
            max_redirects: 5,
        }
    }
}

/// Static reqwest fetch with an optional browser renderer for `render = true`.
///
/// One instance is shared by every worker: the reqwest client pools
/// connections and a semaphore bounds concurrent browser sessions.
pub struct HttpFetcher {
    client: Client,
    renderer: Option<Arc<dyn Renderer>>,
    render_slots: Arc<Semaphore>,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &FetcherSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .build()
            .map_err(ScraperError::HttpError)?;

        Ok(Self {
            client,
            renderer: None,
            render_slots: Arc::new(Semaphore::new(settings.max_render_sessions.max(1))),
            timeout: settings.timeout,
        })
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    async fn fetch_static(&self, url: &Url) -> std::result::Result<PageContent, FetchError> {
        tracing::debug!(url = %url, "Fetching page");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url.as_str(), FetchFailure::Status(status.as_u16())));
        }

        let final_url = response.url().clone();
        // text() 依 charset 解碼，無法解碼的位元組以替代字元處理
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), &e))?;

        Ok(PageContent::new(final_url, html, false))
    }

    async fn fetch_rendered(&self, url: &Url) -> std::result::Result<PageContent, FetchError> {
        let Some(renderer) = &self.renderer else {
            return Err(FetchError::new(url.as_str(), FetchFailure::RenderUnavailable));
        };

        let _permit = self
            .render_slots
            .acquire()
            .await
            .map_err(|_| FetchError::new(url.as_str(), FetchFailure::Cancelled))?;

        tracing::debug!(url = %url, renderer = renderer.name(), "Rendering page");
        // 逾時交給 renderer 自己處理，外層中斷會讓分頁來不及關閉
        let html = renderer.render(url, self.timeout).await?;

        Ok(PageContent::new(url.clone(), html, true))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, render: bool) -> std::result::Result<PageContent, FetchError> {
        if render {
            self.fetch_rendered(url).await
        } else {
            self.fetch_static(url).await
        }
    }

    fn can_render(&self) -> bool {
        self.renderer.is_some()
    }
}
