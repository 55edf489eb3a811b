use crate::domain::ports::Renderer;
use crate::utils::error::{FetchError, FetchFailure, Result, ScraperError};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub request_timeout: Duration,
    /// How many times to poll for `<body>` before giving up on client-side rendering.
    pub wait_attempts: u32,
    pub wait_interval: Duration,
    /// Connect to an already running Chrome instead of launching one.
    pub remote_debugging_url: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            wait_attempts: 10,
            wait_interval: Duration::from_millis(250),
            remote_debugging_url: std::env::var("CHROMIUM_REMOTE_DEBUGGING_URL").ok(),
        }
    }
}

/// Headless Chrome over CDP. The browser lives as long as this renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    settings: BrowserSettings,
}

impl ChromiumRenderer {
    pub async fn launch(settings: BrowserSettings) -> Result<Self> {
        let (browser, mut handler) = if let Some(url) = &settings.remote_debugging_url {
            tracing::info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url.as_str())
                .await
                .map_err(|e| ScraperError::config(format!("Failed to connect to remote Chrome: {}", e)))?
        } else {
            let config = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(settings.request_timeout)
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg("--no-proxy-server")
                .arg("--proxy-bypass-list=*")
                .arg("--log-level=3")
                .build()
                .map_err(ScraperError::config)?;

            Browser::launch(config)
                .await
                .map_err(|e| ScraperError::config(format!("Failed to launch Chrome: {}", e)))?
        };

        // CDP 事件必須持續被消化，否則頁面操作會卡住
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            settings,
        })
    }
}

impl ChromiumRenderer {
    async fn load(&self, page: &Page, url: &Url) -> std::result::Result<String, FetchError> {
        let mut ready = false;
        for _ in 0..self.settings.wait_attempts {
            if page.find_element("body").await.is_ok() {
                ready = true;
                break;
            }
            tokio::time::sleep(self.settings.wait_interval).await;
        }
        if !ready {
            tracing::debug!(url = %url, "Body never appeared, returning DOM as is");
        }

        page.content()
            .await
            .map_err(|e| FetchError::new(url.as_str(), FetchFailure::Render(e.to_string())))
    }
}

/// An open browser tab. Closed explicitly after rendering; if the render future
/// is dropped first (cancellation), the tab is closed on a background task.
struct OpenTab {
    page: Option<Page>,
}

impl OpenTab {
    async fn close(mut self, url: &Url) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!(url = %url, "Failed to close browser tab: {}", e);
            }
        }
    }
}

impl Drop for OpenTab {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &Url, deadline: Duration) -> std::result::Result<String, FetchError> {
        let timed_out = || FetchError::new(url.as_str(), FetchFailure::Timeout);

        let page = tokio::time::timeout(deadline, self.browser.new_page(url.as_str()))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| FetchError::new(url.as_str(), FetchFailure::Render(e.to_string())))?;
        let tab = OpenTab {
            page: Some(page.clone()),
        };

        // 逾時只中斷載入，分頁一律在這裡關閉
        let html = tokio::time::timeout(deadline, self.load(&page, url))
            .await
            .map_err(|_| timed_out())
            .and_then(|html| html);
        tab.close(url).await;
        html
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
