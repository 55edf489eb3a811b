use crate::domain::model::PageContent;
use crate::utils::error::{FetchError, Result};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 取得頁面內容。`render = true` 時交給瀏覽器執行 JavaScript 後再取 HTML。
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, render: bool) -> std::result::Result<PageContent, FetchError>;

    /// Whether `fetch(url, true)` can succeed at all. Callers only attempt
    /// rendered fallbacks when this is true.
    fn can_render(&self) -> bool;
}

/// Browser automation collaborator used for JavaScript-heavy pages.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Returns the serialized DOM after the page has loaded.
    ///
    /// The renderer enforces `deadline` itself and releases whatever it opened
    /// (a browser tab) before returning, including on timeout.
    async fn render(&self, url: &Url, deadline: Duration) -> std::result::Result<String, FetchError>;

    fn name(&self) -> &'static str;
}
