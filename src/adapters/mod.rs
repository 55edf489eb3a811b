// Adapters layer: concrete implementations for external systems (http, browser, repository sites).

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;
pub mod repository;
