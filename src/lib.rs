pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliArgs;
pub use crate::config::{cli::LocalStorage, toml_config::ScraperConfig};

pub use crate::adapters::http::{FetcherSettings, HttpFetcher};
pub use crate::adapters::repository::{RepositoryAdapter, RepositorySource, SourceRegistry};
pub use crate::core::{
    job_page::JobPagePredicates,
    matcher::{KeywordSet, MatchMode},
    startup::Startup,
    startup_list::{ScrapeSummary, StartupList},
};
pub use crate::domain::model::{ConcurrencyPolicy, CrawlDepth, ResultRow, StartupRecord, StartupStatus};
pub use crate::utils::error::{FetchError, Result, ScraperError};
