pub mod export;
pub mod job_page;
pub mod links;
pub mod locator;
pub mod matcher;
pub mod startup;
pub mod startup_list;

pub use crate::domain::ports::{PageFetcher, Storage};
pub use crate::utils::error::Result;
