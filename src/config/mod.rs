pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use args::CliArgs;

#[cfg(feature = "cli")]
mod args {
    use super::toml_config::ScraperConfig;
    use crate::utils::error::Result;
    use clap::Parser;
    use std::path::PathBuf;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "startup-scraper")]
    #[command(about = "Find startups in directory sites and scan their job pages for keywords")]
    pub struct CliArgs {
        /// TOML configuration file. Built-in defaults are used without it.
        #[arg(long)]
        pub config: Option<PathBuf>,

        /// Repository source to crawl (repeatable), e.g. startupranking
        #[arg(long = "source")]
        pub sources: Vec<String>,

        #[arg(long, help = "Next-page hops per source (0 = first page only)")]
        pub depth: Option<u32>,

        #[arg(long, value_delimiter = ',')]
        pub keywords: Option<Vec<String>>,

        #[arg(long)]
        pub concurrency: Option<usize>,

        #[arg(long, help = "Output path (.json for a JSON report, CSV otherwise)")]
        pub output: Option<String>,

        /// Startup home page to scrape directly (repeatable)
        #[arg(long = "url")]
        pub urls: Vec<String>,

        #[arg(long, help = "Enable the headless browser fallback")]
        pub render: bool,

        #[arg(long, help = "Locate startups and print their URLs without scraping")]
        pub dry_run: bool,

        #[arg(long, help = "Log CPU and memory usage per stage")]
        pub monitor: bool,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON lines")]
        pub log_json: bool,
    }

    impl CliArgs {
        /// 先讀設定檔，再以命令列參數覆寫
        pub fn load_config(&self) -> Result<ScraperConfig> {
            let mut config = match &self.config {
                Some(path) => ScraperConfig::from_file(path)?,
                None => ScraperConfig::default(),
            };
            self.apply_to(&mut config);
            Ok(config)
        }

        pub fn apply_to(&self, config: &mut ScraperConfig) {
            if !self.sources.is_empty() {
                config.crawl.sources = self.sources.clone();
            }
            if let Some(depth) = self.depth {
                config.crawl.depth = depth;
            }
            if let Some(keywords) = &self.keywords {
                config.keywords.terms = keywords.clone();
            }
            if let Some(concurrency) = self.concurrency {
                config.crawl.concurrency = concurrency;
            }
            if let Some(output) = &self.output {
                config.output.path = output.clone();
            }
            config.output.startups.extend(self.urls.iter().cloned());
            if self.render {
                config.crawl.render = true;
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_flags_override_defaults() {
            let args = CliArgs::parse_from([
                "startup-scraper",
                "--source",
                "startupsbe",
                "--source",
                "startupranking",
                "--depth",
                "0",
                "--keywords",
                "backend,remote",
                "--url",
                "https://lyst.com",
                "--output",
                "out.json",
            ]);
            let config = args.load_config().unwrap();

            assert_eq!(config.crawl.sources, vec!["startupsbe", "startupranking"]);
            assert_eq!(config.crawl.depth, 0);
            assert_eq!(config.keywords.terms, vec!["backend", "remote"]);
            assert_eq!(config.output.startups, vec!["https://lyst.com"]);
            assert_eq!(config.output.path, "out.json");
            assert_eq!(config.crawl.concurrency, 4);
            assert!(!config.crawl.render);
        }

        #[test]
        fn test_no_flags_keep_defaults() {
            let args = CliArgs::parse_from(["startup-scraper"]);
            let config = args.load_config().unwrap();
            assert_eq!(config.crawl.sources, vec!["startupranking"]);
            assert_eq!(config.crawl.depth, 3);
        }
    }
}
