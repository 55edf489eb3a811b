use clap::Parser;
use startup_scraper::domain::ports::PageFetcher;
use startup_scraper::utils::error::ErrorSeverity;
use startup_scraper::utils::monitor::SystemMonitor;
use startup_scraper::utils::{logger, validation::Validate};
use startup_scraper::{CliArgs, HttpFetcher, LocalStorage, ScraperConfig, ScraperError, StartupList};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose, args.log_json);

    tracing::info!("Starting startup-scraper");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    // 載入並驗證配置
    let config = match args.load_config().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let monitor = SystemMonitor::new(args.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(&args, &config, &monitor).await {
        Ok(Some(rows)) => {
            tracing::info!("✅ Scrape completed successfully!");
            println!("✅ Scrape completed: {} startup(s)", rows);
            println!("📁 Output saved to: {}", config.output.path);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(
                "❌ Scrape failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

/// Returns the number of exported rows, or `None` for a dry run.
async fn run(
    args: &CliArgs,
    config: &ScraperConfig,
    monitor: &SystemMonitor,
) -> Result<Option<usize>, ScraperError> {
    let fetcher = build_fetcher(config).await?;
    let mut list = StartupList::new(fetcher, config.registry()?)
        .with_predicates(config.predicates())
        .with_locate_concurrency(config.concurrency_policy()?);

    // 總爬取時間上限與 Ctrl-C 都只是觸發取消，已完成的結果仍會輸出
    let cancel = list.cancellation_token();
    if let Some(limit) = config.max_crawl_duration() {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            tracing::warn!("⏱️ Crawl time limit of {:?} reached, stopping", limit);
            token.cancel();
        });
    }
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("⏹️ Interrupted, finishing with partial results");
            token.cancel();
        }
    });

    for url in config.manual_urls()? {
        list.append_url(url);
    }
    if !config.crawl.sources.is_empty() {
        list.locate_startups(config.crawl.sources.as_slice(), config.crawl_depth()?).await?;
    }
    monitor.log_stage("Locate");

    if args.dry_run {
        for url in list.urls() {
            println!("{}", url);
        }
        return Ok(None);
    }

    list.create_startups()?;
    let summary = list
        .scrape_startups(Arc::new(config.keyword_set()), config.concurrency_policy()?)
        .await;
    monitor.log_stage("Scrape");
    if summary.cancelled {
        println!("⚠️ Run stopped early, {} startup(s) left pending", summary.counts.pending);
    }

    let storage = LocalStorage::new(".");
    let rows = list.save_results(&storage, &config.output.path).await?;
    monitor.log_stage("Export");

    Ok(Some(rows))
}

async fn build_fetcher(config: &ScraperConfig) -> Result<Arc<dyn PageFetcher>, ScraperError> {
    let fetcher = HttpFetcher::new(&config.fetcher_settings())?;
    if !config.crawl.render {
        return Ok(Arc::new(fetcher));
    }

    #[cfg(feature = "browser")]
    {
        use startup_scraper::adapters::browser::{BrowserSettings, ChromiumRenderer};

        let settings = BrowserSettings {
            request_timeout: config.fetcher_settings().timeout,
            ..BrowserSettings::default()
        };
        match ChromiumRenderer::launch(settings).await {
            Ok(renderer) => {
                tracing::info!("🌐 Browser rendering enabled");
                return Ok(Arc::new(fetcher.with_renderer(Arc::new(renderer))));
            }
            Err(e) => {
                tracing::warn!("Browser unavailable, continuing with static fetches only: {}", e);
            }
        }
    }

    #[cfg(not(feature = "browser"))]
    tracing::warn!("crawl.render is set but this build lacks the `browser` feature; static fetches only");

    Ok(Arc::new(fetcher))
}
