use anyhow::Result;
use httpmock::prelude::*;
use startup_scraper::domain::ports::Storage;
use startup_scraper::{
    HttpFetcher, LocalStorage, ScraperConfig, ScraperError, StartupList, StartupStatus,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn html(body: &str) -> String {
    format!("<html><head><title>t</title></head><body>{}</body></html>", body)
}

/// 兩個目錄來源都列出 lyst；list-a 有第二頁
fn mock_directory(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/list-a");
        then.status(200).body(html(
            r#"<ul class="listing">
                 <li><a href="/co/lyst">Lyst</a></li>
                 <li><a href="/co/slow">Slow Inc</a></li>
               </ul>
               <a rel="next" href="/list-a/2">Next</a>"#,
        ));
    });
    server.mock(|when, then| {
        when.method(GET).path("/list-b");
        then.status(200).body(html(
            r#"<ul class="listing">
                 <li><a href="/co/lyst/">Lyst</a></li>
                 <li><a href="/co/showpad">Showpad</a></li>
               </ul>"#,
        ));
    });
}

fn mock_companies(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/co/lyst");
        then.status(200).body(html(
            r#"<a href="/co/lyst/about">About</a> <a href="/co/lyst/careers">Careers</a>"#,
        ));
    });
    server.mock(|when, then| {
        when.method(GET).path("/co/slow");
        then.status(200)
            .delay(Duration::from_secs(3))
            .body(html(r#"<a href="/co/slow/jobs">Jobs</a>"#));
    });
    server.mock(|when, then| {
        when.method(GET).path("/co/quiet");
        then.status(200)
            .body(html(r#"<a href="/co/quiet/about">About us</a>"#));
    });
    server.mock(|when, then| {
        when.method(GET).path("/co/showpad");
        then.status(200)
            .body(html(r#"<a href="/co/showpad/jobs">Jobs</a>"#));
    });
    server.mock(|when, then| {
        when.method(GET).path("/co/showpad/jobs");
        then.status(404);
    });
}

fn config_for(server: &MockServer, depth: u32) -> Result<ScraperConfig> {
    let toml = format!(
        r#"
[crawl]
sources = ["list-a", "list-b"]
depth = {depth}
concurrency = 2
fetch_timeout_seconds = 1

[keywords]
terms = ["backend", "remote", "frontend"]

[[sources]]
name = "list-a"
adapter = "selectors"
base_url = "{a}"
entry_selector = ".listing"
entry_pattern = "^/co/[a-z]+/?$"
next_selector = "a[rel=next]"

[[sources]]
name = "list-b"
adapter = "selectors"
base_url = "{b}"
entry_selector = ".listing"
entry_pattern = "^/co/[a-z]+/?$"
"#,
        depth = depth,
        a = server.url("/list-a"),
        b = server.url("/list-b"),
    );
    let config = ScraperConfig::from_toml_str(&toml)?;
    startup_scraper::utils::validation::Validate::validate(&config)?;
    Ok(config)
}

fn startup_list(config: &ScraperConfig) -> Result<StartupList> {
    let fetcher = HttpFetcher::new(&config.fetcher_settings())?;
    Ok(StartupList::new(Arc::new(fetcher), config.registry()?)
        .with_predicates(config.predicates())
        .with_locate_concurrency(config.concurrency_policy()?))
}

#[tokio::test]
async fn test_end_to_end_scrape_to_csv() -> Result<()> {
    let server = MockServer::start();
    mock_directory(&server);
    mock_companies(&server);

    let page_two = server.mock(|when, then| {
        when.method(GET).path("/list-a/2");
        then.status(200).body(html(
            r#"<ul class="listing"><li><a href="/co/quiet">Quiet</a></li></ul>"#,
        ));
    });
    let careers = server.mock(|when, then| {
        when.method(GET).path("/co/lyst/careers");
        then.status(200)
            .body(html("<p>We are hiring a Backend Engineer, remote OK</p>"));
    });

    let config = config_for(&server, 1)?;
    let mut list = startup_list(&config)?;

    let located = list
        .locate_startups(config.crawl.sources.as_slice(), config.crawl_depth()?)
        .await?;
    assert_eq!(located, 4);
    page_two.assert_hits(1);

    assert_eq!(list.create_startups()?, 4);
    assert_eq!(list.create_startups()?, 0);

    let summary = list
        .scrape_startups(Arc::new(config.keyword_set()), config.concurrency_policy()?)
        .await;
    assert!(!summary.cancelled);
    assert_eq!(summary.counts.job_page_found, 1);
    assert_eq!(summary.counts.job_page_not_found, 1);
    assert_eq!(summary.counts.fetch_failed, 2);
    careers.assert_hits(1);

    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path());
    assert_eq!(list.save_results(&storage, "out/results.csv").await?, 4);

    let data = storage.read_file("out/results.csv").await?;
    let mut reader = csv::Reader::from_reader(data.as_slice());
    let header: Vec<&str> = reader.headers()?.iter().collect();
    assert_eq!(header, vec!["home_url", "job_page_url", "status", "matched_keywords"]);
    let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;
    assert_eq!(rows.len(), 4);

    // 輸出依發現順序排列，且 home_url 不重複
    let homes: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
    assert_eq!(
        homes,
        vec![
            server.url("/co/lyst"),
            server.url("/co/slow"),
            server.url("/co/quiet"),
            server.url("/co/showpad"),
        ]
    );
    assert_eq!(homes.iter().collect::<HashSet<_>>().len(), homes.len());

    assert_eq!(&rows[0][1], server.url("/co/lyst/careers"));
    assert_eq!(&rows[0][2], "job_page_found");
    assert_eq!(&rows[0][3], "backend,remote");

    assert_eq!(&rows[1][1], "");
    assert_eq!(&rows[1][2], "fetch_failed");

    assert_eq!(&rows[2][2], "job_page_not_found");

    assert_eq!(&rows[3][1], server.url("/co/showpad/jobs"));
    assert_eq!(&rows[3][2], "fetch_failed");

    for row in &rows[1..] {
        assert_eq!(&row[3], "", "only job_page_found rows carry keywords");
    }

    Ok(())
}

#[tokio::test]
async fn test_json_report_keeps_first_source() -> Result<()> {
    let server = MockServer::start();
    mock_directory(&server);
    mock_companies(&server);
    let page_two = server.mock(|when, then| {
        when.method(GET).path("/list-a/2");
        then.status(200).body(html(""));
    });
    server.mock(|when, then| {
        when.method(GET).path("/co/lyst/careers");
        then.status(200).body(html("<p>Frontend developer</p>"));
    });

    let config = config_for(&server, 0)?;
    let mut list = startup_list(&config)?;
    list.locate_startups(config.crawl.sources.as_slice(), config.crawl_depth()?)
        .await?;
    page_two.assert_hits(0);

    list.create_startups()?;
    list.scrape_startups(Arc::new(config.keyword_set()), config.concurrency_policy()?)
        .await;

    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path());
    list.save_results(&storage, "results.json").await?;

    let report: serde_json::Value = serde_json::from_slice(&storage.read_file("results.json").await?)?;
    assert_eq!(report["total"], 3);

    let startups = report["startups"].as_array().unwrap();
    assert_eq!(startups[0]["home_url"], server.url("/co/lyst"));
    assert_eq!(startups[0]["discovered_via"], "list-a");
    assert_eq!(startups[0]["keyword_hits"][0], "frontend");
    assert_eq!(startups[2]["home_url"], server.url("/co/showpad"));
    assert_eq!(startups[2]["discovered_via"], "list-b");

    Ok(())
}

#[tokio::test]
async fn test_manual_urls_and_unknown_source() -> Result<()> {
    let server = MockServer::start();
    mock_companies(&server);
    server.mock(|when, then| {
        when.method(GET).path("/co/lyst/careers");
        then.status(200).body(html("<p>Remote only</p>"));
    });

    let config = ScraperConfig::from_toml_str(&format!(
        "[output]\nstartups = [\"{}\", \"{}\"]\n",
        server.url("/co/lyst"),
        server.url("/co/lyst/"),
    ))?;
    let mut list = startup_list(&config)?;

    let err = list
        .locate_startups(&["does-not-exist"], config.crawl_depth()?)
        .await
        .unwrap_err();
    assert!(matches!(err, ScraperError::UnknownSource { .. }));

    for url in config.manual_urls()? {
        list.append_url(url);
    }
    assert_eq!(list.create_startups()?, 1);

    list.scrape_startups(Arc::new(config.keyword_set()), config.concurrency_policy()?)
        .await;
    let record = list.startups()[0].record();
    assert_eq!(record.status, StartupStatus::JobPageFound);
    // 預設關鍵字都不在頁面上
    assert!(record.keyword_hits.is_empty());

    Ok(())
}
