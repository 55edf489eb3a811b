use crate::domain::model::{ResultRow, StartupRecord, StartupStatus};
use crate::utils::error::{Result, ScraperError};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub job_page_found: usize,
    pub job_page_not_found: usize,
    pub fetch_failed: usize,
}

impl StatusCounts {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a StartupRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.status {
                StartupStatus::Pending => counts.pending += 1,
                StartupStatus::JobPageFound => counts.job_page_found += 1,
                StartupStatus::JobPageNotFound => counts.job_page_not_found += 1,
                StartupStatus::FetchFailed => counts.fetch_failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pending + self.job_page_found + self.job_page_not_found + self.fetch_failed
    }
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    total: usize,
    summary: StatusCounts,
    startups: &'a [StartupRecord],
}

/// 輸出格式由副檔名決定：`.json` 為報表，其餘一律 CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &str) -> Self {
        let is_json = std::path::Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            ExportFormat::Json
        } else {
            ExportFormat::Csv
        }
    }
}

/// `home_url,job_page_url,status,matched_keywords`, header included even when empty.
pub fn render_csv(rows: &[ResultRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(["home_url", "job_page_url", "status", "matched_keywords"])?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ScraperError::IoError(e.into_error()))
}

pub fn render_json(records: &[StartupRecord]) -> Result<Vec<u8>> {
    let summary = StatusCounts::from_records(records);
    let report = JsonReport {
        generated_at: Utc::now(),
        total: summary.total(),
        summary,
        startups: records,
    };
    Ok(serde_json::to_vec_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DiscoverySource, Resolution};
    use url::Url;

    fn records() -> Vec<StartupRecord> {
        let mut found = StartupRecord::new(
            Url::parse("https://lyst.com").unwrap(),
            DiscoverySource::Repository("startupranking".to_string()),
        );
        found.advance(Resolution::JobPageFound {
            job_page_url: Url::parse("https://lyst.com/careers").unwrap(),
            keyword_hits: vec!["backend".to_string(), "remote".to_string()],
        });
        let mut failed = StartupRecord::new(Url::parse("https://slow.example").unwrap(), DiscoverySource::Manual);
        failed.advance(Resolution::FetchFailed {
            job_page_url: None,
            reason: "request timed out".to_string(),
        });
        let pending = StartupRecord::new(Url::parse("https://later.example").unwrap(), DiscoverySource::Manual);
        vec![found, failed, pending]
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_path("out/results.json"), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path("out/RESULTS.JSON"), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path("out/results.csv"), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path("results"), ExportFormat::Csv);
    }

    #[test]
    fn test_csv_rows_keep_order_and_quote_keywords() {
        let rows: Vec<ResultRow> = records().iter().map(ResultRow::from).collect();
        let csv = String::from_utf8(render_csv(&rows).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "home_url,job_page_url,status,matched_keywords");
        assert_eq!(
            lines[1],
            "https://lyst.com/,https://lyst.com/careers,job_page_found,\"backend,remote\""
        );
        assert_eq!(lines[2], "https://slow.example/,,fetch_failed,");
        assert_eq!(lines[3], "https://later.example/,,pending,");
    }

    #[test]
    fn test_csv_header_for_empty_list() {
        let csv = String::from_utf8(render_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv, "home_url,job_page_url,status,matched_keywords\n");
    }

    #[test]
    fn test_json_report_summary() {
        let bytes = render_json(&records()).unwrap();
        let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(report["total"], 3);
        assert_eq!(report["summary"]["job_page_found"], 1);
        assert_eq!(report["summary"]["fetch_failed"], 1);
        assert_eq!(report["summary"]["pending"], 1);
        assert_eq!(report["startups"][0]["discovered_via"], "startupranking");
        assert_eq!(report["startups"][0]["keyword_hits"][1], "remote");
        assert_eq!(report["startups"][1]["failure_reason"], "request timed out");
        assert!(report["startups"][1]["job_page_url"].is_null());
        assert!(report["generated_at"].as_str().is_some());
    }
}
