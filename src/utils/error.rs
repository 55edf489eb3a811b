use std::fmt;
use thiserror::Error;

/// 單次抓取失敗的原因。逾時、DNS、非 2xx、TLS 一律歸類於此。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    Timeout,
    Connect,
    Tls,
    Status(u16),
    Body,
    RenderUnavailable,
    Render(String),
    Cancelled,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "request timed out"),
            FetchFailure::Connect => write!(f, "connection failed (DNS or refused)"),
            FetchFailure::Tls => write!(f, "TLS handshake failed"),
            FetchFailure::Status(code) => write!(f, "HTTP status {}", code),
            FetchFailure::Body => write!(f, "failed to read response body"),
            FetchFailure::RenderUnavailable => write!(f, "no browser renderer configured"),
            FetchFailure::Render(msg) => write!(f, "browser rendering failed: {}", msg),
            FetchFailure::Cancelled => write!(f, "fetch cancelled"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fetch of {url} failed: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: FetchFailure,
}

impl FetchError {
    pub fn new(url: impl Into<String>, reason: FetchFailure) -> Self {
        Self {
            url: url.into(),
            reason,
        }
    }

    /// 將 reqwest 錯誤映射到統一的失敗原因
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            FetchFailure::Timeout
        } else if let Some(status) = err.status() {
            FetchFailure::Status(status.as_u16())
        } else if is_tls_error(err) {
            FetchFailure::Tls
        } else if err.is_connect() || err.is_request() {
            FetchFailure::Connect
        } else {
            FetchFailure::Body
        };
        Self::new(url, reason)
    }
}

fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        let text = e.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return true;
        }
        source = e.source();
    }
    false
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unknown repository source: {name}")]
    UnknownSource { name: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Link extraction error: {message}")]
    ExtractionError { message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, ScraperError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Extraction,
    Export,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScraperError {
    pub fn config(message: impl Into<String>) -> Self {
        ScraperError::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ScraperError::UnknownSource { .. }
            | ScraperError::ConfigError { .. }
            | ScraperError::MissingConfigError { .. }
            | ScraperError::InvalidConfigValueError { .. }
            | ScraperError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ScraperError::HttpError(_) | ScraperError::Fetch(_) => ErrorCategory::Network,
            ScraperError::ExtractionError { .. } => ErrorCategory::Extraction,
            ScraperError::CsvError(_)
            | ScraperError::IoError(_)
            | ScraperError::SerializationError(_) => ErrorCategory::Export,
            ScraperError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Extraction => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Processing | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Export => ErrorSeverity::Critical,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ScraperError::UnknownSource { .. } => {
                "Use a built-in source (startupranking, startupsbe) or declare it under [[sources]]"
            }
            ScraperError::ConfigError { .. }
            | ScraperError::MissingConfigError { .. }
            | ScraperError::InvalidConfigValueError { .. }
            | ScraperError::ConfigValidationError { .. } => {
                "Check the configuration file and command line flags"
            }
            ScraperError::HttpError(_) | ScraperError::Fetch(_) => {
                "Check network connectivity or raise crawl.fetch_timeout_seconds"
            }
            ScraperError::ExtractionError { .. } => "The page markup may have changed",
            ScraperError::CsvError(_)
            | ScraperError::IoError(_)
            | ScraperError::SerializationError(_) => {
                "Check that the output path is writable"
            }
            ScraperError::ProcessingError { .. } => {
                "Locate startups (or pass --url) before scraping"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("設定錯誤: {}", self),
            ErrorCategory::Network => format!("網路錯誤: {}", self),
            ErrorCategory::Extraction => format!("解析錯誤: {}", self),
            ErrorCategory::Export => format!("輸出失敗: {}", self),
            ErrorCategory::Processing => format!("處理錯誤: {}", self),
        }
    }
}
