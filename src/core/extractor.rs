//! Log extraction from the hosted log store.
//!
//! This module provides the [`LogSource`] seam and its two implementations:
//! the Supabase (PostgREST) table reader used in production and a local
//! JSON file reader used for offline runs.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::models::SupabaseConfig;
use crate::utils::ReportPeriod;

/// Errors that can occur while extracting logs
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("log store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractError::RequestError(e) => e.is_timeout() || e.is_connect(),
            ExtractError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Source of raw access log rows for a period
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch every row whose timestamp falls within `period`
    async fn fetch(&self, period: &ReportPeriod) -> Result<Vec<Value>, ExtractError>;

    /// Short description for log lines
    fn describe(&self) -> String;
}

/// Reads the access log table through the PostgREST API
pub struct SupabaseSource {
    client: Client,
    endpoint: String,
    api_key: String,
    page_size: u32,
    order_by: String,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl SupabaseSource {
    pub fn new(config: &SupabaseConfig) -> Result<Self, ExtractError> {
        let url = config
            .url
            .as_deref()
            .ok_or(ExtractError::MissingCredential("SUPABASE_URL"))?;
        let api_key = config
            .key
            .clone()
            .ok_or(ExtractError::MissingCredential("SUPABASE_KEY"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", url.trim_end_matches('/'), config.table),
            api_key,
            page_size: config.page_size.max(1),
            order_by: config.order_by.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Query parameters for one page of the period
    fn page_query(&self, period: &ReportPeriod, offset: u64) -> Vec<(&'static str, String)> {
        let start = period.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = period.end.to_rfc3339_opts(SecondsFormat::Secs, true);
        vec![
            ("select", "*".to_string()),
            ("timestamp", format!("gte.{}", start)),
            ("timestamp", format!("lt.{}", end)),
            ("order", self.order_by.clone()),
            ("limit", self.page_size.to_string()),
            ("offset", offset.to_string()),
        ]
    }

    async fn request_page(
        &self,
        period: &ReportPeriod,
        offset: u64,
    ) -> Result<Vec<Value>, ExtractError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .query(&self.page_query(period, offset))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status { status, body });
        }

        match response.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            other => Err(ExtractError::InvalidResponse(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            ))),
        }
    }

    async fn fetch_page(
        &self,
        period: &ReportPeriod,
        offset: u64,
    ) -> Result<Vec<Value>, ExtractError> {
        let mut attempt = 1;
        loop {
            match self.request_page(period, offset).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.retry_backoff * attempt;
                    warn!(
                        "Page at offset {} failed (attempt {}/{}): {}; retrying in {:?}",
                        offset, attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl LogSource for SupabaseSource {
    async fn fetch(&self, period: &ReportPeriod) -> Result<Vec<Value>, ExtractError> {
        info!(
            "Extracting logs from {} to {}",
            period.start.date_naive(),
            period.end.date_naive()
        );

        // The server may cap `limit` below `page_size`, so only an empty
        // page marks the end of the period.
        let mut rows = Vec::new();
        loop {
            let page = self.fetch_page(period, rows.len() as u64).await?;
            if page.is_empty() {
                break;
            }
            if page.len() < self.page_size as usize {
                debug!(
                    "Server returned {} of {} requested rows at offset {}",
                    page.len(),
                    self.page_size,
                    rows.len()
                );
            } else {
                debug!("Fetched page of {} rows at offset {}", page.len(), rows.len());
            }
            rows.extend(page);
        }

        if rows.is_empty() {
            warn!("No logs found for {}", period.label());
        } else {
            info!("Extracted {} records", rows.len());
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("supabase table {}", self.endpoint)
    }
}

/// Reads rows from a local JSON array, used for offline runs
pub struct MockFileSource {
    path: PathBuf,
}

impl MockFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LogSource for MockFileSource {
    async fn fetch(&self, _period: &ReportPeriod) -> Result<Vec<Value>, ExtractError> {
        info!("Loading mock data from {}", self.path.display());

        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Mock data file {} not found", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ExtractError::Io {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        let rows: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
            ExtractError::InvalidResponse(format!("{}: {}", self.path.display(), e))
        })?;
        info!("Loaded {} mock records", rows.len());
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("mock file {}", self.path.display())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
