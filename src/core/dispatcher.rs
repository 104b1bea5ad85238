//! Report delivery.
//!
//! Reports are either emailed through the Resend API or written to the
//! local report directory for offline runs.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::renderer::ReportContext;
use crate::models::{EmailConfig, OutputConfig};

/// Errors that can occur while delivering a report
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("email API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where a report ended up
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Emailed { to: String, id: Option<String> },
    Saved { path: PathBuf },
}

/// Sink for a rendered report
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, ctx: &ReportContext, html: &str) -> Result<Delivery, DispatchError>;
}

/// Resend email request body
#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmailResponse {
    id: Option<String>,
}

/// Sends the report through the Resend API
pub struct ResendDispatcher {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
    to: String,
    subject_prefix: String,
}

impl ResendDispatcher {
    pub fn new(config: &EmailConfig) -> Result<Self, DispatchError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(DispatchError::MissingCredential("RESEND_API_KEY"))?;
        let to = config
            .to
            .clone()
            .ok_or(DispatchError::MissingCredential("ADMIN_EMAIL"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            from: config.from.clone(),
            to,
            subject_prefix: config.subject_prefix.clone(),
        })
    }
}

#[async_trait]
impl Dispatcher for ResendDispatcher {
    async fn dispatch(&self, ctx: &ReportContext, html: &str) -> Result<Delivery, DispatchError> {
        info!("Sending report to {}", self.to);

        let request = EmailRequest {
            from: &self.from,
            to: vec![&self.to],
            subject: ctx.subject(&self.subject_prefix),
            html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status { status, body });
        }

        // The id is informational; a body we cannot parse is not a failure.
        let id = response.json::<EmailResponse>().await.ok().and_then(|r| r.id);
        info!("Report dispatched successfully");
        Ok(Delivery::Emailed { to: self.to.clone(), id })
    }
}

/// Writes the report under the local report directory
pub struct FileDispatcher {
    report_dir: PathBuf,
}

impl FileDispatcher {
    pub fn new(config: &OutputConfig) -> Self {
        Self { report_dir: config.report_dir.clone() }
    }
}

#[async_trait]
impl Dispatcher for FileDispatcher {
    async fn dispatch(&self, ctx: &ReportContext, html: &str) -> Result<Delivery, DispatchError> {
        let path = self
            .report_dir
            .join(format!("security_report_{}.html", ctx.period.file_key()));
        let io_error = |source| DispatchError::Io {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.report_dir).await.map_err(io_error)?;
        tokio::fs::write(&path, html).await.map_err(io_error)?;

        info!("Report saved to {}", path.display());
        Ok(Delivery::Saved { path })
    }
}
