use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::{Category, LatencyPolicy};

/// Supabase (PostgREST) connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: Option<String>,
    /// Service or anon API key
    pub key: Option<String>,
    /// Table holding the access logs
    pub table: String,
    /// Rows requested per page
    pub page_size: u32,
    /// PostgREST `order` value, must end on a unique column so pages are stable
    pub order_by: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Attempts per page before giving up on transient failures
    pub max_attempts: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            table: "access_logs".to_string(),
            page_size: 1000,
            order_by: "timestamp.asc,id.asc".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

/// Email delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Resend API key
    pub api_key: Option<String>,
    /// Sender address
    pub from: String,
    /// Recipient (the administrator)
    pub to: Option<String>,
    /// Subject prefix, the period label is appended
    pub subject_prefix: String,
    /// Resend endpoint
    pub api_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from: "Security Bot <onboarding@resend.dev>".to_string(),
            to: None,
            subject_prefix: "Security Report".to_string(),
            api_url: "https://api.resend.com/emails".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Classification and aggregation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// An IP is high-risk when its malicious count is strictly above this
    pub high_risk_threshold: u64,
    /// Number of countries kept in the attack-origin ranking
    pub top_countries: usize,
    /// Number of IPs kept on the watchlist
    pub max_high_risk_ips: usize,
    /// Which entries feed the average latency
    pub latency_policy: LatencyPolicy,
    /// Whether bot traffic counts towards attack origins
    pub include_bots_in_geo: bool,
    /// Decimal places for percentages and averages
    pub precision: u32,
    /// Category assigned to action codes missing from the table
    pub default_category: Category,
    /// Extra or overriding action code mappings
    pub action_mapping: BTreeMap<String, Category>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: 5,
            top_countries: 5,
            max_high_risk_ips: 8,
            latency_policy: LatencyPolicy::AllTraffic,
            include_bots_in_geo: false,
            precision: 1,
            default_category: Category::Legitimate,
            action_mapping: BTreeMap::new(),
        }
    }
}

/// Local output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for locally written reports
    pub report_dir: PathBuf,
    /// JSON file used by `--use-mock-data`
    pub mock_data_file: PathBuf,
    /// Prometheus textfile written at the end of the run
    pub metrics_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("reports"),
            mock_data_file: PathBuf::from("data/mock_logs.json"),
            metrics_file: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log store connection
    pub supabase: SupabaseConfig,
    /// Email delivery
    pub email: EmailConfig,
    /// Classification and aggregation policy
    pub analytics: AnalyticsConfig,
    /// Local output
    pub output: OutputConfig,
}

impl Config {
    /// Overlay the credential variables used by the deployment environment.
    ///
    /// Only variables that are set and non-empty replace configured values.
    pub fn apply_credentials_from_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(url) = var("SUPABASE_URL") {
            self.supabase.url = Some(url);
        }
        if let Some(key) = var("SUPABASE_KEY") {
            self.supabase.key = Some(key);
        }
        if let Some(key) = var("RESEND_API_KEY") {
            self.email.api_key = Some(key);
        }
        if let Some(to) = var("ADMIN_EMAIL") {
            self.email.to = Some(to);
        }
    }

    /// Names of the credentials a live run needs but does not have.
    pub fn missing_live_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.supabase.url.is_none() {
            missing.push("SUPABASE_URL");
        }
        if self.supabase.key.is_none() {
            missing.push("SUPABASE_KEY");
        }
        if self.email.api_key.is_none() {
            missing.push("RESEND_API_KEY");
        }
        if self.email.to.is_none() {
            missing.push("ADMIN_EMAIL");
        }
        missing
    }
}
