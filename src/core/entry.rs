//! Access log rows and their validation.
//!
//! Rows arrive as loosely typed JSON from the log store. Each row is decoded
//! on its own so that one malformed row is skipped without failing the batch.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that make a single row unusable
#[derive(Error, Debug, PartialEq)]
pub enum RowError {
    #[error("row could not be decoded: {0}")]
    Undecodable(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("invalid latency: {0}")]
    InvalidLatency(f64),
}

/// Action code as emitted by the middleware, either textual or numeric
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawActionCode {
    Text(String),
    Numeric(i64),
}

impl fmt::Display for RawActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawActionCode::Text(code) => write!(f, "{}", code),
            RawActionCode::Numeric(code) => write!(f, "{}", code),
        }
    }
}

/// Row as stored in the `access_logs` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLogRow {
    pub timestamp: Option<String>,
    pub ip: Option<String>,
    pub country: Option<String>,
    #[serde(alias = "action_code")]
    pub action: Option<RawActionCode>,
    #[serde(alias = "latency_ms")]
    pub response_time_ms: Option<f64>,
    pub user_agent: Option<String>,
    pub path: Option<String>,
}

/// Validated access log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    /// Upper-cased ISO 3166 alpha-2 code, `None` when unknown
    pub country: Option<String>,
    /// Trimmed, lower-cased action code
    pub action_code: String,
    pub latency_ms: f64,
    pub user_agent: Option<String>,
    pub path: Option<String>,
}

impl LogEntry {
    /// Decode and validate one row from its JSON representation
    pub fn from_value(value: serde_json::Value) -> Result<Self, RowError> {
        let raw: RawLogRow =
            serde_json::from_value(value).map_err(|e| RowError::Undecodable(e.to_string()))?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawLogRow> for LogEntry {
    type Error = RowError;

    fn try_from(raw: RawLogRow) -> Result<Self, Self::Error> {
        let timestamp = raw
            .timestamp
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RowError::MissingField("timestamp"))?;
        let timestamp = parse_timestamp(timestamp)?;

        let ip = non_blank(raw.ip).ok_or(RowError::MissingField("ip"))?;

        let action_code = raw
            .action
            .map(|code| code.to_string().trim().to_lowercase())
            .filter(|code| !code.is_empty())
            .ok_or(RowError::MissingField("action"))?;

        let latency_ms = raw.response_time_ms.ok_or(RowError::MissingField("response_time_ms"))?;
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return Err(RowError::InvalidLatency(latency_ms));
        }

        Ok(Self {
            timestamp,
            ip,
            country: non_blank(raw.country).map(|c| c.to_uppercase()),
            action_code,
            latency_ms,
            user_agent: non_blank(raw.user_agent),
            path: non_blank(raw.path),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse RFC 3339 timestamps, or naive ones which are taken as UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RowError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(RowError::InvalidTimestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_decodes_supabase_row() {
        let entry = LogEntry::from_value(json!({
            "id": 17,
            "timestamp": "2026-09-03T10:15:00+00:00",
            "ip": "203.0.113.7",
            "country": "ru",
            "action": " Geo_Blocked ",
            "response_time_ms": 42,
            "user_agent": "curl/8.0",
            "path": "/wp-admin"
        }))
        .unwrap();

        assert_eq!(entry.timestamp, Utc.with_ymd_and_hms(2026, 9, 3, 10, 15, 0).unwrap());
        assert_eq!(entry.country.as_deref(), Some("RU"));
        assert_eq!(entry.action_code, "geo_blocked");
        assert_eq!(entry.latency_ms, 42.0);
        assert_eq!(entry.path.as_deref(), Some("/wp-admin"));
    }

    #[test]
    fn test_accepts_alias_fields_and_numeric_codes() {
        let entry = LogEntry::from_value(json!({
            "timestamp": "2026-09-03 10:15:00.250",
            "ip": "198.51.100.1",
            "country": null,
            "action_code": 403,
            "latency_ms": 12.5
        }))
        .unwrap();

        assert_eq!(entry.action_code, "403");
        assert_eq!(entry.country, None);
        assert_eq!(entry.latency_ms, 12.5);
    }

    #[test]
    fn test_rejects_malformed_rows() {
        let base = json!({
            "timestamp": "2026-09-03T10:15:00",
            "ip": "198.51.100.1",
            "action": "allow",
            "response_time_ms": 10
        });

        let mut no_ip = base.clone();
        no_ip["ip"] = json!("  ");
        assert_eq!(LogEntry::from_value(no_ip), Err(RowError::MissingField("ip")));

        let mut bad_ts = base.clone();
        bad_ts["timestamp"] = json!("yesterday");
        assert_eq!(
            LogEntry::from_value(bad_ts),
            Err(RowError::InvalidTimestamp("yesterday".to_string()))
        );

        let mut negative = base.clone();
        negative["response_time_ms"] = json!(-1.0);
        assert_eq!(LogEntry::from_value(negative), Err(RowError::InvalidLatency(-1.0)));

        let mut no_latency = base.clone();
        no_latency.as_object_mut().unwrap().remove("response_time_ms");
        assert_eq!(
            LogEntry::from_value(no_latency),
            Err(RowError::MissingField("response_time_ms"))
        );

        let mut wrong_type = base;
        wrong_type["ip"] = json!(["a", "b"]);
        assert!(matches!(LogEntry::from_value(wrong_type), Err(RowError::Undecodable(_))));

        assert!(matches!(LogEntry::from_value(json!("not a row")), Err(RowError::Undecodable(_))));
    }
}
