//! Aggregation of classified traffic into report metrics.
//!
//! The aggregator is a pure computation: the same classified entries always
//! produce the same [`AggregateReport`], field for field.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::classifier::Category;
use crate::core::entry::LogEntry;
use crate::models::AnalyticsConfig;
use crate::utils::{percentage, round_to};

/// Country key used when the log store has no country for a request
pub const UNKNOWN_COUNTRY: &str = "XX";

/// Which entries feed the average latency
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LatencyPolicy {
    /// Mean over every request in the period
    #[default]
    AllTraffic,
    /// Mean over legitimate requests only
    LegitimateOnly,
}

/// Log entry paired with its category
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEntry {
    pub entry: LogEntry,
    pub category: Category,
}

/// Rows and codes that did not make it through cleanly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Rows skipped because they were malformed
    pub skipped_rows: u64,
    /// Entries classified through the fallback category
    pub unmapped_actions: u64,
    /// Fallback hits per unmapped action code
    pub unmapped_codes: BTreeMap<String, u64>,
}

/// Count and share of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub count: u64,
    pub percentage: f64,
}

/// Attack count for one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryCount {
    pub country: String,
    pub count: u64,
}

/// Blocked attempt count for one source IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
}

/// Security metrics for one reporting period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub total_requests: u64,
    /// One breakdown per category, in `Category::ALL` order
    pub categories: Vec<CategoryBreakdown>,
    pub blocked_requests: u64,
    /// Blocked requests as a percentage of all requests
    pub security_score: f64,
    /// Bot requests as a percentage of all requests
    pub bot_ratio: f64,
    pub avg_latency_ms: f64,
    pub latency_policy: LatencyPolicy,
    /// Decimal places the percentages and averages were rounded to
    pub precision: u32,
    /// Attack origins, most active first
    pub top_countries: Vec<CountryCount>,
    /// Watchlist, most active first
    pub high_risk_ips: Vec<IpCount>,
    pub data_quality: DataQuality,
}

impl AggregateReport {
    pub fn count(&self, category: Category) -> u64 {
        self.categories
            .iter()
            .find(|b| b.category == category)
            .map_or(0, |b| b.count)
    }

    pub fn percentage(&self, category: Category) -> f64 {
        self.categories
            .iter()
            .find(|b| b.category == category)
            .map_or(0.0, |b| b.percentage)
    }
}

/// Aggregation policy
#[derive(Debug, Clone)]
pub struct Aggregator {
    high_risk_threshold: u64,
    top_countries: usize,
    max_high_risk_ips: usize,
    latency_policy: LatencyPolicy,
    include_bots_in_geo: bool,
    precision: u32,
}

impl Aggregator {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            high_risk_threshold: config.high_risk_threshold,
            top_countries: config.top_countries,
            max_high_risk_ips: config.max_high_risk_ips,
            latency_policy: config.latency_policy,
            include_bots_in_geo: config.include_bots_in_geo,
            precision: config.precision,
        }
    }

    /// Build the report for a period's classified entries
    pub fn aggregate(
        &self,
        entries: &[ClassifiedEntry],
        data_quality: DataQuality,
    ) -> AggregateReport {
        let total = entries.len() as u64;

        let mut tally: BTreeMap<Category, u64> = Category::ALL.iter().map(|c| (*c, 0)).collect();
        for classified in entries {
            *tally.entry(classified.category).or_insert(0) += 1;
        }
        let categories: Vec<CategoryBreakdown> = Category::ALL
            .iter()
            .map(|category| {
                let count = tally.get(category).copied().unwrap_or(0);
                CategoryBreakdown {
                    category: *category,
                    count,
                    percentage: percentage(count, total, self.precision),
                }
            })
            .collect();

        let blocked = tally.get(&Category::Malicious).copied().unwrap_or(0);
        let bots = tally.get(&Category::Bot).copied().unwrap_or(0);

        AggregateReport {
            total_requests: total,
            categories,
            blocked_requests: blocked,
            security_score: percentage(blocked, total, self.precision),
            bot_ratio: percentage(bots, total, self.precision),
            avg_latency_ms: self.average_latency(entries),
            latency_policy: self.latency_policy,
            precision: self.precision,
            top_countries: self.top_countries(entries),
            high_risk_ips: self.high_risk_ips(entries),
            data_quality,
        }
    }

    fn average_latency(&self, entries: &[ClassifiedEntry]) -> f64 {
        let (sum, n) = entries
            .iter()
            .filter(|c| match self.latency_policy {
                LatencyPolicy::AllTraffic => true,
                LatencyPolicy::LegitimateOnly => c.category == Category::Legitimate,
            })
            .fold((0.0, 0u64), |(sum, n), c| (sum + c.entry.latency_ms, n + 1));

        if n == 0 {
            return 0.0;
        }
        round_to(sum / n as f64, self.precision)
    }

    fn top_countries(&self, entries: &[ClassifiedEntry]) -> Vec<CountryCount> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for classified in entries {
            let counted = classified.category == Category::Malicious
                || (self.include_bots_in_geo && classified.category == Category::Bot);
            if counted {
                let country = classified.entry.country.as_deref().unwrap_or(UNKNOWN_COUNTRY);
                *counts.entry(country).or_insert(0) += 1;
            }
        }

        rank(counts, 0, self.top_countries)
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect()
    }

    fn high_risk_ips(&self, entries: &[ClassifiedEntry]) -> Vec<IpCount> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for classified in entries.iter().filter(|c| c.category == Category::Malicious) {
            *counts.entry(classified.entry.ip.as_str()).or_insert(0) += 1;
        }

        rank(counts, self.high_risk_threshold, self.max_high_risk_ips)
            .into_iter()
            .map(|(ip, count)| IpCount { ip, count })
            .collect()
    }
}

/// Keys with a count strictly above `above`, by count descending then key
/// ascending, truncated to `limit`.
fn rank(counts: HashMap<&str, u64>, above: u64, limit: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<(&str, u64)> = counts
        .into_iter()
        .filter(|(_, count)| *count > above)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(limit);
    ranked.into_iter().map(|(key, count)| (key.to_string(), count)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn classified(
        ip: &str,
        country: Option<&str>,
        category: Category,
        latency_ms: f64,
    ) -> ClassifiedEntry {
        ClassifiedEntry {
            entry: LogEntry {
                timestamp: Utc.with_ymd_and_hms(2026, 9, 10, 12, 0, 0).unwrap(),
                ip: ip.to_string(),
                country: country.map(str::to_string),
                action_code: category.as_str().to_string(),
                latency_ms,
                user_agent: None,
                path: None,
            },
            category,
        }
    }

    fn repeat(n: usize, entry: ClassifiedEntry) -> Vec<ClassifiedEntry> {
        std::iter::repeat(entry).take(n).collect()
    }

    fn malicious(n: usize, ip: &str, country: &str) -> Vec<ClassifiedEntry> {
        repeat(n, classified(ip, Some(country), Category::Malicious, 5.0))
    }

    fn aggregate(entries: &[ClassifiedEntry]) -> AggregateReport {
        Aggregator::new(&AnalyticsConfig::default()).aggregate(entries, DataQuality::default())
    }

    #[test]
    fn test_empty_input_reports_zeroes() {
        let report = aggregate(&[]);

        assert_eq!(report.total_requests, 0);
        assert_eq!(report.categories.len(), 3);
        assert!(report.categories.iter().all(|b| b.count == 0 && b.percentage == 0.0));
        assert_eq!(report.security_score, 0.0);
        assert_eq!(report.bot_ratio, 0.0);
        assert_eq!(report.avg_latency_ms, 0.0);
        assert_eq!(report.precision, 1);
        assert!(report.top_countries.is_empty());
        assert!(report.high_risk_ips.is_empty());
    }

    #[test]
    fn test_country_ranking_breaks_ties_by_code() {
        let mut entries = Vec::new();
        let counts = [("US", 4), ("CN", 4), ("RU", 9), ("BR", 1), ("DE", 2), ("FR", 2), ("IN", 2)];
        for (country, n) in counts {
            entries.extend(malicious(n, "10.0.0.1", country));
        }
        entries.extend(repeat(50, classified("10.0.0.2", Some("NL"), Category::Legitimate, 5.0)));

        let report = aggregate(&entries);
        let ranking: Vec<(&str, u64)> = report
            .top_countries
            .iter()
            .map(|c| (c.country.as_str(), c.count))
            .collect();

        assert_eq!(ranking, vec![("RU", 9), ("CN", 4), ("US", 4), ("DE", 2), ("FR", 2)]);
    }

    #[test]
    fn test_unknown_country_and_bot_inclusion() {
        let mut entries = repeat(2, classified("10.0.0.1", None, Category::Malicious, 5.0));
        entries.extend(repeat(3, classified("10.0.0.2", Some("VN"), Category::Bot, 5.0)));

        let report = aggregate(&entries);
        let unknown = CountryCount {
            country: UNKNOWN_COUNTRY.to_string(),
            count: 2,
        };
        assert_eq!(report.top_countries, vec![unknown]);

        let mut config = AnalyticsConfig::default();
        config.include_bots_in_geo = true;
        let report = Aggregator::new(&config).aggregate(&entries, DataQuality::default());
        let vietnam = CountryCount {
            country: "VN".to_string(),
            count: 3,
        };
        assert_eq!(report.top_countries[0], vietnam);
        assert_eq!(report.top_countries.len(), 2);
    }

    #[test]
    fn test_high_risk_ips_require_count_above_threshold() {
        let mut entries = malicious(6, "198.51.100.9", "RU");
        entries.extend(malicious(5, "198.51.100.5", "RU"));
        entries.extend(malicious(7, "198.51.100.1", "CN"));
        entries.extend(malicious(6, "198.51.100.10", "CN"));
        entries.extend(repeat(20, classified("192.0.2.50", Some("US"), Category::Bot, 5.0)));

        let report = aggregate(&entries);
        let watchlist: Vec<(&str, u64)> = report
            .high_risk_ips
            .iter()
            .map(|i| (i.ip.as_str(), i.count))
            .collect();

        assert_eq!(
            watchlist,
            vec![("198.51.100.1", 7), ("198.51.100.10", 6), ("198.51.100.9", 6)]
        );
    }

    #[test]
    fn test_high_risk_ips_truncated_to_limit() {
        let mut entries = Vec::new();
        for i in 0..12 {
            entries.extend(malicious(6 + i, &format!("203.0.113.{}", i), "RU"));
        }
        let report = aggregate(&entries);

        assert_eq!(report.high_risk_ips.len(), 8);
        assert_eq!(report.high_risk_ips[0].ip, "203.0.113.11");
        assert_eq!(report.high_risk_ips[0].count, 17);
    }

    #[test]
    fn test_latency_policies() {
        let entries = vec![
            classified("10.0.0.1", Some("US"), Category::Legitimate, 10.0),
            classified("10.0.0.1", Some("US"), Category::Legitimate, 20.0),
            classified("10.0.0.2", Some("RU"), Category::Malicious, 90.0),
        ];

        let report = aggregate(&entries);
        assert_eq!(report.avg_latency_ms, 40.0);
        assert_eq!(report.latency_policy, LatencyPolicy::AllTraffic);

        let mut config = AnalyticsConfig::default();
        config.latency_policy = LatencyPolicy::LegitimateOnly;
        let report = Aggregator::new(&config).aggregate(&entries, DataQuality::default());
        assert_eq!(report.avg_latency_ms, 15.0);

        let blocked_only = vec![classified("10.0.0.2", Some("RU"), Category::Malicious, 90.0)];
        let report = Aggregator::new(&config).aggregate(&blocked_only, DataQuality::default());
        assert_eq!(report.avg_latency_ms, 0.0);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let entries = vec![
            classified("10.0.0.1", None, Category::Legitimate, 1.0),
            classified("10.0.0.2", None, Category::Bot, 1.0),
            classified("10.0.0.3", None, Category::Malicious, 1.0),
        ];

        for precision in [1, 2] {
            let config = AnalyticsConfig {
                precision,
                ..AnalyticsConfig::default()
            };
            let report = Aggregator::new(&config).aggregate(&entries, DataQuality::default());
            let sum: f64 = report.categories.iter().map(|b| b.percentage).sum();
            let counted: u64 = report.categories.iter().map(|b| b.count).sum();

            // Each share may be off by half a unit in the last kept place.
            let tolerance = 0.5 * 10f64.powi(-(precision as i32)) * Category::ALL.len() as f64;
            assert!((sum - 100.0).abs() <= tolerance + 1e-9, "sum was {}", sum);
            assert_eq!(counted, report.total_requests);
        }

        let report = aggregate(&entries);
        assert_eq!(report.security_score, 33.3);
        assert_eq!(report.bot_ratio, 33.3);
    }
}
