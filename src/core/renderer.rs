//! HTML rendering of the monthly security report.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::aggregator::{AggregateReport, LatencyPolicy};
use crate::core::classifier::Category;
use crate::utils::{escape_html, format_thousands, ReportPeriod};

/// Everything the report needs beyond the metrics themselves
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub run_id: Uuid,
    pub period: ReportPeriod,
    pub generated_at: DateTime<Utc>,
    pub report: AggregateReport,
}

impl ReportContext {
    pub fn new(period: ReportPeriod, report: AggregateReport) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            period,
            generated_at: Utc::now(),
            report,
        }
    }

    /// Email subject line
    pub fn subject(&self, prefix: &str) -> String {
        format!("{} - {}", prefix, self.period.label())
    }
}

const CELL: &str = "padding: 8px; border-bottom: 1px solid #eee;";
const TILE: &str = "padding: 10px; flex: 1; border-radius: 4px;";
const FOOTER: &str = "background: #f8fafc; padding: 15px; text-align: center; \
                      font-size: 12px; color: #666; border-radius: 0 0 8px 8px;";

/// Render the report as a standalone HTML document
pub fn render_html(ctx: &ReportContext) -> String {
    let report = &ctx.report;
    let mut html = String::with_capacity(8 * 1024);

    // Writing into a String cannot fail.
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Security Report - {period}</title></head>
<body style="font-family: Arial, sans-serif; color: #333;">
<div style="max-width: 600px; margin: 0 auto; border: 1px solid #ddd; border-radius: 8px;">
<div style="background: #2563eb; color: white; padding: 20px; border-radius: 8px 8px 0 0;">
<h2 style="margin: 0;">Monthly Security Intelligence</h2>
<p style="margin: 5px 0 0 0;">Period: {period}</p>
</div>
<div style="padding: 20px;">
"#,
        period = escape_html(&ctx.period.label()),
    );

    render_summary(&mut html, report);
    render_traffic_quality(&mut html, report);
    render_countries(&mut html, report);
    render_watchlist(&mut html, report);
    render_data_quality(&mut html, report);

    let _ = write!(
        html,
        r#"</div>
<div style="{FOOTER}">
Generated automatically by the security analytics pipeline &bull; {generated} &bull; run {run_id}
</div>
</div>
</body>
</html>
"#,
        generated = ctx.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        run_id = ctx.run_id,
    );

    html
}

fn render_summary(html: &mut String, report: &AggregateReport) {
    let latency_label = match report.latency_policy {
        LatencyPolicy::AllTraffic => "Avg Latency",
        LatencyPolicy::LegitimateOnly => "Avg Latency (legitimate)",
    };
    let precision = report.precision as usize;
    let tiles = [
        ("#f8fafc", "Total Traffic", format_thousands(report.total_requests)),
        ("#fee2e2", "Threats Blocked", format_thousands(report.blocked_requests)),
        ("#eff6ff", "Security Score", format!("{:.*}%", precision, report.security_score)),
        ("#f0fdf4", latency_label, format!("{:.*}ms", precision, report.avg_latency_ms)),
        ("#fef9c3", "Bot Ratio", format!("{:.*}%", precision, report.bot_ratio)),
    ];

    html.push_str("<h3>Executive Summary</h3>\n");
    html.push_str(
        "<div style=\"display: flex; flex-wrap: wrap; gap: 15px; margin-bottom: 20px;\">\n",
    );
    for (background, label, value) in tiles {
        let _ = writeln!(
            html,
            r#"<div style="background: {}; {TILE}"><strong>{}</strong><br>{}</div>"#,
            background,
            label,
            escape_html(&value)
        );
    }
    html.push_str("</div>\n");
}

fn render_traffic_quality(html: &mut String, report: &AggregateReport) {
    html.push_str("<h3>Traffic Quality</h3>\n");
    table_header(html, &["Category", "Requests", "Share"]);
    let precision = report.precision as usize;
    for breakdown in &report.categories {
        let label = match breakdown.category {
            Category::Legitimate => "Legitimate",
            Category::Bot => "Bot",
            Category::Malicious => "Malicious",
        };
        table_row(
            html,
            &[
                label.to_string(),
                format_thousands(breakdown.count),
                format!("{:.*}%", precision, breakdown.percentage),
            ],
        );
    }
    html.push_str("</table>\n");
}

fn render_countries(html: &mut String, report: &AggregateReport) {
    html.push_str("<h3>Top Attack Origins</h3>\n");
    if report.top_countries.is_empty() {
        html.push_str("<p>No blocked traffic this period.</p>\n");
        return;
    }
    table_header(html, &["Country", "Blocked Attempts"]);
    for country in &report.top_countries {
        table_row(
            html,
            &[escape_html(&country.country), format_thousands(country.count)],
        );
    }
    html.push_str("</table>\n");
}

fn render_watchlist(html: &mut String, report: &AggregateReport) {
    html.push_str("<h3>High Risk IPs (Watchlist)</h3>\n");
    if report.high_risk_ips.is_empty() {
        html.push_str("<p>No IP exceeded the blocking threshold.</p>\n");
        return;
    }
    html.push_str("<ul>\n");
    for ip in &report.high_risk_ips {
        let _ = writeln!(
            html,
            "<li><code>{}</code>: {} blocks</li>",
            escape_html(&ip.ip),
            format_thousands(ip.count)
        );
    }
    html.push_str("</ul>\n");
}

fn render_data_quality(html: &mut String, report: &AggregateReport) {
    let quality = &report.data_quality;
    if quality.skipped_rows == 0 && quality.unmapped_actions == 0 {
        return;
    }

    html.push_str("<h3>Data Quality</h3>\n<ul>\n");
    if quality.skipped_rows > 0 {
        let _ = writeln!(
            html,
            "<li>{} malformed rows skipped</li>",
            format_thousands(quality.skipped_rows)
        );
    }
    for (code, count) in &quality.unmapped_codes {
        let _ = writeln!(
            html,
            "<li>Unrecognized action <code>{}</code>: {} requests</li>",
            escape_html(code),
            format_thousands(*count)
        );
    }
    html.push_str("</ul>\n");
}

fn table_header(html: &mut String, columns: &[&str]) {
    html.push_str("<table style=\"width: 100%; border-collapse: collapse;\">\n");
    html.push_str("<tr style=\"background: #f1f5f9; text-align: left;\">");
    for column in columns {
        let _ = write!(html, "<th style=\"padding: 8px;\">{}</th>", column);
    }
    html.push_str("</tr>\n");
}

/// Cells must already be escaped
fn table_row(html: &mut String, cells: &[String]) {
    html.push_str("<tr>");
    for cell in cells {
        let _ = write!(html, r#"<td style="{CELL}">{}</td>"#, cell);
    }
    html.push_str("</tr>\n");
}
