//! Monthly report pipeline.
//!
//! Extracts the period's rows, classifies and aggregates them, renders the
//! report and hands it to the dispatcher. Extraction or delivery failures
//! abort the run; malformed rows and unmapped action codes do not.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use metrics::{counter, gauge};
use serde_json::Value;
use uuid::Uuid;

use crate::core::aggregator::{AggregateReport, Aggregator, ClassifiedEntry, DataQuality};
use crate::core::classifier::{ActionTable, Category, Classifier};
use crate::core::dispatcher::{Delivery, Dispatcher};
use crate::core::entry::LogEntry;
use crate::core::extractor::LogSource;
use crate::core::renderer::{render_html, ReportContext};
use crate::models::AnalyticsConfig;
use crate::utils::ReportPeriod;

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub report: AggregateReport,
    pub delivery: Delivery,
}

/// Parse, classify and aggregate one period's raw rows
pub fn analyze(rows: Vec<Value>, config: &AnalyticsConfig) -> AggregateReport {
    counter!("report_rows_extracted_total").increment(rows.len() as u64);

    let mut classifier = Classifier::new(ActionTable::from_config(config));
    let mut entries = Vec::with_capacity(rows.len());
    let mut skipped_rows = 0u64;

    for (index, row) in rows.into_iter().enumerate() {
        match LogEntry::from_value(row) {
            Ok(entry) => {
                let category = classifier.classify(&entry);
                entries.push(ClassifiedEntry { entry, category });
            }
            Err(e) => {
                debug!("Skipping row {}: {}", index, e);
                skipped_rows += 1;
            }
        }
    }

    if skipped_rows > 0 {
        warn!("Skipped {} malformed rows", skipped_rows);
        counter!("report_rows_skipped_total").increment(skipped_rows);
    }
    if classifier.unmapped_total() > 0 {
        counter!("report_unmapped_actions_total").increment(classifier.unmapped_total());
    }

    let data_quality = DataQuality {
        skipped_rows,
        unmapped_actions: classifier.unmapped_total(),
        unmapped_codes: classifier.unmapped_codes().clone(),
    };
    let report = Aggregator::new(config).aggregate(&entries, data_quality);

    for category in Category::ALL {
        counter!("report_requests_total", "category" => category.as_str())
            .increment(report.count(category));
    }
    gauge!("report_security_score").set(report.security_score);

    report
}

/// Wires a log source and a dispatcher together for one run
pub struct Pipeline {
    source: Box<dyn LogSource>,
    dispatcher: Box<dyn Dispatcher>,
    analytics: AnalyticsConfig,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn LogSource>,
        dispatcher: Box<dyn Dispatcher>,
        analytics: AnalyticsConfig,
    ) -> Self {
        Self {
            source,
            dispatcher,
            analytics,
        }
    }

    /// Run the pipeline for `period`
    pub async fn run(&self, period: ReportPeriod) -> Result<RunSummary> {
        info!("Starting security analytics pipeline for {}", period.label());

        let rows = self
            .source
            .fetch(&period)
            .await
            .with_context(|| format!("extraction from {} failed", self.source.describe()))?;

        info!("Transforming {} rows and calculating metrics", rows.len());
        let report = analyze(rows, &self.analytics);
        info!(
            "Report: {} requests, {} blocked, security score {}%",
            report.total_requests, report.blocked_requests, report.security_score
        );

        let ctx = ReportContext::new(period, report);
        let html = render_html(&ctx);

        let delivery = self
            .dispatcher
            .dispatch(&ctx, &html)
            .await
            .context("report delivery failed")?;

        info!("Pipeline run {} completed", ctx.run_id);
        Ok(RunSummary {
            run_id: ctx.run_id,
            report: ctx.report,
            delivery,
        })
    }
}
