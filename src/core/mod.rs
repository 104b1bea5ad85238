//! Core functionality for the security report pipeline.
//!
//! This module contains the pipeline stages: log extraction, row parsing,
//! traffic classification, aggregation, rendering and report delivery.

pub mod entry;
pub mod classifier;
pub mod aggregator;
pub mod extractor;
pub mod renderer;
pub mod dispatcher;
pub mod pipeline;

pub use entry::{LogEntry, RawLogRow, RowError};
pub use classifier::{ActionTable, Category, Classifier, DEFAULT_ACTION_TABLE};
pub use aggregator::{AggregateReport, Aggregator, ClassifiedEntry, DataQuality, LatencyPolicy};
pub use extractor::{ExtractError, LogSource, MockFileSource, SupabaseSource};
pub use renderer::{render_html, ReportContext};
pub use dispatcher::{Delivery, DispatchError, Dispatcher, FileDispatcher, ResendDispatcher};
pub use pipeline::{analyze, Pipeline, RunSummary};
