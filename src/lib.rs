//! Security log analytics.
//!
//! Classifies a month of access log rows into legitimate, bot and malicious
//! traffic, aggregates security metrics and delivers an HTML report.

pub mod config;
pub mod core;
pub mod models;
pub mod utils;
