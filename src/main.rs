//! Security Report
//!
//! This is the main entry point for the monthly security report job.
//! It loads configuration, builds the pipeline for the requested mode and
//! runs it once.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{error, info};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use security_report::config;
use security_report::core::{
    Dispatcher, FileDispatcher, LogSource, MockFileSource, Pipeline, ResendDispatcher,
    SupabaseSource,
};
use security_report::utils::ReportPeriod;

/// Monthly security log analytics report
#[derive(Parser, Debug)]
#[command(name = "security-report", version, about)]
struct Args {
    /// Use the local mock data file instead of Supabase and save the report locally
    #[arg(long)]
    use_mock_data: bool,

    /// Configuration file (TOML)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Month to report on as YYYY-MM, defaults to the previous month
    #[arg(long, value_parser = parse_month)]
    month: Option<ReportPeriod>,

    /// Render and save the report locally without sending email
    #[arg(long)]
    dry_run: bool,

    /// Write run metrics in Prometheus text format to this file
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

fn parse_month(value: &str) -> Result<ReportPeriod, String> {
    ReportPeriod::parse_month(value)
        .ok_or_else(|| format!("invalid month '{}', expected YYYY-MM", value))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config =
        config::load_config(args.config.as_deref()).context("failed to load configuration")?;

    let metrics_file = args.metrics_file.clone().or_else(|| config.output.metrics_file.clone());
    let metrics = match metrics_file {
        Some(_) => Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("failed to install metrics recorder")?,
        ),
        None => None,
    };

    let (source, dispatcher): (Box<dyn LogSource>, Box<dyn Dispatcher>) = if args.use_mock_data {
        info!("Mock mode: report will be saved, not sent");
        let source: Box<dyn LogSource> =
            Box::new(MockFileSource::new(&config.output.mock_data_file));
        let dispatcher: Box<dyn Dispatcher> = Box::new(FileDispatcher::new(&config.output));
        (source, dispatcher)
    } else {
        let missing = config.missing_live_credentials();
        let missing: Vec<&str> = if args.dry_run {
            missing.into_iter().filter(|name| name.starts_with("SUPABASE")).collect()
        } else {
            missing
        };
        if !missing.is_empty() {
            return Err(anyhow!("missing required environment variables: {}", missing.join(", ")));
        }

        let source: Box<dyn LogSource> = Box::new(SupabaseSource::new(&config.supabase)?);
        let dispatcher: Box<dyn Dispatcher> = if args.dry_run {
            Box::new(FileDispatcher::new(&config.output))
        } else {
            Box::new(ResendDispatcher::new(&config.email)?)
        };
        (source, dispatcher)
    };

    let period = args
        .month
        .unwrap_or_else(|| ReportPeriod::previous_month(chrono::Utc::now()));

    let pipeline = Pipeline::new(source, dispatcher, config.analytics.clone());
    let result = pipeline.run(period).await;

    if let (Some(path), Some(handle)) = (metrics_file.as_ref(), metrics.as_ref()) {
        write_metrics(path, handle)?;
    }

    let summary = result?;
    info!("Delivery: {:?}", summary.delivery);
    Ok(())
}

fn write_metrics(path: &Path, handle: &PrometheusHandle) -> Result<()> {
    std::fs::write(path, handle.render())
        .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    info!("Metrics written to {}", path.display());
    Ok(())
}
