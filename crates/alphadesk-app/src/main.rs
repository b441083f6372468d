//! alphadesk research-desk job runner - entry point.

use alphadesk_jobs::SubmitRequest;
use anyhow::Result;
use clap::Parser;
use std::str::FromStr;
use tracing::info;

/// alphadesk research-desk job runner
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ALPHADESK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Analysis to run: trade-setup, macro-commentary, report, macro-lab
    #[arg(short, long)]
    feature: String,

    /// Instrument or subject of the analysis (e.g. "EURUSD")
    #[arg(short, long)]
    instrument: String,

    /// The question to put to the engine
    #[arg(short, long)]
    question: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    alphadesk_telemetry::init_logging()?;

    info!("Starting alphadesk v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > ALPHADESK_CONFIG env var > default
    let config = match args.config {
        Some(path) => alphadesk_app::AppConfig::from_file(&path)?,
        None => alphadesk_app::AppConfig::load()?,
    };
    info!(user_id = %config.user_id, base_url = %config.gateway.base_url, "Configuration loaded");

    let feature = alphadesk_core::Feature::from_str(&args.feature)?;

    let mut app = alphadesk_app::Application::new(config)?;
    app.start_background();

    let request = SubmitRequest::new(feature, args.instrument, args.question);
    let job_id = app.submit_and_wait(request).await?;
    app.acknowledge(job_id);

    app.shutdown();
    Ok(())
}
