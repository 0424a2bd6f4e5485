use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use crate::driver::Sinks;
use crate::sinks::{CachingGeoIpSink, HttpAlertSink, InMemoryNodeSink};

mod config;
mod driver;
mod error;
mod sinks;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the project's YAML configuration file.
    #[arg(short, long, default_value = "config/project.config.yaml")]
    config: PathBuf,

    /// Overrides `chainConfig.name` / the `CHAIN` environment variable.
    #[arg(long)]
    chain: Option<String>,

    /// Run a single pass and exit instead of looping forever.
    #[arg(long, conflicts_with = "continuous")]
    once: bool,

    /// Loop forever, sleeping `scanIntervalMinutes` between passes (default).
    #[arg(long)]
    continuous: bool,

    /// Increase log verbosity (debug).
    #[arg(short, long)]
    verbose: bool,

    /// Decrease log verbosity (warnings and above only).
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Alert webhook URL. If unset, alerts are attempted against an empty URL
    /// and logged as a failure rather than crashing the crawler.
    #[arg(long)]
    alert_webhook_url: Option<String>,

    /// Bearer token for the alert webhook.
    #[arg(long, default_value = "")]
    alert_api_key: String,
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_colors(true)
        .with_level(level)
        .with_local_timestamps()
        .init()
        .unwrap();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(&args).await {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(args: &Args) -> Result<(), error::CliError> {
    let config = config::load(&args.config, args.chain.as_deref())?;

    let node_sink = InMemoryNodeSink::new();
    let geoip_sink = CachingGeoIpSink::new();
    let alert_sink = HttpAlertSink::new(
        args.alert_webhook_url.clone().unwrap_or_default(),
        args.alert_api_key.clone(),
    );
    let sinks = Sinks {
        nodes: &node_sink,
        geoip: &geoip_sink,
        alerts: &alert_sink,
    };

    if args.once {
        driver::run_once(&config, &sinks).await?;
        Ok(())
    } else {
        driver::run_continuous(&config, &sinks).await
    }
}
