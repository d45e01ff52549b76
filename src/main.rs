//! API Sunset - configuration checker and timeline report

use anyhow::{Context, Result};
use api_sunset::headers::parse_http_date;
use api_sunset::{ApiSunsetConfig, SunsetRegistry};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "api-sunset",
    about = "Validate API sunset configuration and report endpoint periods",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "api-sunset.yaml")]
    config: PathBuf,

    /// Report as of this instant (RFC 3339 or HTTP date), defaults to now
    #[arg(long, value_name = "DATE", value_parser = parse_as_of)]
    as_of: Option<DateTime<Utc>>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn parse_as_of(s: &str) -> Result<DateTime<Utc>, String> {
    parse_http_date(s).ok_or_else(|| format!("invalid date: {s}"))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        print!("{}", include_str!("../config/api-sunset.example.yaml"));
        return Ok(());
    }

    info!(path = ?args.config, "Loading configuration");
    let config = ApiSunsetConfig::from_file(&args.config)
        .with_context(|| format!("Invalid configuration in {:?}", args.config))?;

    let registry = SunsetRegistry::from_config(&config)
        .with_context(|| format!("Failed to register endpoints from {:?}", args.config))?;

    if args.validate {
        println!("Configuration is valid ({} endpoints)", registry.len());
        return Ok(());
    }

    let as_of = args.as_of.unwrap_or_else(Utc::now);
    let report = registry.report(as_of);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("As of {}", as_of.to_rfc3339());
    for status in &report {
        let days = status
            .days_until_sunset
            .map(|d| format!("{d} days until sunset"))
            .unwrap_or_else(|| "no sunset date".to_string());
        println!(
            "{} {} period={} behavior={} ({})",
            status.id, status.path, status.period, status.behavior, days
        );
        for (name, value) in &status.headers {
            println!("    {}: {}", name, value);
        }
    }

    Ok(())
}
