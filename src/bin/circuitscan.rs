//! Circuit-information collector CLI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use secrecy::SecretString;

use circuitscan::collector::{Collector, CollectorOptions, Credentials};
use circuitscan::inventory;
use circuitscan::report;
use circuitscan::transport::HostKeyVerification;

/// Collect WAN circuit information from Cisco IOS routers into an Excel
/// workbook.
///
/// The SSH password is read from CIRCUITSCAN_PASSWORD and the optional
/// enable secret from CIRCUITSCAN_ENABLE.
#[derive(Parser, Debug)]
#[command(name = "circuitscan", version, about)]
struct Cli {
    /// Inventory file: CSV with an address column, or one address per line
    inventory: PathBuf,

    /// SSH username
    #[arg(short, long)]
    username: String,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    port: u16,

    /// Maximum concurrent device sessions
    #[arg(short, long, default_value_t = 8)]
    concurrency: usize,

    /// Per-session timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Skip host key verification
    #[arg(long)]
    insecure: bool,

    /// Directory for output files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let password = match std::env::var("CIRCUITSCAN_PASSWORD") {
        Ok(value) if !value.is_empty() => SecretString::from(value),
        _ => bail!("CIRCUITSCAN_PASSWORD is not set"),
    };
    let enable_secret = std::env::var("CIRCUITSCAN_ENABLE")
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from);

    let targets = inventory::load_targets(&cli.inventory)
        .with_context(|| format!("loading inventory {}", cli.inventory.display()))?;
    println!("Loaded {} targets", targets.len());

    let credentials = Credentials {
        username: cli.username,
        password,
        enable_secret,
    };
    let options = CollectorOptions {
        concurrency: cli.concurrency,
        timeout: Duration::from_secs(cli.timeout),
        port: cli.port,
        host_key_verification: if cli.insecure {
            HostKeyVerification::Disabled
        } else {
            HostKeyVerification::default()
        },
    };

    let collector = Collector::new(credentials, options);
    let reports = collector.run(targets).await;

    let completed = reports.iter().filter(|r| !r.is_failed()).count();
    let failed = reports.len() - completed;
    let records: usize = reports.iter().map(|r| r.records.len()).sum();
    println!(
        "{} devices collected, {} failed, {} circuit records",
        completed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        },
        records
    );

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let workbook_path = cli.output_dir.join(format!("Circuit_Info_{stamp}.xlsx"));
    report::write_workbook(&workbook_path, &reports)
        .with_context(|| format!("writing {}", workbook_path.display()))?;
    println!("Wrote {}", workbook_path.display());

    if failed > 0 {
        let log_path = cli
            .output_dir
            .join(format!("unreachable_devices_{stamp}.txt"));
        report::write_unreachable_log(&log_path, &reports)
            .with_context(|| format!("writing {}", log_path.display()))?;
        println!("Wrote {}", log_path.display());
    }

    Ok(())
}
