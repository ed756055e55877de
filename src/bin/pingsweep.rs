//! Reachability sweep CLI.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use colored::Colorize;

use circuitscan::inventory;
use circuitscan::sweep;

/// Ping every address in an inventory file and log the results.
#[derive(Parser, Debug)]
#[command(name = "pingsweep", version, about)]
struct Cli {
    /// Inventory file: CSV with an address column, or one address per line
    inventory: PathBuf,

    /// Maximum concurrent pings
    #[arg(short, long, default_value_t = 32)]
    concurrency: usize,

    /// Directory for the log file
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Skip writing the log file
    #[arg(long)]
    no_log: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let targets = inventory::load_targets(&cli.inventory)
        .with_context(|| format!("loading inventory {}", cli.inventory.display()))?;
    let addresses: Vec<String> = targets.into_iter().map(|t| t.address).collect();
    println!("Sweeping {} addresses", addresses.len());

    let results = sweep::sweep(addresses, cli.concurrency).await;

    for result in &results {
        let status = if result.reachable {
            "reachable".green()
        } else {
            "unreachable".red()
        };
        println!("{}: {}", result.address, status);
    }

    let up = results.iter().filter(|r| r.reachable).count();
    println!("{} of {} reachable", up, results.len());

    if !cli.no_log {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = cli.output_dir.join(format!("ping_log_{stamp}.txt"));
        sweep::write_sweep_log(&log_path, &results)
            .with_context(|| format!("writing {}", log_path.display()))?;
        println!("Wrote {}", log_path.display());
    }

    Ok(())
}
