//! Reachability sweep: one OS ping per address, bounded fan-out, results
//! in load order.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::debug;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{ReportError, Result};

/// One address's sweep outcome.
#[derive(Debug, Clone)]
pub struct SweepResult {
    /// The address pinged.
    pub address: String,

    /// True when the ping got a reply.
    pub reachable: bool,

    /// When the ping completed.
    pub checked_at: DateTime<Local>,
}

impl SweepResult {
    /// Render the log line for this result.
    pub fn log_line(&self) -> String {
        format!(
            "{} - {}: {}",
            self.checked_at.format("%Y-%m-%d %H:%M:%S"),
            self.address,
            if self.reachable {
                "reachable"
            } else {
                "unreachable"
            }
        )
    }
}

/// Ping every address with at most `concurrency` in flight. Results come
/// back in input order.
pub async fn sweep(addresses: Vec<String>, concurrency: usize) -> Vec<SweepResult> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<(usize, SweepResult)> = JoinSet::new();

    for (index, address) in addresses.iter().cloned().enumerate() {
        let permit_sem = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = permit_sem.acquire_owned().await.expect("semaphore closed");
            let reachable = ping(&address).await;
            let result = SweepResult {
                address,
                reachable,
                checked_at: Local::now(),
            };
            (index, result)
        });
    }

    let mut slots: Vec<Option<SweepResult>> = addresses.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, result)) = joined {
            slots[index] = Some(result);
        }
    }

    slots
        .into_iter()
        .zip(addresses)
        .map(|(slot, address)| {
            slot.unwrap_or(SweepResult {
                address,
                reachable: false,
                checked_at: Local::now(),
            })
        })
        .collect()
}

/// Single ping. Any spawn failure counts as unreachable.
pub async fn ping(address: &str) -> bool {
    let mut command = Command::new("ping");
    command.args(ping_args()).arg(address);
    command.stdout(Stdio::null()).stderr(Stdio::null());
    match command.status().await {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("{address}: ping spawn failed: {e}");
            false
        }
    }
}

#[cfg(windows)]
fn ping_args() -> [&'static str; 4] {
    ["-n", "1", "-w", "2000"]
}

#[cfg(not(windows))]
fn ping_args() -> [&'static str; 4] {
    ["-c", "1", "-W", "2"]
}

/// Write the sweep log, one line per address in input order.
pub fn write_sweep_log(path: &Path, results: &[SweepResult]) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(ReportError::Io)?;
    for result in results {
        writeln!(file, "{}", result.log_line()).map_err(ReportError::Io)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_line_format() {
        let result = SweepResult {
            address: "10.0.0.1".to_string(),
            reachable: true,
            checked_at: Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
        };
        assert_eq!(result.log_line(), "2026-03-14 09:26:53 - 10.0.0.1: reachable");

        let down = SweepResult {
            reachable: false,
            ..result
        };
        assert_eq!(
            down.log_line(),
            "2026-03-14 09:26:53 - 10.0.0.1: unreachable"
        );
    }

    #[tokio::test]
    async fn test_sweep_preserves_input_order() {
        // Loopback answers, the documentation range does not resolve to a
        // reply; order must match input either way
        let addresses = vec!["127.0.0.1".to_string(), "192.0.2.1".to_string()];
        let results = sweep(addresses.clone(), 2).await;
        let got: Vec<_> = results.iter().map(|r| r.address.clone()).collect();
        assert_eq!(got, addresses);
    }
}
