//! Per-device collection pipeline and the bounded fan-out runner.
//!
//! Each target runs its own connect, inspect, extract and normalize
//! chain. The runner fans out one task per target under a semaphore and
//! reassembles results in load order once every chain has reached a
//! terminal state. A failed target becomes an error-stub report and never
//! disturbs the others.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{FailureKind, Result, SessionError};
use crate::model::{DeviceReport, Target};
use crate::parse::blocks;
use crate::parse::fields::{self, VrfIndex};
use crate::session::{CommandOutput, SessionBuilder};
use crate::transport::HostKeyVerification;

/// Inspection commands, in execution order. CDP runs separately, as a
/// fallback only.
pub const SHOW_RUNNING_CONFIG: &str = "show running-config";
pub const SHOW_IP_INT_BRIEF: &str = "show ip interface brief";
pub const SHOW_VRF: &str = "show vrf";
pub const SHOW_INT_DESCRIPTION: &str = "show interface description";
pub const SHOW_CDP_NEIGHBORS: &str = "show cdp neighbors detail";

/// Resolved credentials for a run. Supplied out-of-band, never persisted.
#[derive(Clone)]
pub struct Credentials {
    /// SSH username.
    pub username: String,

    /// SSH password.
    pub password: SecretString,

    /// Enable secret; exec mode only when absent.
    pub enable_secret: Option<SecretString>,
}

/// Knobs for a collection run.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Maximum concurrent device sessions.
    pub concurrency: usize,

    /// Per-session operation timeout.
    pub timeout: Duration,

    /// SSH port for all targets.
    pub port: u16,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout: Duration::from_secs(30),
            port: 22,
            host_key_verification: HostKeyVerification::default(),
        }
    }
}

/// Runs the collection pipeline across a target list.
pub struct Collector {
    credentials: Credentials,
    options: CollectorOptions,
}

impl Collector {
    /// Create a collector with resolved credentials and options.
    pub fn new(credentials: Credentials, options: CollectorOptions) -> Self {
        Self {
            credentials,
            options,
        }
    }

    /// Collect every target. Returns one report per target, in load order,
    /// error stubs included.
    pub async fn run(&self, targets: Vec<Target>) -> Vec<DeviceReport> {
        let concurrency = self.options.concurrency;
        run_with(concurrency, targets, |target| {
            let credentials = self.credentials.clone();
            let options = self.options.clone();
            async move { collect_device(target, credentials, options).await }
        })
        .await
    }
}

/// Fan out one collection future per target, bounded by a semaphore, and
/// join the results back into load order.
pub async fn run_with<F, Fut>(concurrency: usize, targets: Vec<Target>, collect: F) -> Vec<DeviceReport>
where
    F: Fn(Target) -> Fut,
    Fut: Future<Output = DeviceReport> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<(usize, DeviceReport)> = JoinSet::new();

    for (index, target) in targets.iter().cloned().enumerate() {
        let permit_sem = Arc::clone(&semaphore);
        // Build the future up front; it does no work until the permit
        // is held and it gets polled.
        let fut = collect(target);
        tasks.spawn(async move {
            let _permit = permit_sem.acquire_owned().await.expect("semaphore closed");
            (index, fut.await)
        });
    }

    let mut slots: Vec<Option<DeviceReport>> = targets.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, report)) => slots[index] = Some(report),
            Err(e) => warn!("collection task aborted: {e}"),
        }
    }

    slots
        .into_iter()
        .zip(targets)
        .map(|(slot, target)| {
            slot.unwrap_or_else(|| {
                DeviceReport::failed(target, FailureKind::Connection, "collection task aborted")
            })
        })
        .collect()
}

/// Collect one device, turning any error into an error-stub report.
async fn collect_device(
    target: Target,
    credentials: Credentials,
    options: CollectorOptions,
) -> DeviceReport {
    info!("{}: collecting", target.label());
    match try_collect(&target, credentials, options).await {
        Ok(report) => {
            info!(
                "{}: {} records, {} gaps",
                target.label(),
                report.records.len(),
                report.gaps.len()
            );
            report
        }
        Err(err) => {
            let kind = FailureKind::classify(&err);
            warn!("{}: {} ({})", target.label(), err, kind.tag());
            DeviceReport::failed(target, kind, err.to_string())
        }
    }
}

/// The full per-device pipeline. Errors here are per-target terminal.
async fn try_collect(
    target: &Target,
    credentials: Credentials,
    options: CollectorOptions,
) -> Result<DeviceReport> {
    let mut builder = SessionBuilder::new(&target.address)
        .port(options.port)
        .username(&credentials.username)
        .password(credentials.password.expose_secret())
        .timeout(options.timeout)
        .host_key_verification(options.host_key_verification);
    if let Some(secret) = &credentials.enable_secret {
        builder = builder.enable_secret(secret.expose_secret());
    }
    let mut session = builder.build()?;

    session.open().await?;

    let show_run = session.run(SHOW_RUNNING_CONFIG).await?;
    require_success(&show_run)?;
    let brief = session.run(SHOW_IP_INT_BRIEF).await?;
    let show_vrf = session.run(SHOW_VRF).await?;

    // Per-VRF routing tables feed the interface-to-VRF join
    let mut vrf_index = VrfIndex::default();
    if show_vrf.is_success() {
        for vrf in blocks::vrf_names(&show_vrf.result) {
            let routes = session.run(&format!("show ip route vrf {vrf}")).await?;
            if routes.is_success() {
                vrf_index.extend_pairs(blocks::route_interface_pairs(&vrf, &routes.result));
            } else {
                debug!("{}: no route table for vrf {vrf}", target.label());
            }
        }
    }

    let descriptions_out = session.run(SHOW_INT_DESCRIPTION).await?;

    let descriptions = if descriptions_out.is_success() {
        blocks::description_table(&descriptions_out.result)
    } else {
        Vec::new()
    };
    let addresses = if brief.is_success() {
        blocks::address_table(&brief.result)
    } else {
        Vec::new()
    };

    let mut report = assemble_report(
        target.clone(),
        &show_run.result,
        &descriptions,
        &addresses,
        &vrf_index,
    );

    // CDP neighbors only as a fallback when nothing circuit-like was found
    if report.records.is_empty() && report.failure.is_none() {
        let cdp = session.run(SHOW_CDP_NEIGHBORS).await?;
        if cdp.is_success() {
            let neighbors = blocks::cdp_neighbor_blocks(&cdp.result);
            if !neighbors.is_empty() {
                report
                    .gaps
                    .push("no circuit interfaces detected; CDP neighbor fallback".to_string());
                report
                    .records
                    .extend(neighbors.iter().map(fields::normalize));
            }
        }
    }

    if let Err(e) = session.close().await {
        debug!("{}: close failed: {e}", target.label());
    }

    Ok(report)
}

/// The running config is the one command every target must accept. A
/// device that rejects it has nothing to extract, so the rejection fails
/// the target as a whole; auxiliary commands may still fail softly.
fn require_success(output: &CommandOutput) -> Result<()> {
    match &output.failure_message {
        Some(message) => Err(SessionError::CommandFailed {
            command: output.command.clone(),
            message: message.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Build a device report from parsed running config plus the fallback
/// tables and the VRF join index. Pure, so it is testable without a device.
pub fn assemble_report(
    target: Target,
    running_config: &str,
    descriptions: &[(String, String)],
    addresses: &[(String, String)],
    vrf_index: &VrfIndex,
) -> DeviceReport {
    if let Some(marker) = blocks::no_data_marker(running_config) {
        let mut report = DeviceReport::completed(target, Vec::new());
        report.gaps.push(format!("{SHOW_RUNNING_CONFIG}: {marker}"));
        return report;
    }

    let all_blocks = blocks::config_blocks(running_config);
    let circuit_blocks = blocks::select_circuit_blocks(&all_blocks);

    let mut records: Vec<_> = circuit_blocks.iter().map(fields::normalize).collect();
    fields::apply_vrf_index(&mut records, vrf_index);
    fields::apply_fallback_tables(&mut records, descriptions, addresses);

    let mut report = DeviceReport::completed(target, records);
    for header in fields::duplicate_headers(&circuit_blocks) {
        report.gaps.push(format!("duplicate block: {header}"));
    }
    for qos in blocks::referenced_qos_blocks(&all_blocks, running_config) {
        report.qos_lines.push(qos.header.clone());
        report.qos_lines.extend(qos.lines.iter().cloned());
        report.qos_lines.push(String::new());
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING_CONFIG: &str = "\
interface Tunnel0
 description WAN-WEST EWANS2 40M CID# 4471
 vrf forwarding CORP
 ip address 10.20.0.1 255.255.255.252
 tunnel source GigabitEthernet0/1
 tunnel destination 203.0.113.5
!
interface Tunnel3
 description site b backup
!
interface GigabitEthernet0/0/2
 description mgmt only
!
";

    #[test]
    fn test_assemble_report_with_join() {
        let mut vrf_index = VrfIndex::default();
        vrf_index.extend_pairs(vec![("Tunnel3".to_string(), "SITEB".to_string())]);

        let report = assemble_report(
            Target::new("10.0.0.1"),
            RUNNING_CONFIG,
            &[],
            &[],
            &vrf_index,
        );

        assert!(!report.is_failed());
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].interface.as_deref(), Some("Tunnel0"));
        assert_eq!(report.records[0].vrf.as_deref(), Some("CORP"));
        assert_eq!(report.records[1].interface.as_deref(), Some("Tunnel3"));
        assert_eq!(report.records[1].vrf.as_deref(), Some("SITEB"));
    }

    #[test]
    fn test_assemble_report_flags_repeated_header() {
        let config = "\
interface Tunnel0
 description EWANS primary
!
interface Tunnel0
 description EWANS shadow copy
!
";
        let report = assemble_report(
            Target::new("10.0.0.1"),
            config,
            &[],
            &[],
            &VrfIndex::default(),
        );

        // Both blocks become records and the repetition is a gap note,
        // never a silent merge and never an error
        assert!(!report.is_failed());
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.gaps, vec!["duplicate block: interface Tunnel0"]);
    }

    #[test]
    fn test_rejected_running_config_is_command_failure() {
        let output = CommandOutput {
            command: SHOW_RUNNING_CONFIG.to_string(),
            result: "% Invalid input detected at '^' marker.".to_string(),
            raw_result: String::new(),
            prompt: "router#".to_string(),
            elapsed: Duration::from_millis(5),
            failure_message: Some("% Invalid input".to_string()),
        };
        let err = require_success(&output).unwrap_err();
        assert_eq!(FailureKind::classify(&err).tag(), "CommandFailure");

        let ok = CommandOutput {
            failure_message: None,
            ..output
        };
        assert!(require_success(&ok).is_ok());
    }

    #[test]
    fn test_assemble_report_error_output() {
        let report = assemble_report(
            Target::new("10.0.0.1"),
            "% Invalid input detected at '^' marker.",
            &[],
            &[],
            &VrfIndex::default(),
        );
        assert!(report.records.is_empty());
        assert_eq!(report.gaps.len(), 1);
        assert!(report.gaps[0].contains("% Invalid input"));
    }

    #[tokio::test]
    async fn test_run_with_preserves_load_order() {
        let targets = vec![
            Target::new("10.0.0.1"),
            Target::new("10.0.0.2"),
            Target::new("10.0.0.3"),
        ];

        let reports = run_with(2, targets, |target| async move {
            // Earlier targets finish later; ordering must still hold
            let delay = match target.address.as_str() {
                "10.0.0.1" => 30,
                "10.0.0.2" => 20,
                _ => 1,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            DeviceReport::completed(target, Vec::new())
        })
        .await;

        let addrs: Vec<_> = reports.iter().map(|r| r.target.address.as_str()).collect();
        assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    }

    #[tokio::test]
    async fn test_run_with_failed_target_is_stub_and_others_complete() {
        let targets = vec![Target::new("10.0.0.1"), Target::new("10.0.0.2")];

        let reports = run_with(4, targets, |target| async move {
            if target.address == "10.0.0.2" {
                DeviceReport::failed(target, FailureKind::Connection, "timed out")
            } else {
                let config = "interface Tunnel0\n description WAN-WEST\n vrf forwarding CORP\n tunnel source Gi0/1\n tunnel destination 203.0.113.5\n";
                assemble_report(target, config, &[], &[], &VrfIndex::default())
            }
        })
        .await;

        assert_eq!(reports.len(), 2);
        assert!(!reports[0].is_failed());
        assert_eq!(
            reports[0].records[0].tunnel_destination.as_deref(),
            Some("203.0.113.5")
        );
        let failure = reports[1].failure.as_ref().unwrap();
        assert_eq!(failure.kind.tag(), "ConnectionFailure");
    }

    #[tokio::test]
    async fn test_run_with_bounds_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static ACTIVE: AtomicUsize = AtomicUsize::new(0);
        static PEAK: AtomicUsize = AtomicUsize::new(0);

        let targets: Vec<_> = (0..16)
            .map(|i| Target::new(format!("10.0.1.{i}")))
            .collect();

        let reports = run_with(3, targets, |target| async move {
            let active = ACTIVE.fetch_add(1, Ordering::SeqCst) + 1;
            PEAK.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            ACTIVE.fetch_sub(1, Ordering::SeqCst);
            DeviceReport::completed(target, Vec::new())
        })
        .await;

        assert_eq!(reports.len(), 16);
        assert!(PEAK.load(Ordering::SeqCst) <= 3);
    }
}
