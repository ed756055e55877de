//! Core data model: targets and per-device reports.

use crate::error::FailureKind;
use crate::parse::NormalizedRecord;

/// One device to collect from. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Address to connect to (hostname or IP).
    pub address: String,

    /// Optional hostname label from the inventory.
    pub hostname: Option<String>,

    /// Optional site grouping from the inventory.
    pub site: Option<String>,
}

impl Target {
    /// Create a target with just an address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            hostname: None,
            site: None,
        }
    }

    /// Display label: the hostname when known, the address otherwise.
    pub fn label(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.address)
    }

    /// Worksheet grouping key.
    pub fn site_key(&self) -> &str {
        self.site.as_deref().unwrap_or("Devices")
    }
}

/// Why a device produced no data.
#[derive(Debug, Clone)]
pub struct DeviceFailure {
    /// Failure classification.
    pub kind: FailureKind,

    /// Human-readable reason, as it goes into the unreachable log.
    pub message: String,
}

/// Everything collected for one target.
///
/// A target that completed produces records (possibly zero, with gaps
/// noting why); a target whose session failed produces a failure stub and
/// nothing else. Never both, never neither.
#[derive(Debug, Clone)]
pub struct DeviceReport {
    /// The target this report describes.
    pub target: Target,

    /// Normalized circuit records, in config order. CDP fallback records
    /// come last when present.
    pub records: Vec<NormalizedRecord>,

    /// Raw lines of referenced QoS policy-map blocks.
    pub qos_lines: Vec<String>,

    /// Parse gaps: no-data markers and duplicate-header flags. Non-fatal.
    pub gaps: Vec<String>,

    /// Set when the session failed before producing data.
    pub failure: Option<DeviceFailure>,
}

impl DeviceReport {
    /// Build a report for a completed collection.
    pub fn completed(target: Target, records: Vec<NormalizedRecord>) -> Self {
        Self {
            target,
            records,
            qos_lines: Vec::new(),
            gaps: Vec::new(),
            failure: None,
        }
    }

    /// Build an error-stub report for a failed target.
    pub fn failed(target: Target, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            target,
            records: Vec::new(),
            qos_lines: Vec::new(),
            gaps: Vec::new(),
            failure: Some(DeviceFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    /// True for error-stub reports.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}
