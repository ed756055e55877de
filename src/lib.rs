//! # Circuitscan
//!
//! Async circuit-information collector for Cisco IOS WAN routers.
//!
//! Circuitscan connects to a list of devices over SSH, scrapes the running
//! configuration and a handful of show commands, extracts the interface
//! blocks that describe WAN circuits, normalizes them into records, and
//! writes an Excel workbook with one column per device. A reachability
//! sweep utility is included for pre-checking a target list.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use circuitscan::{Collector, CollectorOptions, Credentials, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), circuitscan::Error> {
//!     let credentials = Credentials {
//!         username: "admin".to_string(),
//!         password: "secret".into(),
//!         enable_secret: None,
//!     };
//!     let collector = Collector::new(credentials, CollectorOptions::default());
//!
//!     let targets = vec![Target::new("192.168.1.1")];
//!     let reports = collector.run(targets).await;
//!
//!     for report in &reports {
//!         println!("{}: {} records", report.target.label(), report.records.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod error;
pub mod inventory;
pub mod model;
pub mod parse;
pub mod report;
pub mod session;
pub mod sweep;
pub mod transport;

// Re-export main types for convenience
pub use collector::{Collector, CollectorOptions, Credentials};
pub use error::{Error, FailureKind};
pub use model::{DeviceFailure, DeviceReport, Target};
pub use parse::{NormalizedRecord, VrfIndex};
pub use session::{CiscoSession, SessionBuilder};
pub use transport::{AuthMethod, HostKeyVerification, SshConfig};
