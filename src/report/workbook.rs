//! Excel workbook layout.
//!
//! One worksheet per site, one column per device. Columns appear in load
//! order, so the workbook reads the same way the inventory does regardless
//! of which sessions finished first. A failed device still gets its column,
//! with the failure tag where data would have been.

use std::path::Path;

use indexmap::IndexMap;
use rust_xlsxwriter::{Format, Workbook};

use crate::error::Result;
use crate::model::DeviceReport;
use crate::parse::NormalizedRecord;

/// Excel worksheet name limit.
const SHEET_NAME_MAX: usize = 31;

/// Field labels, in output order.
const FIELD_LABELS: [(&str, fn(&NormalizedRecord) -> Option<&String>); 9] = [
    ("Interface", |r| r.interface.as_ref()),
    ("Description", |r| r.description.as_ref()),
    ("VRF", |r| r.vrf.as_ref()),
    ("Tunnel source", |r| r.tunnel_source.as_ref()),
    ("Tunnel destination", |r| r.tunnel_destination.as_ref()),
    ("IP address", |r| r.ip_address.as_ref()),
    ("Bandwidth", |r| r.bandwidth.as_ref()),
    ("Classification", |r| r.classification.as_ref()),
    ("Neighbor", |r| r.neighbor_device.as_ref()),
];

/// Write the workbook to `path`.
pub fn write_workbook(path: &Path, reports: &[DeviceReport]) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for (site, site_reports) in group_by_site(reports) {
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(sanitize_sheet_name(site))
            .map_err(crate::error::ReportError::Xlsx)?;

        for (col, report) in site_reports.iter().enumerate() {
            let col = col as u16;
            let lines = column_lines(report);
            sheet
                .write_string_with_format(0, col, report.target.label(), &header_format)
                .map_err(crate::error::ReportError::Xlsx)?;
            for (row, line) in lines.iter().enumerate() {
                sheet
                    .write_string(row as u32 + 1, col, line.as_str())
                    .map_err(crate::error::ReportError::Xlsx)?;
            }
            let width = lines
                .iter()
                .map(|l| l.len())
                .chain(std::iter::once(report.target.label().len()))
                .max()
                .unwrap_or(0);
            sheet
                .set_column_width(col, (width.clamp(12, 80)) as f64)
                .map_err(crate::error::ReportError::Xlsx)?;
        }
    }

    workbook
        .save(path)
        .map_err(crate::error::ReportError::Xlsx)?;
    Ok(())
}

/// Group reports by site key, preserving load order within and across
/// groups.
pub fn group_by_site(reports: &[DeviceReport]) -> IndexMap<&str, Vec<&DeviceReport>> {
    let mut groups: IndexMap<&str, Vec<&DeviceReport>> = IndexMap::new();
    for report in reports {
        groups
            .entry(report.target.site_key())
            .or_default()
            .push(report);
    }
    groups
}

/// Clamp a site name to a legal worksheet name.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let cleaned = if cleaned.is_empty() { "Devices" } else { cleaned };
    cleaned.chars().take(SHEET_NAME_MAX).collect()
}

/// Render one device's column, the device header row excluded.
pub fn column_lines(report: &DeviceReport) -> Vec<String> {
    let mut lines = vec![report.target.address.clone()];

    if let Some(failure) = &report.failure {
        lines.push(failure.kind.tag().to_string());
        return lines;
    }

    for record in &report.records {
        lines.push(String::new());
        for (label, getter) in FIELD_LABELS {
            if let Some(value) = getter(record) {
                lines.push(format!("{label}: {value}"));
            }
        }
    }

    if !report.gaps.is_empty() {
        lines.push(String::new());
        for gap in &report.gaps {
            lines.push(format!("Note: {gap}"));
        }
    }

    if !report.qos_lines.is_empty() {
        lines.push(String::new());
        lines.push("QoS policies".to_string());
        lines.extend(report.qos_lines.iter().cloned());
    }

    lines
}
