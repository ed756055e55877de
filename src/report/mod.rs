//! Report output: the Excel workbook and the unreachable-devices log.

pub mod workbook;

pub use workbook::write_workbook;

use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::model::DeviceReport;

/// Write the plain-text log of failed targets. One line per failure,
/// nothing at all when every target completed.
pub fn write_unreachable_log(path: &Path, reports: &[DeviceReport]) -> Result<()> {
    let lines = unreachable_lines(reports);
    if lines.is_empty() {
        return Ok(());
    }
    let mut file = std::fs::File::create(path).map_err(crate::error::ReportError::Io)?;
    for line in &lines {
        writeln!(file, "{line}").map_err(crate::error::ReportError::Io)?;
    }
    Ok(())
}

/// Log lines for failed targets, in load order.
pub fn unreachable_lines(reports: &[DeviceReport]) -> Vec<String> {
    reports
        .iter()
        .filter_map(|report| {
            report.failure.as_ref().map(|failure| {
                format!(
                    "{} - {}: {}",
                    report.target.address,
                    failure.kind.tag(),
                    failure.message
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::model::Target;

    #[test]
    fn test_unreachable_lines_only_failures() {
        let reports = vec![
            DeviceReport::completed(Target::new("10.0.0.1"), Vec::new()),
            DeviceReport::failed(Target::new("10.0.0.2"), FailureKind::Auth, "auth rejected"),
        ];
        let lines = unreachable_lines(&reports);
        assert_eq!(lines, vec!["10.0.0.2 - AuthFailure: auth rejected"]);
    }

    #[test]
    fn test_no_log_file_when_all_complete() {
        let reports = vec![DeviceReport::completed(Target::new("10.0.0.1"), Vec::new())];
        let path = std::env::temp_dir().join("circuitscan_test_no_unreachable.txt");
        let _ = std::fs::remove_file(&path);
        write_unreachable_log(&path, &reports).unwrap();
        assert!(!path.exists());
    }
}
