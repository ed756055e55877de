//! Target list loading.
//!
//! Two input shapes: a CSV export with an address column (headers resolved
//! by fuzzy alias matching, so `IP Address`, `ip_address` and `IP` all
//! work), or a plain line-delimited list of addresses. A load failure is
//! run-fatal; nothing else in a run is.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{InventoryError, Result};
use crate::model::Target;

const ADDRESS_ALIASES: &[&str] = &["ip", "ipaddress", "ip address", "address", "mgmtip"];
const HOSTNAME_ALIASES: &[&str] = &["hostname", "switch", "device", "router"];
const SITE_ALIASES: &[&str] = &["sitename", "siteid", "site", "location"];

/// Load targets from a path. `.csv` files get header-based parsing;
/// everything else is treated as a line-delimited address list.
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let targets = if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
        load_csv(path)?
    } else {
        load_lines(path)?
    };

    if targets.is_empty() {
        return Err(InventoryError::Empty {
            path: path.display().to_string(),
        }
        .into());
    }

    debug!("loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

fn load_csv(path: &Path) -> Result<Vec<Target>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(InventoryError::from)?;

    let headers = reader.headers().map_err(InventoryError::from)?.clone();
    let address_col =
        find_column(&headers, ADDRESS_ALIASES).ok_or_else(|| InventoryError::MissingAddressColumn {
            tried: ADDRESS_ALIASES.join(", "),
        })?;
    let hostname_col = find_column(&headers, HOSTNAME_ALIASES);
    let site_col = find_column(&headers, SITE_ALIASES);

    let mut targets = Vec::new();
    for row in reader.records() {
        let row = row.map_err(InventoryError::from)?;
        let address = row.get(address_col).unwrap_or("").trim();
        if address.is_empty() {
            continue;
        }
        targets.push(Target {
            address: address.to_string(),
            hostname: hostname_col
                .and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            site: site_col
                .and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        });
    }
    Ok(targets)
}

fn load_lines(path: &Path) -> Result<Vec<Target>> {
    let content = fs::read_to_string(path).map_err(InventoryError::from)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Target::new)
        .collect())
}

/// Find the index of the first header matching any alias, after
/// normalizing both sides down to lowercase letters.
fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    for alias in aliases {
        let want = normalize_column(alias);
        for (index, header) in headers.iter().enumerate() {
            if normalize_column(header) == want {
                return Some(index);
            }
        }
    }
    None
}

fn normalize_column(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("circuitscan-test-{name}"));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_line_delimited() {
        let path = temp_file("lines.txt", "10.0.0.1\n\n# core\n10.0.0.2\n");
        let targets = load_targets(&path).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].address, "10.0.0.1");
        assert!(targets[0].hostname.is_none());
    }

    #[test]
    fn test_load_csv_with_fuzzy_headers() {
        let path = temp_file(
            "inv.csv",
            "Site Name,Host_Name,IP Address\nWEST,wan-edge-1,10.0.0.1\nEAST,,10.0.0.2\n",
        );
        let targets = load_targets(&path).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].address, "10.0.0.1");
        assert_eq!(targets[0].hostname.as_deref(), Some("wan-edge-1"));
        assert_eq!(targets[0].site.as_deref(), Some("WEST"));
        assert!(targets[1].hostname.is_none());
    }

    #[test]
    fn test_csv_without_address_column_fails() {
        let path = temp_file("bad.csv", "Name,Location\nfoo,bar\n");
        let err = load_targets(&path).unwrap_err();
        assert!(err.to_string().contains("address column"));
    }

    #[test]
    fn test_empty_list_fails() {
        let path = temp_file("empty.txt", "\n# nothing\n");
        assert!(load_targets(&path).is_err());
    }

    #[test]
    fn test_load_order_preserved() {
        let path = temp_file("order.txt", "10.0.0.3\n10.0.0.1\n10.0.0.2\n");
        let targets = load_targets(&path).unwrap();
        let addrs: Vec<_> = targets.iter().map(|t| t.address.as_str()).collect();
        assert_eq!(addrs, vec!["10.0.0.3", "10.0.0.1", "10.0.0.2"]);
    }
}
