//! Field normalization: typed fields out of extracted blocks.
//!
//! Every recognized field ends up either a validated value or `None`.
//! Matching runs an ordered list of patterns per field, most specific
//! first; the first capture wins and a miss is an absent field, never an
//! error. Absent fields are the steady state across heterogeneous device
//! configs, so nothing here aborts.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use super::blocks::{Block, BlockKind};

/// The structured result for one block. All fields are value-or-absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRecord {
    /// Interface name, full, including any subinterface suffix.
    pub interface: Option<String>,

    /// Cleaned interface description.
    pub description: Option<String>,

    /// VRF assignment, from the block itself or the routing-table join.
    pub vrf: Option<String>,

    /// Tunnel source interface or address.
    pub tunnel_source: Option<String>,

    /// Tunnel destination address.
    pub tunnel_destination: Option<String>,

    /// Interface address in CIDR form.
    pub ip_address: Option<String>,

    /// Circuit bandwidth, from the description (`100M`, `1G`) or the
    /// `bandwidth` statement.
    pub bandwidth: Option<String>,

    /// Public/private provider classification from the description.
    pub classification: Option<String>,

    /// Neighbor device name, for CDP fallback records.
    pub neighbor_device: Option<String>,
}

impl NormalizedRecord {
    /// True when every field is absent.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Ordered fallback chains, most specific pattern first.
static VRF_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)^vrf forwarding (\S+)").unwrap(),
        Regex::new(r"(?i)^ip vrf forwarding (\S+)").unwrap(),
    ]
});
static DESCRIPTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^description\s+(.+)").unwrap());
static TUNNEL_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^tunnel source (\S+)").unwrap());
static TUNNEL_DESTINATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^tunnel destination (\S+)").unwrap());
static IP_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^ip address (\d+\.\d+\.\d+\.\d+) (\d+\.\d+\.\d+\.\d+)").unwrap()
});
static BANDWIDTH_IN_DESC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s*(meg|mb|gb|m|g)\b").unwrap());
static BANDWIDTH_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^bandwidth (\d+)\s*$").unwrap());
static PRIVATE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\w+ans\d*\b").unwrap());
static CDP_DEVICE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Device ID:\s*(\S+)").unwrap());
static CDP_IP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^IP address:\s*(\S+)").unwrap());
static CDP_INTERFACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Interface:\s*([^,\s]+)").unwrap());

/// Public carrier names looked for in descriptions.
const PUBLIC_PROVIDERS: &[&str] = &["comcast", "crowncastle", "astound", "att"];

/// Normalize one block into a total record.
///
/// Pure: running it twice on the same block yields the same record.
pub fn normalize(block: &Block) -> NormalizedRecord {
    match block.kind {
        BlockKind::CdpNeighbor => normalize_cdp(block),
        _ => normalize_interface(block),
    }
}

fn normalize_interface(block: &Block) -> NormalizedRecord {
    let interface = match block.name() {
        "" => None,
        name => Some(name.to_string()),
    };

    let description = first_capture(std::slice::from_ref(&*DESCRIPTION_PATTERN), &block.lines)
        .map(|d| clean_description(&d));

    let bandwidth = description
        .as_deref()
        .and_then(bandwidth_from_description)
        .or_else(|| first_capture(std::slice::from_ref(&*BANDWIDTH_LINE), &block.lines));

    NormalizedRecord {
        interface,
        classification: description.as_deref().and_then(classify_provider),
        description,
        vrf: first_capture(&VRF_PATTERNS, &block.lines),
        tunnel_source: first_capture(std::slice::from_ref(&*TUNNEL_SOURCE), &block.lines),
        tunnel_destination: first_capture(
            std::slice::from_ref(&*TUNNEL_DESTINATION),
            &block.lines,
        ),
        ip_address: ip_cidr(&block.lines),
        bandwidth,
        neighbor_device: None,
    }
}

fn normalize_cdp(block: &Block) -> NormalizedRecord {
    // The header line is data too for CDP sections
    let mut lines: Vec<String> = vec![block.header.clone()];
    lines.extend(block.lines.iter().cloned());

    NormalizedRecord {
        neighbor_device: first_capture(std::slice::from_ref(&*CDP_DEVICE_ID), &lines),
        ip_address: first_capture(std::slice::from_ref(&*CDP_IP), &lines),
        interface: first_capture(std::slice::from_ref(&*CDP_INTERFACE), &lines),
        ..Default::default()
    }
}

/// Try each pattern in order against each line; first capture wins.
fn first_capture(patterns: &[Regex], lines: &[String]) -> Option<String> {
    for pattern in patterns {
        for line in lines {
            if let Some(caps) = pattern.captures(line) {
                return Some(caps[1].to_string());
            }
        }
    }
    None
}

/// Collapse repeated spaces and dots, capitalize the first letter.
pub fn clean_description(raw: &str) -> String {
    static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
    static DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());

    let cleaned = SPACES.replace_all(raw.trim(), " ");
    let cleaned = DOTS.replace_all(&cleaned, ".");

    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Parse a bandwidth hint out of a description: `100M fiber`, `1g`, `40 Meg`.
fn bandwidth_from_description(description: &str) -> Option<String> {
    BANDWIDTH_IN_DESC.captures(description).map(|caps| {
        let unit = if caps[2].to_lowercase().starts_with('g') {
            "G"
        } else {
            "M"
        };
        format!("{}{}", &caps[1], unit)
    })
}

/// Classify the provider named in a description.
///
/// Public carriers come from a fixed keyword list; private circuits use the
/// site `*ans<digits>` naming convention. A description naming both gets
/// both, comma separated.
fn classify_provider(description: &str) -> Option<String> {
    let lower = description.to_lowercase();
    let public = PUBLIC_PROVIDERS.iter().find(|kw| lower.contains(*kw)).map(|kw| {
        let mut chars = kw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    });
    let private = PRIVATE_TAG
        .find(&lower)
        .map(|m| m.as_str().to_string());

    match (public, private) {
        (Some(pu), Some(pr)) => Some(format!("{pu},{pr}")),
        (Some(pu), None) => Some(pu),
        (None, Some(pr)) => Some(pr),
        (None, None) => None,
    }
}

/// Turn `ip address A.B.C.D M.M.M.M` into CIDR. An unparseable or
/// non-contiguous mask leaves the field absent rather than half filled.
fn ip_cidr(lines: &[String]) -> Option<String> {
    for line in lines {
        if let Some(caps) = IP_ADDRESS.captures(line) {
            let addr: Ipv4Addr = caps[1].parse().ok()?;
            let prefix = prefix_len(&caps[2])?;
            return Some(format!("{addr}/{prefix}"));
        }
    }
    None
}

/// Prefix length of a dotted-quad netmask; None if not a valid mask.
pub fn prefix_len(mask: &str) -> Option<u8> {
    let mask: Ipv4Addr = mask.parse().ok()?;
    let bits = u32::from(mask);
    let ones = bits.count_ones();
    // Contiguous high bits only
    if bits.leading_ones() == ones {
        Some(ones as u8)
    } else {
        None
    }
}

/// Per-device interface-to-VRF index built from routing-table blocks,
/// discarded after normalization.
#[derive(Debug, Default)]
pub struct VrfIndex {
    map: IndexMap<String, String>,
}

impl VrfIndex {
    /// Fold routing pairs into the index. First writer wins; a duplicate
    /// interface under a second VRF keeps the first assignment.
    pub fn extend_pairs(&mut self, pairs: Vec<(String, String)>) {
        for (interface, vrf) in pairs {
            self.map.entry(interface).or_insert(vrf);
        }
    }

    /// Look up the VRF for an interface name.
    pub fn get(&self, interface: &str) -> Option<&str> {
        self.map.get(interface).map(String::as_str)
    }

    /// Number of indexed interfaces.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Attach VRF assignments from the routing index to records that have an
/// interface name but no VRF of their own. Missing join targets stay absent.
pub fn apply_vrf_index(records: &mut [NormalizedRecord], index: &VrfIndex) {
    for record in records.iter_mut() {
        if record.vrf.is_some() {
            continue;
        }
        if let Some(interface) = record.interface.as_deref() {
            if let Some(vrf) = index.get(interface) {
                record.vrf = Some(vrf.to_string());
            }
        }
    }
}

/// Fill absent descriptions and addresses from the tabular show commands.
///
/// The running config is the primary source; the `show interface
/// description` and `show ip interface brief` tables are the general
/// fallback, tried only where the specific pattern missed. Addresses from
/// the brief table carry no mask, so they go in bare.
pub fn apply_fallback_tables(
    records: &mut [NormalizedRecord],
    descriptions: &[(String, String)],
    addresses: &[(String, String)],
) {
    for record in records.iter_mut() {
        let Some(interface) = record.interface.as_deref() else {
            continue;
        };
        if record.description.is_none() {
            if let Some((_, desc)) = descriptions.iter().find(|(name, _)| name == interface) {
                record.description = Some(clean_description(desc));
                if record.classification.is_none() {
                    record.classification = classify_provider(desc);
                }
                if record.bandwidth.is_none() {
                    record.bandwidth = bandwidth_from_description(desc);
                }
            }
        }
        if record.ip_address.is_none() {
            if let Some((_, addr)) = addresses.iter().find(|(name, _)| name == interface) {
                record.ip_address = Some(addr.clone());
            }
        }
    }
}

/// Full interface headers that appear more than once.
///
/// Subinterfaces sharing a base name are distinct; a literally repeated
/// header is a parse gap worth flagging, never a silent overwrite.
pub fn duplicate_headers(blocks: &[Block]) -> Vec<String> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for block in blocks {
        *counts.entry(block.header.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(header, _)| header.to_string())
        .collect()
}
