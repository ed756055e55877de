//! Block extraction from raw `show` command output.
//!
//! IOS running-config output is line oriented: a block starts at a header
//! at column zero (`interface Tunnel0`, `policy-map qos-wan`) and continues
//! through the indented lines that follow, until the next header or a
//! separator. The extractor is a single pass over the lines; it never
//! errors on malformed output, it just produces fewer blocks.

use regex::Regex;
use std::sync::LazyLock;

use crate::session::prompt::find_failure;

/// What a block describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// A tunnel interface (`interface Tunnel0`).
    Tunnel,
    /// A dotted subinterface (`interface GigabitEthernet0/0/1.101`),
    /// the usual shape of a private WAN handoff.
    PrivateSub,
    /// Any other interface.
    Interface,
    /// One routing table from a `show ip route vrf` dump.
    Vrf,
    /// A QoS policy-map block.
    Qos,
    /// One neighbor section from `show cdp neighbors detail`.
    CdpNeighbor,
}

/// A contiguous span of command output describing one logical entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block classification.
    pub kind: BlockKind,

    /// The header line, trimmed.
    pub header: String,

    /// Body lines, trimmed of indentation.
    pub lines: Vec<String>,
}

impl Block {
    fn new(kind: BlockKind, header: &str) -> Self {
        Self {
            kind,
            header: header.trim().to_string(),
            lines: Vec::new(),
        }
    }

    /// The configured name: `Tunnel0` for `interface Tunnel0`,
    /// `qos-wan` for `policy-map qos-wan`.
    pub fn name(&self) -> &str {
        self.header.split_whitespace().nth(1).unwrap_or("")
    }

    /// Whole block text, lowercased, for keyword scans.
    pub fn text_lower(&self) -> String {
        let mut text = self.header.to_lowercase();
        for line in &self.lines {
            text.push(' ');
            text.push_str(&line.to_lowercase());
        }
        text
    }
}

static TUNNEL_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^interface\s+Tunnel\d").unwrap());
static BRIDGE_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bridge-domain\s+(\d+)").unwrap());
static CONNECTED_ROUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"directly connected, (\S+)").unwrap());
static VIA_ROUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"via \S+, ([A-Za-z][\w/.-]+)\s*$").unwrap());
static ROUTING_TABLE_BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Routing Table:\s*(\S+)").unwrap());
static QOS_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)service-policy\s+(?:input|output)\s+(qos-[\w-]+)").unwrap());

/// Keywords that mark an interface description as circuit related.
/// Carrier names and the site circuit-id conventions used in descriptions.
const CIRCUIT_KEYWORDS: &[&str] = &[
    "ewans",
    "owans",
    "cid#",
    "rcn",
    "crowncastle",
    "comcast",
    "wans",
    "cid",
];

/// Split raw output into `interface` and `policy-map` blocks.
///
/// Output that is an IOS error message (`% Invalid input ...`) yields zero
/// blocks; the caller records a no-data marker via [`no_data_marker`].
pub fn config_blocks(output: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for raw_line in output.lines() {
        let line = raw_line.trim_end_matches('\r');

        if let Some(kind) = header_kind(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(Block::new(kind, line));
        } else if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(block) = current.as_mut() {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    block.lines.push(trimmed.to_string());
                }
            }
        } else {
            // `!` separators, `end`, and anything else at column zero
            // terminate the current block.
            if let Some(block) = current.take() {
                blocks.push(block);
            }
        }
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    blocks
}

/// Classify a column-zero line as a block header.
fn header_kind(line: &str) -> Option<BlockKind> {
    if line.starts_with("interface ") {
        if TUNNEL_HEADER.is_match(line) {
            Some(BlockKind::Tunnel)
        } else if line.split_whitespace().nth(1).is_some_and(|n| n.contains('.')) {
            Some(BlockKind::PrivateSub)
        } else {
            Some(BlockKind::Interface)
        }
    } else if line.starts_with("policy-map ") {
        Some(BlockKind::Qos)
    } else {
        None
    }
}

/// Select circuit-related interface blocks from the full set.
///
/// A block qualifies when it is a tunnel or when its text contains one of
/// the circuit keywords. Qualifying blocks then pull in the `interface BDIn`
/// block for any `bridge-domain n` reference and the `interface Vlann`
/// blocks for trunk-allowed VLANs, so the report keeps a circuit together
/// with its bridged L3 interface.
pub fn select_circuit_blocks(blocks: &[Block]) -> Vec<Block> {
    // Selection tracks block indices, not header text: a literally
    // repeated header in the config is two distinct blocks and both must
    // survive here so duplicate detection can flag them downstream.
    let mut picked: Vec<usize> = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        if block.kind == BlockKind::Qos {
            continue;
        }
        let text = block.text_lower();
        let is_circuit = block.kind == BlockKind::Tunnel
            || CIRCUIT_KEYWORDS.iter().any(|kw| text.contains(kw));
        if is_circuit {
            picked.push(index);
        }
    }

    // Follow bridge-domain and trunk VLAN references from selected blocks
    let mut followed: Vec<usize> = Vec::new();
    for &index in &picked {
        for line in &blocks[index].lines {
            if let Some(caps) = BRIDGE_DOMAIN.captures(line) {
                let header = format!("interface BDI{}", &caps[1]);
                follow_reference(&header, blocks, &picked, &mut followed);
            }
            if line.to_lowercase().contains("switchport trunk allowed vlan") {
                for vlan in line.split(|c: char| !c.is_ascii_digit()) {
                    if vlan.is_empty() {
                        continue;
                    }
                    let header = format!("interface Vlan{vlan}");
                    follow_reference(&header, blocks, &picked, &mut followed);
                }
            }
        }
    }
    picked.extend(followed);

    picked.into_iter().map(|index| blocks[index].clone()).collect()
}

fn follow_reference(header: &str, blocks: &[Block], picked: &[usize], out: &mut Vec<usize>) {
    if picked
        .iter()
        .chain(out.iter())
        .any(|&index| blocks[index].header == header)
    {
        return;
    }
    if let Some(index) = blocks.iter().position(|b| b.header == header) {
        out.push(index);
    }
}

/// QoS policy-map blocks referenced by `service-policy` statements.
pub fn referenced_qos_blocks(blocks: &[Block], output: &str) -> Vec<Block> {
    let mut selected = Vec::new();
    for caps in QOS_REFERENCE.captures_iter(output) {
        let name = &caps[1];
        if let Some(block) = blocks
            .iter()
            .find(|b| b.kind == BlockKind::Qos && b.name().eq_ignore_ascii_case(name))
        {
            if !selected.contains(block) {
                selected.push(block.clone());
            }
        }
    }
    selected
}

/// Extract VRF names from `show vrf` output.
///
/// The first token of each row is the VRF name; the column header row and
/// indented interface continuation rows are skipped.
pub fn vrf_names(output: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.to_lowercase().starts_with("name") {
            continue;
        }
        // Continuation rows carry only an interface name, deeply indented.
        if line.len() - line.trim_start().len() > 10 {
            continue;
        }
        if let Some(first) = trimmed.split_whitespace().next() {
            if !names.contains(&first.to_string()) {
                names.push(first.to_string());
            }
        }
    }
    names
}

/// Split routing-table output into one block per `Routing Table:` banner.
///
/// Output with no banner (the usual single-table case) becomes one block
/// headed by the requested VRF name.
pub fn routing_blocks(vrf: &str, output: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current = Block::new(BlockKind::Vrf, &format!("Routing Table: {vrf}"));

    for raw_line in output.lines() {
        let line = raw_line.trim_end_matches('\r');
        if ROUTING_TABLE_BANNER.is_match(line) {
            if !current.lines.is_empty() {
                blocks.push(current);
            }
            current = Block::new(BlockKind::Vrf, line);
            continue;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            current.lines.push(trimmed.to_string());
        }
    }
    if !current.lines.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Build (interface, vrf) pairs from one `show ip route vrf <name>` output.
///
/// The banner line names the table; connected and via routes name the
/// egress interface. The caller folds the pairs into a per-device index
/// for the tunnel VRF join.
pub fn route_interface_pairs(vrf: &str, output: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for block in routing_blocks(vrf, output) {
        let table = ROUTING_TABLE_BANNER
            .captures(&block.header)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| vrf.to_string());
        for line in &block.lines {
            let interface = CONNECTED_ROUTE
                .captures(line)
                .or_else(|| VIA_ROUTE.captures(line))
                .map(|caps| caps[1].to_string());
            if let Some(interface) = interface {
                let pair = (interface, table.clone());
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
    }
    pairs
}

/// Split `show cdp neighbors detail` output into one block per neighbor.
pub fn cdp_neighbor_blocks(output: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for raw_line in output.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.starts_with("-----") {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match current.as_mut() {
            Some(block) => block.lines.push(trimmed.to_string()),
            None => current = Some(Block::new(BlockKind::CdpNeighbor, trimmed)),
        }
    }
    if let Some(block) = current {
        blocks.push(block);
    }

    // Sections without a Device ID are preamble, not neighbors
    blocks.retain(|b| {
        b.header.starts_with("Device ID:")
            || b.lines.iter().any(|l| l.starts_with("Device ID:"))
    });
    blocks
}

/// Parse `show interface description` into (full interface name, description)
/// pairs. The description column is located from the header line; interface
/// names come back abbreviated (`Tu0`, `Gi0/0/1`) and are expanded so they
/// join against config block names.
pub fn description_table(output: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut desc_col: Option<usize> = None;

    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        let Some(col) = desc_col else {
            if let Some(col) = line.find("Description") {
                if line.contains("Interface") {
                    desc_col = Some(col);
                }
            }
            continue;
        };
        // Rows with multibyte text before the description column can put
        // the column offset off a char boundary; skip those rows.
        let Some(tail) = line.get(col..) else {
            continue;
        };
        let interface = match line.split_whitespace().next() {
            Some(name) => expand_interface_name(name),
            None => continue,
        };
        let description = tail.trim();
        if !description.is_empty() {
            pairs.push((interface, description.to_string()));
        }
    }
    pairs
}

/// Parse `show ip interface brief` into (interface, address) pairs,
/// skipping unassigned interfaces. Names are already unabbreviated here.
pub fn address_table(output: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut seen_header = false;

    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        if !seen_header {
            seen_header = line.contains("Interface") && line.contains("IP-Address");
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(interface), Some(address)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if address.eq_ignore_ascii_case("unassigned") || !address.contains('.') {
            continue;
        }
        pairs.push((interface.to_string(), address.to_string()));
    }
    pairs
}

/// Expand the abbreviated interface names IOS prints in tabular output.
pub fn expand_interface_name(name: &str) -> String {
    const EXPANSIONS: &[(&str, &str)] = &[
        ("TenGigabitEthernet", "TenGigabitEthernet"),
        ("GigabitEthernet", "GigabitEthernet"),
        ("FastEthernet", "FastEthernet"),
        ("Te", "TenGigabitEthernet"),
        ("Gi", "GigabitEthernet"),
        ("Fa", "FastEthernet"),
        ("Tu", "Tunnel"),
        ("Vl", "Vlan"),
        ("Po", "Port-channel"),
        ("Se", "Serial"),
        ("Lo", "Loopback"),
        ("BD", "BDI"),
    ];

    for (prefix, full) in EXPANSIONS {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                return format!("{full}{rest}");
            }
        }
    }
    name.to_string()
}

/// Detect output that is an error message rather than data.
///
/// Returns the marker to record instead of blocks. Empty output counts:
/// a command that printed nothing produced no data either.
pub fn no_data_marker(output: &str) -> Option<String> {
    if let Some(marker) = find_failure(output) {
        return Some(marker.to_string());
    }
    if output.trim().is_empty() {
        return Some("no output".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING_CONFIG: &str = "\
version 17.3
hostname wan-edge-1
!
interface Tunnel0
 description EWANS CID# 4471 WAN-WEST
 vrf forwarding CORP
 ip address 10.20.0.1 255.255.255.252
 tunnel source GigabitEthernet0/0/0
 tunnel destination 203.0.113.5
!
interface GigabitEthernet0/0/0
 description COMCAST 100M fiber CID 88.L1XX.112233
 ip address 198.51.100.2 255.255.255.0
!
interface GigabitEthernet0/0/1
 description LAN uplink
 switchport trunk allowed vlan 10,20
!
interface Vlan10
 description user vlan
!
interface Vlan20
 description voice vlan
!
interface GigabitEthernet0/0/2
 description mgmt only
!
policy-map qos-wan-out
 class voice
  priority percent 30
!
end
";

    #[test]
    fn test_one_block_per_header() {
        let blocks = config_blocks(RUNNING_CONFIG);
        let interfaces: Vec<_> = blocks
            .iter()
            .filter(|b| b.kind != BlockKind::Qos)
            .collect();
        assert_eq!(interfaces.len(), 6);
        assert_eq!(interfaces[0].header, "interface Tunnel0");
        assert_eq!(interfaces[0].kind, BlockKind::Tunnel);
        assert_eq!(interfaces[1].name(), "GigabitEthernet0/0/0");
    }

    #[test]
    fn test_header_with_no_body_is_valid_empty_block() {
        let blocks = config_blocks("interface Loopback0\n!\n");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].lines.is_empty());
    }

    #[test]
    fn test_subinterface_kind() {
        let blocks = config_blocks("interface GigabitEthernet0/0/1.101\n description OWANS23\n");
        assert_eq!(blocks[0].kind, BlockKind::PrivateSub);
    }

    #[test]
    fn test_circuit_selection_keywords_and_tunnels() {
        let blocks = config_blocks(RUNNING_CONFIG);
        let selected = select_circuit_blocks(&blocks);
        let headers: Vec<_> = selected.iter().map(|b| b.header.as_str()).collect();

        // Tunnel by kind, Gi0/0/0 by keyword. The LAN uplink has no
        // keyword, so neither it nor its trunk VLANs are selected.
        assert!(headers.contains(&"interface Tunnel0"));
        assert!(headers.contains(&"interface GigabitEthernet0/0/0"));
        assert!(!headers.contains(&"interface GigabitEthernet0/0/2"));
        assert!(!headers.contains(&"interface Vlan10"));
    }

    #[test]
    fn test_circuit_selection_keeps_repeated_headers() {
        let cfg = "\
interface Tunnel0
 description EWANS primary
!
interface Tunnel0
 description EWANS shadow copy
!
";
        let selected = select_circuit_blocks(&config_blocks(cfg));
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].header, selected[1].header);
        assert_ne!(selected[0].lines, selected[1].lines);
    }

    #[test]
    fn test_trunk_vlan_follow_from_circuit_block() {
        let cfg = "\
interface GigabitEthernet0/1
 description COMCAST handoff
 switchport trunk allowed vlan 30
!
interface Vlan30
 description circuit L3
!
";
        let blocks = config_blocks(cfg);
        let selected = select_circuit_blocks(&blocks);
        let headers: Vec<_> = selected.iter().map(|b| b.header.as_str()).collect();
        assert!(headers.contains(&"interface Vlan30"));
    }

    #[test]
    fn test_bridge_domain_follow() {
        let cfg = "\
interface GigabitEthernet0/2
 description RCN circuit
 service instance 100 ethernet
 bridge-domain 100
!
interface BDI100
 ip address 10.9.9.1 255.255.255.0
!
";
        let blocks = config_blocks(cfg);
        let selected = select_circuit_blocks(&blocks);
        assert!(selected.iter().any(|b| b.header == "interface BDI100"));
    }

    #[test]
    fn test_referenced_qos_blocks() {
        let cfg = "\
interface Tunnel1
 description WANS circuit
 service-policy output qos-wan-out
!
policy-map qos-wan-out
 class voice
!
policy-map qos-unused
 class other
!
";
        let blocks = config_blocks(cfg);
        let qos = referenced_qos_blocks(&blocks, cfg);
        assert_eq!(qos.len(), 1);
        assert_eq!(qos[0].name(), "qos-wan-out");
    }

    #[test]
    fn test_vrf_names() {
        let output = "\
  Name                             Default RD            Protocols   Interfaces
  CORP                             65000:1               ipv4        Tunnel0
  GUEST                            65000:2               ipv4        Gi0/0/1.101
                                                                     Gi0/0/1.102
";
        assert_eq!(vrf_names(output), vec!["CORP", "GUEST"]);
    }

    #[test]
    fn test_route_interface_pairs() {
        let output = "\
Routing Table: SITEB
Codes: L - local, C - connected, S - static

C        10.30.0.0/30 is directly connected, Tunnel3
L        10.30.0.1/32 is directly connected, Tunnel3
S        192.168.50.0/24 [1/0] via 10.30.0.2, Tunnel3
";
        let pairs = route_interface_pairs("SITEB", output);
        assert_eq!(pairs, vec![("Tunnel3".to_string(), "SITEB".to_string())]);
    }

    #[test]
    fn test_routing_blocks_split_on_banner() {
        let output = "\
Routing Table: SITEB
C        10.30.0.0/30 is directly connected, Tunnel3
Routing Table: SITEC
C        10.40.0.0/30 is directly connected, Tunnel4
";
        let blocks = routing_blocks("SITEB", output);
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Vrf));
        assert_eq!(blocks[1].header, "Routing Table: SITEC");

        // No banner at all: one block headed by the requested VRF
        let bare = routing_blocks("CORP", "C   10.1.0.0/30 is directly connected, Tunnel0\n");
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].header, "Routing Table: CORP");
    }

    #[test]
    fn test_cdp_neighbor_blocks() {
        let output = "\
-------------------------
Device ID: core-sw-1.example.net
Entry address(es):
  IP address: 10.0.0.10
Platform: cisco WS-C3850,  Capabilities: Switch IGMP
Interface: GigabitEthernet0/0/2,  Port ID (outgoing port): Gi1/0/4
-------------------------
Device ID: isp-pe-7.provider.net
Entry address(es):
  IP address: 203.0.113.1
Interface: GigabitEthernet0/0/0,  Port ID (outgoing port): xe-0/1/2
";
        let blocks = cdp_neighbor_blocks(output);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].header.contains("core-sw-1"));
        assert!(blocks[1].header.contains("isp-pe-7"));
    }

    #[test]
    fn test_description_table() {
        let output = "\
Interface                      Status         Protocol Description
Tu0                            up             up       EWANS CID# 4471 WAN-WEST
Gi0/0/0                        up             up       COMCAST 100M fiber
Gi0/0/2                        admin down     down
";
        let pairs = description_table(output);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "Tunnel0");
        assert_eq!(pairs[0].1, "EWANS CID# 4471 WAN-WEST");
        assert_eq!(pairs[1].0, "GigabitEthernet0/0/0");
    }

    #[test]
    fn test_description_table_skips_row_with_multibyte_offset() {
        // "ñ" runs put the description column offset mid-character on the
        // second row; it must be skipped, not split
        let output = "\
Interface  Description
Tu0 ñññññ EWANS 10M
Gi0/0/0    COMCAST 100M
";
        let pairs = description_table(output);
        assert_eq!(
            pairs,
            vec![(
                "GigabitEthernet0/0/0".to_string(),
                "COMCAST 100M".to_string()
            )]
        );
    }

    #[test]
    fn test_address_table() {
        let output = "\
Interface                  IP-Address      OK? Method Status                Protocol
GigabitEthernet0/0/0       198.51.100.2    YES NVRAM  up                    up
GigabitEthernet0/0/1       unassigned      YES unset  up                    up
Tunnel0                    10.20.0.1       YES NVRAM  up                    up
";
        let pairs = address_table(output);
        assert_eq!(
            pairs,
            vec![
                (
                    "GigabitEthernet0/0/0".to_string(),
                    "198.51.100.2".to_string()
                ),
                ("Tunnel0".to_string(), "10.20.0.1".to_string()),
            ]
        );
    }

    #[test]
    fn test_expand_interface_name() {
        assert_eq!(expand_interface_name("Tu3"), "Tunnel3");
        assert_eq!(expand_interface_name("Gi0/0/1.101"), "GigabitEthernet0/0/1.101");
        assert_eq!(expand_interface_name("Tunnel3"), "Tunnel3");
        assert_eq!(expand_interface_name("BD100"), "BDI100");
        assert_eq!(expand_interface_name("Ethernet1"), "Ethernet1");
    }

    #[test]
    fn test_error_output_yields_no_data_marker() {
        let output = "show vrrf\n% Invalid input detected at '^' marker.";
        assert_eq!(config_blocks(output).len(), 0);
        assert_eq!(no_data_marker(output).as_deref(), Some("% Invalid input"));
        assert_eq!(no_data_marker(""), Some("no output".to_string()));
        assert_eq!(no_data_marker("interface Tunnel0"), None);
    }
}
