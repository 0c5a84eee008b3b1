//! Well-known ports table used for the convenience scan and for labeling

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Curated port/service pairs, ascending by port
pub const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (20, "FTP-data"),
    (21, "FTP-control"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (8080, "HTTP-Alt"),
];

static SERVICE_TABLE: Lazy<BTreeMap<u16, &'static str>> =
    Lazy::new(|| WELL_KNOWN_PORTS.iter().copied().collect());

/// Service label for a port, `None` when the table has no entry
pub fn service_hint(port: u16) -> Option<&'static str> {
    SERVICE_TABLE.get(&port).copied()
}

/// Ports of the curated table in ascending order
pub fn well_known_ports() -> Vec<u16> {
    SERVICE_TABLE.keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_and_distinct() {
        let ports: Vec<u16> = WELL_KNOWN_PORTS.iter().map(|(p, _)| *p).collect();
        let mut sorted = ports.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ports, sorted);
        assert_eq!(well_known_ports().len(), 15);
    }

    #[test]
    fn test_service_hint_lookup() {
        assert_eq!(service_hint(80), Some("HTTP"));
        assert_eq!(service_hint(3389), Some("RDP"));
        assert_eq!(service_hint(8080), Some("HTTP-Alt"));
        assert_eq!(service_hint(81), None);
        assert_eq!(service_hint(65535), None);
    }
}
