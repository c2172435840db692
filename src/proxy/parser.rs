//! Extraction of proxy addresses from plain lists and HTML pages

use crate::proxy::models::Address;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Optional scheme prefix some lists put in front of `host:port`
static SCHEME_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i:https?|socks[45]h?)://").expect("Invalid scheme regex"));

/// Table rows of the form `<td>IP</td><td>PORT</td>`
static TABLE_ROW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<td>\s*(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\s*</td>\s*<td>\s*(\d{1,5})\s*</td>")
        .expect("Invalid table row regex")
});

/// Bare IP:PORT tokens anywhere in the text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b")
        .expect("Invalid IP:PORT regex")
});

/// Addresses extracted from one list, with the lines that were rejected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedList {
    pub addresses: Vec<Address>,
    /// Non-empty, non-comment lines without a usable `host:port`
    pub dropped_lines: usize,
}

/// Proxy parser for raw list and HTML content
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single list line
    ///
    /// Supports `host:port` and `scheme://host:port`. Empty lines, comments
    /// and lines without a host/port separator yield `None`.
    pub fn parse_line(line: &str) -> Option<Address> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let line = SCHEME_PREFIX_REGEX.replace(line, "");
        Address::parse(line.trim_end_matches('/'))
    }

    /// Blank lines and `#` comments carry no address and are not errors
    pub fn is_ignorable(line: &str) -> bool {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    }

    /// Parse a list, counting the malformed lines that were skipped
    pub fn parse_list(content: &str) -> ParsedList {
        let mut parsed = ParsedList::default();
        for line in content.lines() {
            if Self::is_ignorable(line) {
                continue;
            }
            match Self::parse_line(line) {
                Some(address) => parsed.addresses.push(address),
                None => parsed.dropped_lines += 1,
            }
        }
        parsed
    }

    /// Parse addresses from a string (multiple lines)
    pub fn parse_string(content: &str) -> Vec<Address> {
        Self::parse_list(content).addresses
    }

    /// Parse addresses from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<Address>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_string(&content))
    }

    /// Parse addresses out of a proxy listing page
    ///
    /// Table rows are preferred; pages without a recognizable table are
    /// scanned for bare `ip:port` tokens instead.
    pub fn parse_html(content: &str) -> Vec<Address> {
        let rows: Vec<Address> = TABLE_ROW_REGEX
            .captures_iter(content)
            .filter_map(|cap| Self::checked_address(cap.get(1)?.as_str(), cap.get(2)?.as_str()))
            .collect();

        if !rows.is_empty() {
            return rows;
        }

        IP_PORT_REGEX
            .captures_iter(content)
            .filter_map(|cap| Self::checked_address(cap.get(1)?.as_str(), cap.get(2)?.as_str()))
            .collect()
    }

    /// Build an address from regex captures, rejecting impossible octets and port 0
    fn checked_address(host: &str, port: &str) -> Option<Address> {
        for part in host.split('.') {
            let num: u32 = part.parse().ok()?;
            if num > 255 {
                return None;
            }
        }

        // range check only, the address keeps the port text as written
        let number: u16 = port.parse().ok()?;
        if number == 0 {
            return None;
        }

        Address::parse(&format!("{}:{}", host, port))
    }
}
