//! Merging collector output into protocol partitions

use crate::proxy::crawler::CrawlResult;
use crate::proxy::models::{Address, Candidate, ProtocolKind};
use crate::proxy::parser::ProxyParser;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Which candidates a validation batch is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationScope {
    /// Every union address once, probed with its resolved protocol
    #[default]
    Union,
    /// Every labeled `(address, protocol)` pair, plus unlabeled addresses as HTTP
    Partitions,
}

impl fmt::Display for ValidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationScope::Union => write!(f, "union"),
            ValidationScope::Partitions => write!(f, "partitions"),
        }
    }
}

impl FromStr for ValidationScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "union" => Ok(ValidationScope::Union),
            "partitions" => Ok(ValidationScope::Partitions),
            _ => Err(format!("Invalid scope: {}. Use: union, partitions", s)),
        }
    }
}

/// Deduplicated, protocol-partitioned candidate addresses
///
/// Only built through [`Aggregator`]; once finished it is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateSet {
    http: BTreeSet<Address>,
    socks4: BTreeSet<Address>,
    socks5: BTreeSet<Address>,
    unknown: BTreeSet<Address>,
}

impl CandidateSet {
    /// Addresses declared under `protocol`, in lexicographic order
    pub fn partition(&self, protocol: ProtocolKind) -> &BTreeSet<Address> {
        match protocol {
            ProtocolKind::Http => &self.http,
            ProtocolKind::Socks4 => &self.socks4,
            ProtocolKind::Socks5 => &self.socks5,
            ProtocolKind::Unknown => &self.unknown,
        }
    }

    /// Set union of every partition
    pub fn union(&self) -> BTreeSet<Address> {
        self.http
            .iter()
            .chain(&self.socks4)
            .chain(&self.socks5)
            .chain(&self.unknown)
            .cloned()
            .collect()
    }

    /// Sum of partition sizes, counting an address once per partition it is in
    pub fn total_reports(&self) -> usize {
        self.http.len() + self.socks4.len() + self.socks5.len() + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_reports() == 0
    }

    /// Protocol to probe an address with
    ///
    /// Partitions are checked in the order HTTP, SOCKS4, SOCKS5. Addresses in
    /// none of them (unknown-only or never reported) fall back to HTTP.
    pub fn resolve(&self, address: &Address) -> ProtocolKind {
        ProtocolKind::PROBED
            .into_iter()
            .find(|protocol| self.partition(*protocol).contains(address))
            .unwrap_or(ProtocolKind::Http)
    }

    /// Materialize the validation batch for `scope`
    pub fn plan(&self, scope: ValidationScope) -> Vec<Candidate> {
        match scope {
            ValidationScope::Union => self
                .union()
                .into_iter()
                .map(|address| {
                    let protocol = self.resolve(&address);
                    Candidate::new(address, protocol)
                })
                .collect(),
            ValidationScope::Partitions => {
                let mut batch: Vec<Candidate> = ProtocolKind::PROBED
                    .into_iter()
                    .flat_map(|protocol| {
                        self.partition(protocol)
                            .iter()
                            .map(move |address| Candidate::new(address.clone(), protocol))
                    })
                    .collect();
                batch.extend(
                    self.unknown
                        .iter()
                        .filter(|address| !self.is_labeled(address))
                        .map(|address| Candidate::new(address.clone(), ProtocolKind::Http)),
                );
                batch
            }
        }
    }

    fn is_labeled(&self, address: &Address) -> bool {
        ProtocolKind::PROBED
            .into_iter()
            .any(|protocol| self.partition(protocol).contains(address))
    }
}

/// Builds a [`CandidateSet`] from collector output
#[derive(Debug, Default)]
pub struct Aggregator {
    set: CandidateSet,
    dropped_lines: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one reported address; returns false if it was already in that partition
    pub fn insert(&mut self, address: Address, protocol: ProtocolKind) -> bool {
        let partition = match protocol {
            ProtocolKind::Http => &mut self.set.http,
            ProtocolKind::Socks4 => &mut self.set.socks4,
            ProtocolKind::Socks5 => &mut self.set.socks5,
            ProtocolKind::Unknown => &mut self.set.unknown,
        };
        partition.insert(address)
    }

    /// Add a raw list line; lines without a host/port separator are dropped
    pub fn ingest_line(&mut self, line: &str, protocol: ProtocolKind) -> bool {
        if ProxyParser::is_ignorable(line) {
            return false;
        }
        match ProxyParser::parse_line(line) {
            Some(address) => self.insert(address, protocol),
            None => {
                self.dropped_lines += 1;
                false
            }
        }
    }

    pub fn extend<I>(&mut self, reports: I)
    where
        I: IntoIterator<Item = (Address, ProtocolKind)>,
    {
        for (address, protocol) in reports {
            self.insert(address, protocol);
        }
    }

    /// Merge the addresses of one crawled source; failed sources add nothing
    pub fn ingest(&mut self, result: CrawlResult) {
        self.dropped_lines += result.dropped_lines;
        let protocol = result.protocol;
        self.extend(result.addresses.into_iter().map(|a| (a, protocol)));
    }

    /// Number of malformed lines rejected so far, by `ingest_line` or at collection
    pub fn dropped_lines(&self) -> usize {
        self.dropped_lines
    }

    /// Freeze the aggregated candidates
    pub fn finish(self) -> CandidateSet {
        self.set
    }
}
