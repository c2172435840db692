//! Proxy module for collecting and validating proxies
//!
//! This module provides functionality for:
//! - Collecting candidate addresses from remote lists and listing pages
//! - Partitioning and deduplicating them by advertised protocol
//! - Probing every candidate concurrently under a bounded worker pool

pub mod aggregator;
pub mod checker;
pub mod crawler;
pub mod models;
pub mod parser;
pub mod probe;
pub mod socks;

pub use aggregator::{Aggregator, CandidateSet, ValidationScope};
pub use checker::{CheckerConfig, ProxyChecker, ValidationReport, DEFAULT_CONCURRENCY};
pub use crawler::{CrawlResult, CrawlerConfig, ProxyCrawler, ProxySource, SourceFormat};
pub use models::{Address, Candidate, ProtocolKind, ValidationResult, ValidationVerdict};
pub use parser::{ParsedList, ProxyParser};
pub use probe::{NetworkProbe, Probe, ProbeError};
