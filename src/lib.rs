//! Proxy Harvest - proxy list aggregator and checker
//!
//! Collects candidate proxies from public lists, partitions them by the
//! protocol each source advertises, and validates them concurrently with a
//! protocol-specific probe.

pub mod proxy;
pub mod report;
pub mod tui;

pub use proxy::*;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use thiserror::Error;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Rejected configuration input
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be a positive integer, got {0:?}")]
    InvalidConcurrency(String),
    #[error("invalid socks target {0:?}, expected host:port")]
    InvalidSocksTarget(String),
}

/// Parse a worker budget; empty input selects the default
pub fn parse_concurrency(s: &str) -> std::result::Result<NonZeroUsize, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(DEFAULT_CONCURRENCY);
    }
    s.parse::<NonZeroUsize>()
        .map_err(|_| ConfigError::InvalidConcurrency(s.to_string()))
}

/// Parse the `host:port` the SOCKS probe connects to
pub fn parse_socks_target(s: &str) -> std::result::Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidSocksTarget(s.to_string());
    let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }
    let port: u16 = port.parse().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

/// Interpret an answer to a yes/no prompt
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the result lists are written to
    pub output_dir: PathBuf,
    /// Origins to collect candidates from
    pub sources: Vec<ProxySource>,
    pub checker: CheckerConfig,
    /// Whether to validate; `None` asks interactively
    pub validate: Option<bool>,
    /// Show the terminal progress view while validating
    pub tui: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            sources: ProxyCrawler::get_common_sources(),
            checker: CheckerConfig::default(),
            validate: None,
            tui: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_concurrency() {
        assert_eq!(parse_concurrency("20").unwrap().get(), 20);
        assert_eq!(parse_concurrency(" 1 ").unwrap().get(), 1);
        assert_eq!(parse_concurrency(""), Ok(DEFAULT_CONCURRENCY));
        assert_eq!(DEFAULT_CONCURRENCY.get(), 150);
    }

    #[test]
    fn test_parse_concurrency_rejects_non_positive() {
        assert_eq!(
            parse_concurrency("0"),
            Err(ConfigError::InvalidConcurrency("0".to_string()))
        );
        assert!(parse_concurrency("-3").is_err());
        assert!(parse_concurrency("many").is_err());
        assert!(parse_concurrency("1.5").is_err());
    }

    #[test]
    fn test_parse_socks_target() {
        assert_eq!(
            parse_socks_target("www.google.com:443"),
            Ok(("www.google.com".to_string(), 443))
        );
        assert_eq!(
            parse_socks_target("[::1]:8080"),
            Ok(("::1".to_string(), 8080))
        );
        assert!(parse_socks_target("example.com").is_err());
        assert!(parse_socks_target(":443").is_err());
        assert!(parse_socks_target("example.com:http").is_err());
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("y"), Some(true));
        assert_eq!(parse_yes_no(" YES\n"), Some(true));
        assert_eq!(parse_yes_no("n"), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
        assert_eq!(parse_yes_no(""), None);
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.sources.len(), 8);
        assert_eq!(config.checker.concurrency, DEFAULT_CONCURRENCY);
        assert!(config.validate.is_none());
        assert!(!config.tui);
    }
}
