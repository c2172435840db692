//! Source collector for fetching candidate proxies
//!
//! This module provides functionality for:
//! - Describing proxy origins (raw lists, HTML listing pages, local files)
//! - Fetching each origin and extracting `host:port` entries
//! - Reporting per-origin failures without aborting the run

use crate::proxy::models::{Address, ProtocolKind};
use crate::proxy::parser::{ParsedList, ProxyParser};
use crate::Result;
use anyhow::{anyhow, Context};
use reqwest::Client;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// How the content of an origin is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    /// One `host:port` per line
    #[default]
    PlainList,
    /// HTML page listing IP and port in adjacent table cells
    HtmlTable,
}

/// Proxy source representing one origin of candidate addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySource {
    /// Name of the proxy source
    pub name: String,
    /// URL or local path to read proxies from
    pub location: String,
    /// Protocol every address from this source is declared as
    pub protocol: ProtocolKind,
    pub format: SourceFormat,
}

impl ProxySource {
    pub fn new(name: &str, location: &str, protocol: ProtocolKind) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            protocol,
            format: SourceFormat::PlainList,
        }
    }

    pub fn html(mut self) -> Self {
        self.format = SourceFormat::HtmlTable;
        self
    }

    pub fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    /// Parse one line of a sources file: `<protocol> <location> [html]`
    ///
    /// Returns `Ok(None)` for blank lines and comments.
    pub fn parse_source_line(line: &str) -> Result<Option<Self>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let mut fields = trimmed.split_whitespace();
        let protocol: ProtocolKind = fields
            .next()
            .ok_or_else(|| anyhow!("empty source line"))?
            .parse()
            .map_err(|e: String| anyhow!(e))?;
        let location = fields
            .next()
            .ok_or_else(|| anyhow!("missing location in source line: {}", trimmed))?;

        let mut source = ProxySource::new(Self::display_name(location), location, protocol);
        match fields.next() {
            None => {}
            Some(flag) if flag.eq_ignore_ascii_case("html") => source = source.html(),
            Some(other) => return Err(anyhow!("unknown source format: {}", other)),
        }
        if let Some(extra) = fields.next() {
            return Err(anyhow!("unexpected trailing field in source line: {}", extra));
        }

        Ok(Some(source))
    }

    /// Load a sources file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read sources file {}", path.display()))?;

        let mut sources = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let source = Self::parse_source_line(line)
                .with_context(|| format!("{}:{}", path.display(), idx + 1))?;
            sources.extend(source);
        }
        Ok(sources)
    }

    fn display_name(location: &str) -> &str {
        location
            .split_once("://")
            .map_or(location, |(_, rest)| rest.split('/').next().unwrap_or(rest))
    }
}

impl fmt::Display for ProxySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.protocol)
    }
}

/// Result of collecting a single source
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// The source that was crawled
    pub source: String,
    /// Protocol declared by the source
    pub protocol: ProtocolKind,
    /// Addresses extracted from the source
    pub addresses: Vec<Address>,
    /// Non-empty lines that held no usable address
    pub dropped_lines: usize,
    /// Error message if crawling failed
    pub error: Option<String>,
}

impl CrawlResult {
    /// Create a successful crawl result
    pub fn success(source: String, protocol: ProtocolKind, addresses: Vec<Address>) -> Self {
        Self {
            source,
            protocol,
            addresses,
            dropped_lines: 0,
            error: None,
        }
    }

    pub fn with_dropped_lines(mut self, dropped_lines: usize) -> Self {
        self.dropped_lines = dropped_lines;
        self
    }

    /// Create a failed crawl result
    pub fn failure(source: String, protocol: ProtocolKind, error: String) -> Self {
        Self {
            source,
            protocol,
            addresses: Vec::new(),
            dropped_lines: 0,
            error: Some(error),
        }
    }

    /// Check if the crawl was successful
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for proxy crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Proxy crawler for fetching candidates from their origins
pub struct ProxyCrawler {
    client: Client,
}

impl ProxyCrawler {
    /// Create a new proxy crawler with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    /// Create a new proxy crawler with custom configuration
    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch and parse addresses from one source
    pub async fn crawl_source(&self, source: &ProxySource) -> Result<ParsedList> {
        let content = if source.is_remote() {
            let response = self.client.get(&source.location).send().await?;
            response.error_for_status()?.text().await?
        } else {
            tokio::fs::read_to_string(&source.location)
                .await
                .with_context(|| format!("failed to read {}", source.location))?
        };

        Ok(Self::parse_content(&content, source.format))
    }

    /// Fetch every source in order, turning failures into empty results
    pub async fn crawl_sources_with_results(&self, sources: &[ProxySource]) -> Vec<CrawlResult> {
        let mut results = Vec::with_capacity(sources.len());

        for source in sources {
            let result = match self.crawl_source(source).await {
                Ok(parsed) => {
                    info!(
                        source = %source.name,
                        protocol = %source.protocol,
                        count = parsed.addresses.len(),
                        dropped = parsed.dropped_lines,
                        "collected proxies"
                    );
                    CrawlResult::success(source.name.clone(), source.protocol, parsed.addresses)
                        .with_dropped_lines(parsed.dropped_lines)
                }
                Err(e) => {
                    warn!(source = %source.name, error = %e, "failed to collect proxies");
                    CrawlResult::failure(source.name.clone(), source.protocol, format!("{:#}", e))
                }
            };
            results.push(result);
        }

        results
    }

    /// Extract addresses according to the source format
    ///
    /// Only plain lists report dropped lines; a page is mostly markup.
    pub fn parse_content(content: &str, format: SourceFormat) -> ParsedList {
        let parsed = match format {
            SourceFormat::PlainList => ProxyParser::parse_list(content),
            SourceFormat::HtmlTable => ParsedList {
                addresses: ProxyParser::parse_html(content),
                dropped_lines: 0,
            },
        };
        debug!(
            ?format,
            count = parsed.addresses.len(),
            dropped = parsed.dropped_lines,
            "parsed source content"
        );
        parsed
    }

    /// Origins used when no sources file is given
    pub fn get_common_sources() -> Vec<ProxySource> {
        vec![
            ProxySource::new(
                "TheSpeedX/http",
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt",
                ProtocolKind::Http,
            ),
            ProxySource::new(
                "monosans/http",
                "https://raw.githubusercontent.com/monosans/proxy-list/master/proxies/http.txt",
                ProtocolKind::Http,
            ),
            ProxySource::new(
                "TheSpeedX/socks4",
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks4.txt",
                ProtocolKind::Socks4,
            ),
            ProxySource::new(
                "monosans/socks4",
                "https://raw.githubusercontent.com/monosans/proxy-list/master/proxies/socks4.txt",
                ProtocolKind::Socks4,
            ),
            ProxySource::new(
                "TheSpeedX/socks5",
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/socks5.txt",
                ProtocolKind::Socks5,
            ),
            ProxySource::new(
                "monosans/socks5",
                "https://raw.githubusercontent.com/monosans/proxy-list/master/proxies/socks5.txt",
                ProtocolKind::Socks5,
            ),
            ProxySource::new("sslproxies.org", "https://www.sslproxies.org/", ProtocolKind::Http)
                .html(),
            ProxySource::new(
                "free-proxy-list.net",
                "https://free-proxy-list.net/",
                ProtocolKind::Http,
            )
            .html(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawler_config_default() {
        let config = CrawlerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_crawler_config_builder() {
        let config = CrawlerConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("Custom Agent".to_string());

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, "Custom Agent");
    }

    #[test]
    fn test_proxy_source_creation() {
        let source = ProxySource::new(
            "test-source",
            "https://example.com/proxies.txt",
            ProtocolKind::Socks5,
        );
        assert_eq!(source.name, "test-source");
        assert_eq!(source.protocol, ProtocolKind::Socks5);
        assert_eq!(source.format, SourceFormat::PlainList);
        assert!(source.is_remote());
        assert_eq!(source.html().format, SourceFormat::HtmlTable);
    }

    #[test]
    fn test_parse_source_line() {
        let source = ProxySource::parse_source_line("socks4 https://example.com/s4.txt")
            .unwrap()
            .unwrap();
        assert_eq!(source.protocol, ProtocolKind::Socks4);
        assert_eq!(source.location, "https://example.com/s4.txt");
        assert_eq!(source.name, "example.com");
        assert_eq!(source.format, SourceFormat::PlainList);

        let source = ProxySource::parse_source_line("unknown ./local.html HTML")
            .unwrap()
            .unwrap();
        assert_eq!(source.protocol, ProtocolKind::Unknown);
        assert_eq!(source.format, SourceFormat::HtmlTable);
        assert!(!source.is_remote());

        assert!(ProxySource::parse_source_line("   ").unwrap().is_none());
        assert!(ProxySource::parse_source_line("# comment").unwrap().is_none());
        assert!(ProxySource::parse_source_line("ftp https://x").is_err());
        assert!(ProxySource::parse_source_line("http").is_err());
        assert!(ProxySource::parse_source_line("http https://x json").is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.txt");
        fs::write(
            &path,
            "# origins\nhttp https://a.example/list.txt\n\nsocks5 /tmp/s5.txt\n",
        )
        .unwrap();
        let sources = ProxySource::load_file(&path).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].protocol, ProtocolKind::Socks5);

        fs::write(&path, "http https://a.example\nbogus line\n").unwrap();
        let err = ProxySource::load_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains(":2"));
    }

    #[test]
    fn test_crawl_result_success() {
        let addresses = vec![
            Address::parse("192.168.1.1:8080").unwrap(),
            Address::parse("192.168.1.2:3128").unwrap(),
        ];
        let result =
            CrawlResult::success("test-source".to_string(), ProtocolKind::Http, addresses);
        assert!(result.is_success());
        assert_eq!(result.source, "test-source");
        assert_eq!(result.addresses.len(), 2);
    }

    #[test]
    fn test_crawl_result_failure() {
        let result = CrawlResult::failure(
            "test-source".to_string(),
            ProtocolKind::Socks4,
            "Connection failed".to_string(),
        );
        assert!(!result.is_success());
        assert!(result.addresses.is_empty());
        assert_eq!(result.error, Some("Connection failed".to_string()));
    }

    #[tokio::test]
    async fn test_crawl_local_and_missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("socks5.txt");
        fs::write(&list, "5.5.5.5:1080\nbroken\n6.6.6.6:1080\n").unwrap();
        let missing = dir.path().join("missing.txt");

        let sources = vec![
            ProxySource::new("missing", &missing.to_string_lossy(), ProtocolKind::Http),
            ProxySource::new("local", &list.to_string_lossy(), ProtocolKind::Socks5),
        ];

        let crawler = ProxyCrawler::new().unwrap();
        let results = crawler.crawl_sources_with_results(&sources).await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].is_success());
        assert!(results[0].addresses.is_empty());
        assert!(results[1].is_success());
        assert_eq!(results[1].protocol, ProtocolKind::Socks5);
        assert_eq!(results[1].addresses.len(), 2);
        assert_eq!(results[1].dropped_lines, 1);
    }

    #[test]
    fn test_parse_content_by_format() {
        let parsed = ProxyCrawler::parse_content("1.1.1.1:80\nnope\n", SourceFormat::PlainList);
        assert_eq!(parsed.addresses.len(), 1);
        assert_eq!(parsed.dropped_lines, 1);

        let page = "<html><td>1.1.1.1</td><td>80</td>\n<p>nope</p></html>";
        let parsed = ProxyCrawler::parse_content(page, SourceFormat::HtmlTable);
        assert_eq!(parsed.addresses.len(), 1);
        assert_eq!(parsed.dropped_lines, 0);
    }

    #[test]
    fn test_get_common_sources() {
        let sources = ProxyCrawler::get_common_sources();
        assert_eq!(sources.len(), 8);
        for protocol in ProtocolKind::PROBED {
            assert!(sources.iter().any(|s| s.protocol == protocol));
        }
        for source in &sources {
            assert!(!source.name.is_empty());
            assert!(source.is_remote());
        }
    }
}
