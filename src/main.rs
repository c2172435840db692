use anyhow::{Context, Result};
use clap::Parser;
use proxy_harvest::{
    parse_concurrency, parse_socks_target, parse_yes_no,
    report::{self, Reporter},
    tui::ProxyCheckerApp,
    Aggregator, CandidateSet, CheckerConfig, Config, ProxyChecker, ProxyCrawler, ProxySource,
    ValidationReport, ValidationScope, DEFAULT_CONCURRENCY,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Collect free proxies from public lists and validate them concurrently
#[derive(Parser)]
#[command(name = "proxy-harvest")]
#[command(about = "Collect free proxies from public lists and validate them concurrently")]
struct Cli {
    /// Number of concurrent checks; asks when omitted on a terminal
    #[arg(short = 'n', long, value_parser = parse_concurrency)]
    concurrency: Option<NonZeroUsize>,

    /// Validate the collected proxies (yes/no); asks when omitted
    #[arg(long, value_parser = parse_validate_flag)]
    validate: Option<bool>,

    /// Timeout in seconds for each probe
    #[arg(long, default_value = "7")]
    timeout: u64,

    /// URL to test HTTP proxies against
    #[arg(long, default_value = "http://httpbin.org/ip")]
    test_url: String,

    /// host:port SOCKS proxies are asked to connect to
    #[arg(long, default_value = "www.google.com:443", value_parser = parse_socks_target)]
    socks_target: (String, u16),

    /// Which candidates to validate (union, partitions)
    #[arg(long, default_value = "union")]
    scope: ValidationScope,

    /// File listing proxy sources, one `<protocol> <url-or-path> [html]` per line
    #[arg(short, long)]
    sources: Option<PathBuf>,

    /// Directory to write the proxy lists to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Show the terminal progress view while validating
    #[arg(long)]
    tui: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let concurrency = match self.concurrency {
            Some(concurrency) => concurrency,
            None if io::stdin().is_terminal() => ask_concurrency()?,
            None => DEFAULT_CONCURRENCY,
        };

        let sources = match &self.sources {
            Some(path) => ProxySource::load_file(path)?,
            None => ProxyCrawler::get_common_sources(),
        };

        let (socks_host, socks_port) = self.socks_target;
        let checker = CheckerConfig::new()
            .with_concurrency(concurrency)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_test_url(self.test_url)
            .with_socks_target(socks_host, socks_port)
            .with_scope(self.scope);

        Ok(Config {
            output_dir: self.output_dir,
            sources,
            checker,
            validate: self.validate,
            tui: self.tui,
        })
    }
}

fn parse_validate_flag(s: &str) -> std::result::Result<bool, String> {
    parse_yes_no(s).ok_or_else(|| format!("expected yes or no, got {:?}", s))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_answer(question: &str) -> Result<Option<String>> {
    print!("{} ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        // stdin closed
        return Ok(None);
    }
    Ok(Some(answer))
}

/// Ask for the worker budget until a positive integer or nothing is entered
fn ask_concurrency() -> Result<NonZeroUsize> {
    loop {
        let Some(answer) = read_answer("ccw amount (default 150):")? else {
            return Ok(DEFAULT_CONCURRENCY);
        };
        match parse_concurrency(&answer) {
            Ok(concurrency) => return Ok(concurrency),
            Err(_) => println!("Please enter a valid positive integer or press Enter for default."),
        }
    }
}

/// Ask until the answer is recognizably yes or no
fn confirm(question: &str) -> Result<bool> {
    loop {
        let Some(answer) = read_answer(question)? else {
            return Ok(false);
        };
        if let Some(answer) = parse_yes_no(&answer) {
            return Ok(answer);
        }
        println!("Please answer y or n.");
    }
}

async fn collect(config: &Config) -> Result<CandidateSet> {
    let crawler = ProxyCrawler::new()?;
    let results = crawler.crawl_sources_with_results(&config.sources).await;

    let mut aggregator = Aggregator::new();
    for result in results {
        aggregator.ingest(result);
    }
    if aggregator.dropped_lines() > 0 {
        warn!(count = aggregator.dropped_lines(), "dropped malformed lines");
    }
    Ok(aggregator.finish())
}

async fn validate(config: &Config, candidates: &CandidateSet) -> Result<ValidationReport> {
    let checker = ProxyChecker::with_config(config.checker.clone());
    let batch = candidates.plan(config.checker.scope);
    let total = batch.len();

    info!(
        total,
        concurrency = config.checker.concurrency.get(),
        scope = %config.checker.scope,
        "checking proxies"
    );

    if config.tui {
        let rx = checker.check_stream(batch);
        return ProxyCheckerApp::new(rx, total).run().await;
    }

    let step = (total / 10).max(1);
    let mut checked = 0;
    let report = checker
        .check_candidates_with(batch, |_| {
            checked += 1;
            if checked % step == 0 || checked == total {
                info!(checked, total, "progress {}%", checked * 100 / total);
            }
        })
        .await;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = cli.into_config()?;
    let reporter = Reporter::new(&config.output_dir);

    info!(sources = config.sources.len(), "collecting proxies");
    let candidates = collect(&config).await?;
    reporter
        .write_candidates(&candidates)
        .context("failed to save collected proxies")?;
    println!("{}", report::candidate_summary(&candidates));

    let run_validation = match config.validate {
        Some(answer) => answer,
        None => confirm("Check proxies now? (y/n)")?,
    };
    if !run_validation {
        println!("Exiting...");
        return Ok(());
    }

    let report = validate(&config, &candidates).await?;
    reporter
        .write_validated(&report)
        .context("failed to save valid proxies")?;
    println!("{}", report::validation_summary(&report));

    Ok(())
}
