//! Writing partitioned proxy lists and printing summaries

use crate::proxy::{Address, CandidateSet, ProtocolKind, ValidationReport};
use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File holding every aggregated address
pub const UNION_FILE: &str = "all.txt";

/// File name of the full partition for `protocol`
pub fn partition_file(protocol: ProtocolKind) -> String {
    format!("{}.txt", protocol)
}

/// File name of the validated partition for `protocol`
pub fn validated_file(protocol: ProtocolKind) -> String {
    format!("valid_{}.txt", protocol)
}

/// Sorted, newline-terminated rendering of an address list
pub fn render_list<'a, I>(addresses: I) -> String
where
    I: IntoIterator<Item = &'a Address>,
{
    let mut addresses: Vec<&Address> = addresses.into_iter().collect();
    addresses.sort();

    let mut out = String::new();
    for address in addresses {
        out.push_str(address.as_str());
        out.push('\n');
    }
    out
}

/// Writes result files into one output directory
#[derive(Debug, Clone)]
pub struct Reporter {
    output_dir: PathBuf,
}

impl Reporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `addresses` sorted, one per line
    pub fn write_list<'a, I>(&self, file_name: &str, addresses: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed to create output directory {}", self.output_dir.display())
        })?;

        let path = self.output_dir.join(file_name);
        fs::write(&path, render_list(addresses))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write the HTTP, SOCKS4, SOCKS5 partitions and the union
    pub fn write_candidates(&self, candidates: &CandidateSet) -> Result<()> {
        for protocol in ProtocolKind::PROBED {
            let partition = candidates.partition(protocol);
            let path = self.write_list(&partition_file(protocol), partition)?;
            info!(path = %path.display(), count = partition.len(), "saved {} proxies", protocol);
        }

        let union = candidates.union();
        let path = self.write_list(UNION_FILE, &union)?;
        info!(path = %path.display(), count = union.len(), "saved all proxies");
        Ok(())
    }

    /// Write the validated partition for every probed protocol
    pub fn write_validated(&self, report: &ValidationReport) -> Result<()> {
        for protocol in ProtocolKind::PROBED {
            let valid = report.valid(protocol);
            let count = valid.len();
            let path = self.write_list(&validated_file(protocol), valid)?;
            info!(path = %path.display(), count, "saved valid {} proxies", protocol);
        }
        Ok(())
    }
}

/// Boxed partition counts printed after collection
pub fn candidate_summary(candidates: &CandidateSet) -> String {
    let http = candidates.partition(ProtocolKind::Http).len();
    let socks4 = candidates.partition(ProtocolKind::Socks4).len();
    let socks5 = candidates.partition(ProtocolKind::Socks5).len();
    let total = candidates.union().len();

    [
        "╭────────────╮".to_string(),
        format!("│ {:<3} HTTP   │", http),
        format!("│ {:<3} SOCKS4 │", socks4),
        format!("│ {:<3} SOCKS5 │", socks5),
        format!("│ {:<3} TOTAL  │", total),
        "╰────────────╯".to_string(),
    ]
    .join("\n")
}

/// Boxed valid counts printed after validation
pub fn validation_summary(report: &ValidationReport) -> String {
    [
        "Valid proxy counts:".to_string(),
        "╭────────────╮".to_string(),
        format!("│ {:<3} HTTP   │", report.valid_count(ProtocolKind::Http)),
        format!("│ {:<3} SOCKS4 │", report.valid_count(ProtocolKind::Socks4)),
        format!("│ {:<3} SOCKS5 │", report.valid_count(ProtocolKind::Socks5)),
        "╰────────────╯".to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{Aggregator, Candidate, ValidationResult};

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn sample_set() -> CandidateSet {
        let mut agg = Aggregator::new();
        agg.extend(vec![
            (addr("3.3.3.3:3128"), ProtocolKind::Http),
            (addr("1.1.1.1:80"), ProtocolKind::Http),
            (addr("1.1.1.1:80"), ProtocolKind::Socks4),
            (addr("5.5.5.5:1080"), ProtocolKind::Socks5),
            (addr("9.9.9.9:1234"), ProtocolKind::Unknown),
        ]);
        agg.finish()
    }

    #[test]
    fn test_file_names() {
        assert_eq!(partition_file(ProtocolKind::Http), "http.txt");
        assert_eq!(partition_file(ProtocolKind::Socks5), "socks5.txt");
        assert_eq!(validated_file(ProtocolKind::Socks4), "valid_socks4.txt");
    }

    #[test]
    fn test_render_list_is_sorted_and_deterministic() {
        let a = vec![addr("9.9.9.9:1"), addr("1.1.1.1:2"), addr("10.0.0.1:3")];
        let b = vec![addr("10.0.0.1:3"), addr("9.9.9.9:1"), addr("1.1.1.1:2")];
        let rendered = render_list(&a);
        assert_eq!(rendered, "1.1.1.1:2\n10.0.0.1:3\n9.9.9.9:1\n");
        assert_eq!(rendered, render_list(&b));
        assert_eq!(render_list(&Vec::<Address>::new()), "");
    }

    #[test]
    fn test_write_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(dir.path().join("out"));
        reporter.write_candidates(&sample_set()).unwrap();

        let read = |name: &str| fs::read_to_string(reporter.output_dir().join(name)).unwrap();
        assert_eq!(read("http.txt"), "1.1.1.1:80\n3.3.3.3:3128\n");
        assert_eq!(read("socks4.txt"), "1.1.1.1:80\n");
        assert_eq!(read("socks5.txt"), "5.5.5.5:1080\n");
        assert_eq!(
            read("all.txt"),
            "1.1.1.1:80\n3.3.3.3:3128\n5.5.5.5:1080\n9.9.9.9:1234\n"
        );
    }

    #[test]
    fn test_write_candidates_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(dir.path());
        reporter.write_candidates(&sample_set()).unwrap();
        let first = fs::read(dir.path().join(UNION_FILE)).unwrap();
        reporter.write_candidates(&sample_set()).unwrap();
        let second = fs::read(dir.path().join(UNION_FILE)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_validated() {
        let mut report = ValidationReport::new();
        report.record(ValidationResult::valid(
            Candidate::new(addr("5.5.5.5:1080"), ProtocolKind::Socks5),
            120,
        ));
        report.record(ValidationResult::invalid(
            Candidate::new(addr("9.9.9.9:1234"), ProtocolKind::Http),
            "connection refused".to_string(),
        ));
        report.record(ValidationResult::valid(
            Candidate::new(addr("3.3.3.3:3128"), ProtocolKind::Http),
            80,
        ));
        report.record(ValidationResult::valid(
            Candidate::new(addr("1.2.3.4:8080"), ProtocolKind::Http),
            95,
        ));
        let report = report.finalize();

        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(dir.path());
        reporter.write_validated(&report).unwrap();

        let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("valid_http.txt"), "1.2.3.4:8080\n3.3.3.3:3128\n");
        assert_eq!(read("valid_socks4.txt"), "");
        assert_eq!(read("valid_socks5.txt"), "5.5.5.5:1080\n");
    }

    #[test]
    fn test_summaries() {
        let summary = candidate_summary(&sample_set());
        assert!(summary.contains("│ 2   HTTP   │"));
        assert!(summary.contains("│ 1   SOCKS4 │"));
        assert!(summary.contains("│ 4   TOTAL  │"));

        let summary = validation_summary(&ValidationReport::new());
        assert!(summary.starts_with("Valid proxy counts:"));
        assert!(summary.contains("│ 0   SOCKS5 │"));
    }
}
