use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::analyzer::TrafficStats;
use crate::filter::FilterConfig;
use crate::record::parse_line;

/// Scan phase: one full pass tracking the maximum timestamp among matching
/// records. Malformed lines are skipped silently here; the aggregate pass
/// owns the per-line warnings so each bad line is reported exactly once.
pub fn find_max_timestamp(path: &Path, filter: &FilterConfig) -> Result<Option<i64>> {
    let f = File::open(path).with_context(|| format!("cannot read file: {}", path.display()))?;
    let mut br = BufReader::new(f);
    let mut line = String::new();
    let mut max_ts: Option<i64> = None;
    loop {
        line.clear();
        let read = br
            .read_line(&mut line)
            .with_context(|| format!("read error in {}", path.display()))?;
        if read == 0 { break; }
        if let Some(rec) = parse_line(&line)
            && filter.matches(&rec)
            && max_ts.is_none_or(|m| rec.timestamp > m)
        {
            max_ts = Some(rec.timestamp);
        }
    }
    Ok(max_ts)
}

/// Aggregate phase: re-streams the file with the cutoff derived from the
/// scan phase, warning once per malformed line (1-based numbering) and
/// folding every matching record into a fresh set of counters.
pub fn aggregate(path: &Path, filter: &FilterConfig, cutoff: i64, progress: bool) -> Result<TrafficStats> {
    let f = File::open(path).with_context(|| format!("cannot read file: {}", path.display()))?;
    let mut br = BufReader::new(f);
    let mut stats = TrafficStats::new();
    let pb = if progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    let mut line = String::new();
    let mut line_no: u64 = 0;
    loop {
        line.clear();
        let read = br
            .read_line(&mut line)
            .with_context(|| format!("read error in {}", path.display()))?;
        if read == 0 { break; }
        line_no += 1;
        if let Some(ref pb) = pb && line_no % 500 == 0 {
            pb.tick();
            pb.set_message(format!("Scanned {} lines", line_no));
        }
        let Some(rec) = parse_line(&line) else {
            log::warn!("invalid format at line {}", line_no);
            continue;
        };
        if filter.matches(&rec) {
            stats.process(&rec, Some(cutoff));
        }
    }
    if let Some(pb) = pb { pb.finish_and_clear(); }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_log(name: &str, content: &str) -> PathBuf {
        let p = std::env::temp_dir().join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn scan_finds_max_matching_timestamp() {
        let p = write_log(
            "logpulse_scan_max.log",
            "1000 10.0.0.1 GET /a 200 500\n\
             3000 10.0.0.2 POST /b 404 100\n\
             2000 10.0.0.3 GET /c 200 50\n",
        );
        let filter = FilterConfig::default();
        assert_eq!(find_max_timestamp(&p, &filter).unwrap(), Some(3000));
        let filter = FilterConfig { method: Some("GET".to_string()), ..Default::default() };
        assert_eq!(find_max_timestamp(&p, &filter).unwrap(), Some(2000));
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn scan_returns_none_when_nothing_matches() {
        let p = write_log("logpulse_scan_none.log", "1000 10.0.0.1 GET /a 200 500\n");
        let filter = FilterConfig { status_range: Some((500, 599)), ..Default::default() };
        assert_eq!(find_max_timestamp(&p, &filter).unwrap(), None);
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn scan_skips_malformed_lines() {
        let p = write_log(
            "logpulse_scan_malformed.log",
            "garbage\n9999 10.0.0.1 GET /a 200\n1000 10.0.0.1 GET /a 200 500\n",
        );
        let filter = FilterConfig::default();
        assert_eq!(find_max_timestamp(&p, &filter).unwrap(), Some(1000));
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn missing_file_is_an_error() {
        let p = std::env::temp_dir().join("logpulse_does_not_exist.log");
        let filter = FilterConfig::default();
        assert!(find_max_timestamp(&p, &filter).is_err());
        assert!(aggregate(&p, &filter, 0, false).is_err());
    }

    #[test]
    fn aggregate_counts_single_record_scenario() {
        let p = write_log("logpulse_agg_single.log", "1000 10.0.0.1 GET /a 200 500\n");
        let filter = FilterConfig::default();
        let max_ts = find_max_timestamp(&p, &filter).unwrap().unwrap();
        let cutoff = max_ts - crate::analyzer::WINDOW_SECS;
        let stats = aggregate(&p, &filter, cutoff, false).unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.unique_ips.len(), 1);
        assert_eq!(stats.total_data_bytes, 500);
        assert_eq!(stats.recent_ip_counts.len(), 1);
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn aggregate_skips_malformed_without_touching_counters() {
        let p = write_log(
            "logpulse_agg_malformed.log",
            "1000 10.0.0.1 GET /a 200 500\n\
             1001 10.0.0.2 GET /b 200\n\
             not-a-timestamp 10.0.0.3 GET /c 200 10\n\
             1002 10.0.0.4 POST /d 404 20\n",
        );
        let filter = FilterConfig::default();
        let stats = aggregate(&p, &filter, 1002 - crate::analyzer::WINDOW_SECS, false).unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.unique_ips.len(), 2);
        assert!(!stats.ip_counts.contains_key("10.0.0.2"));
        assert!(!stats.ip_counts.contains_key("10.0.0.3"));
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn aggregate_applies_filters_silently() {
        let p = write_log(
            "logpulse_agg_filtered.log",
            "1000 10.0.0.1 GET /a 200 500\n2000 10.0.0.2 POST /b 404 100\n",
        );
        let filter = FilterConfig { method: Some("POST".to_string()), ..Default::default() };
        let stats = aggregate(&p, &filter, 2000 - crate::analyzer::WINDOW_SECS, false).unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.client_error_count, 1);
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn two_passes_over_same_input_agree() {
        let content = "1000 10.0.0.1 GET /a 200 500\n2000 10.0.0.2 POST /b 404 100\n";
        let p1 = write_log("logpulse_agg_repeat1.log", content);
        let filter = FilterConfig::default();
        let cutoff = 2000 - crate::analyzer::WINDOW_SECS;
        let a = aggregate(&p1, &filter, cutoff, false).unwrap();
        let b = aggregate(&p1, &filter, cutoff, false).unwrap();
        assert_eq!(a.total_requests, b.total_requests);
        assert_eq!(a.ip_counts, b.ip_counts);
        assert_eq!(a.requests_per_hour, b.requests_per_hour);
        let _ = std::fs::remove_file(&p1);
    }
}
