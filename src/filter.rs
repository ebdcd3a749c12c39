use anyhow::{Result, bail};
use regex::Regex;

use crate::record::LogRecord;

pub const ALLOWED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Filter criteria built once from the CLI and shared read-only by the two
/// scan passes and the report formatter. Absent bounds are None; zero is a
/// valid configured value everywhere an integer is accepted.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    pub method: Option<String>,
    pub status_range: Option<(i64, i64)>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub url_pattern: Option<Regex>,
    pub top_n: usize,
    pub top_urls: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            method: None,
            status_range: None,
            start: None,
            end: None,
            url_pattern: None,
            top_n: 3,
            top_urls: 5,
        }
    }
}

impl FilterConfig {
    /// Pure predicate: does this record satisfy every configured constraint?
    /// Checks short-circuit in order; unconfigured constraints always pass.
    pub fn matches(&self, rec: &LogRecord) -> bool {
        if let Some(m) = self.method.as_ref() && rec.method != *m { return false; }
        if let Some((low, high)) = self.status_range && !(low <= rec.status && rec.status <= high) { return false; }
        if let Some(start) = self.start && rec.timestamp < start { return false; }
        if let Some(end) = self.end && rec.timestamp > end { return false; }
        if let Some(re) = self.url_pattern.as_ref() && !re.is_match(&rec.url) { return false; }
        true
    }
}

/// Uppercases and validates a method filter against the allowed set.
pub fn normalize_method(s: &str) -> Result<String> {
    let up = s.to_uppercase();
    if ALLOWED_METHODS.contains(&up.as_str()) { Ok(up) } else { bail!("unsupported HTTP method: {}", up) }
}

/// Parses `--status` syntax: a single code ("404") or an inclusive range
/// ("400-499") with low <= high.
pub fn parse_status_filter(s: &str) -> Result<(i64, i64)> {
    if let Some((lo, hi)) = s.split_once('-') {
        let (Ok(low), Ok(high)) = (lo.parse::<i64>(), hi.parse::<i64>()) else {
            bail!("invalid --status range (use 400-499)")
        };
        if low > high { bail!("invalid --status range (use 400-499)"); }
        Ok((low, high))
    } else {
        match s.parse::<i64>() {
            Ok(code) => Ok((code, code)),
            Err(_) => bail!("invalid --status value"),
        }
    }
}
