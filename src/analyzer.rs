use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::record::LogRecord;

pub const WINDOW_SECS: i64 = 86_400;
pub const HOUR_SECS: i64 = 3_600;
pub const WINDOW_HOURS: usize = 24;

/// Running counters for one aggregation pass. Exclusively owned by the pass
/// that feeds it; read only after the pass completes.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TrafficStats {
    pub total_requests: u64,
    pub total_data_bytes: u64,
    pub success_count: u64,
    pub client_error_count: u64,
    pub server_error_count: u64,
    pub success_size_sum: u64,
    pub unique_ips: HashSet<String>,
    pub ip_counts: HashMap<String, u64>,
    pub url_counts: HashMap<String, u64>,
    pub method_counts: HashMap<String, u64>,
    pub recent_ip_counts: HashMap<String, u64>,
    pub requests_per_hour: [u64; WINDOW_HOURS],
}

impl TrafficStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one matching record into the counters. Statuses outside
    /// 2xx/4xx/5xx still count toward the totals and breakdowns, just not
    /// toward any success/error bucket. Records at or after the cutoff feed
    /// the recent-IP counts; the histogram additionally requires the record
    /// to fall within the 24 hour buckets starting at the cutoff, so a
    /// record at exactly cutoff + 24h is counted as recent but not bucketed.
    pub fn process(&mut self, rec: &LogRecord, cutoff: Option<i64>) {
        self.total_requests += 1;
        self.total_data_bytes += rec.response_size;
        self.unique_ips.insert(rec.client_ip.clone());
        *self.ip_counts.entry(rec.client_ip.clone()).or_insert(0) += 1;
        *self.url_counts.entry(rec.url.clone()).or_insert(0) += 1;
        *self.method_counts.entry(rec.method.clone()).or_insert(0) += 1;
        match rec.status {
            200..=299 => {
                self.success_count += 1;
                self.success_size_sum += rec.response_size;
            }
            400..=499 => self.client_error_count += 1,
            500..=599 => self.server_error_count += 1,
            _ => {}
        }
        if let Some(cutoff) = cutoff && rec.timestamp >= cutoff {
            let hour_index = (rec.timestamp - cutoff) / HOUR_SECS;
            if (0..WINDOW_HOURS as i64).contains(&hour_index) {
                self.requests_per_hour[hour_index as usize] += 1;
            }
            *self.recent_ip_counts.entry(rec.client_ip.clone()).or_insert(0) += 1;
        }
    }

    pub fn top_ips(&self, n: usize) -> Vec<(String, u64)> {
        top_of(&self.ip_counts, n)
    }

    pub fn top_urls(&self, n: usize) -> Vec<(String, u64)> {
        top_of(&self.url_counts, n)
    }

    pub fn method_distribution(&self) -> Vec<(String, u64)> {
        top_of(&self.method_counts, self.method_counts.len())
    }
}

// Descending by count, ties broken by ascending key so rankings come out
// identical regardless of input order.
fn top_of(counts: &HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut v: Vec<(String, u64)> = counts.iter().map(|(k, c)| (k.clone(), *c)).collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v.truncate(n);
    v
}
