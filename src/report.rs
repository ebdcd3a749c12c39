use chrono::DateTime;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

use crate::analyzer::{HOUR_SECS, TrafficStats, WINDOW_HOURS};
use crate::filter::FilterConfig;

/// Binary-scaled byte rendering, two decimals; TB is the terminal unit.
pub fn human_readable_bytes(num: u64) -> String {
    let mut v = num as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if v < 1024.0 { return format!("{:.2} {}", v, unit); }
        v /= 1024.0;
    }
    format!("{:.2} TB", v)
}

fn hour_label(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H:00Z").to_string(),
        None => ts.to_string(),
    }
}

fn avg_success_size(stats: &TrafficStats) -> f64 {
    if stats.success_count > 0 { stats.success_size_sum as f64 / stats.success_count as f64 } else { 0.0 }
}

fn time_range_line(filter: &FilterConfig) -> String {
    if filter.start.is_none() && filter.end.is_none() {
        "- Time range: all time".to_string()
    } else {
        let start_s = filter.start.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string());
        let end_s = filter.end.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string());
        format!("- Time range: {} - {}", start_s, end_s)
    }
}

fn status_filter_line(filter: &FilterConfig) -> String {
    match filter.status_range {
        Some((low, high)) if low == high => format!("- Status filter: {}", low),
        Some((low, high)) => format!("- Status filter: {}-{}", low, high),
        None => "- Status filter: all statuses".to_string(),
    }
}

/// Renders the fixed-format text report. Pure function of the final counters,
/// the filter echo, and the recency cutoff.
pub fn render_text(stats: &TrafficStats, filter: &FilterConfig, cutoff: Option<i64>) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("====== TRAFFIC ANALYSIS REPORT ======\n".to_string());

    lines.push("Filter settings:".to_string());
    lines.push(time_range_line(filter));
    lines.push(format!("- Method filter: {}", filter.method.as_deref().unwrap_or("all methods")));
    lines.push(status_filter_line(filter));
    lines.push(String::new());

    lines.push("Basic statistics:".to_string());
    lines.push(format!("Total requests: {}", stats.total_requests));
    lines.push(format!("Unique IPs: {}", stats.unique_ips.len()));
    lines.push(format!(
        "Total data transferred: {} ({})",
        stats.total_data_bytes,
        human_readable_bytes(stats.total_data_bytes)
    ));
    lines.push(String::new());

    lines.push("Request distribution:".to_string());
    if stats.total_requests == 0 {
        lines.push("(no data)".to_string());
    } else {
        for (method, count) in stats.method_distribution() {
            let pct = count as f64 / stats.total_requests as f64 * 100.0;
            lines.push(format!("- {}: {:.1}%", method, pct));
        }
    }
    lines.push(String::new());

    lines.push("Performance metrics:".to_string());
    lines.push(format!("- Successful requests (2xx): {}", stats.success_count));
    lines.push(format!("- Client errors (4xx): {}", stats.client_error_count));
    lines.push(format!("- Server errors (5xx): {}", stats.server_error_count));
    lines.push(format!("- Average response size (2xx): {:.2} bytes", avg_success_size(stats)));
    lines.push(String::new());

    lines.push(format!("Top {} active IPs:", filter.top_n));
    let top_ips = stats.top_ips(filter.top_n);
    if top_ips.is_empty() {
        lines.push("(no data)".to_string());
    } else {
        for (i, (ip, count)) in top_ips.iter().enumerate() {
            lines.push(format!("{}. {}: {} requests", i + 1, ip, count));
        }
    }
    lines.push(String::new());

    lines.push(format!("Top {} requested URLs:", filter.top_urls));
    let top_urls = stats.top_urls(filter.top_urls);
    if top_urls.is_empty() {
        lines.push("(no data)".to_string());
    } else {
        for (i, (url, count)) in top_urls.iter().enumerate() {
            lines.push(format!("{}. {}: {}", i + 1, url, count));
        }
    }
    lines.push(String::new());

    lines.push("Recent activity (last 24h):".to_string());
    match cutoff {
        None => {
            lines.push("- Unique IPs: 0".to_string());
            lines.push("- Requests per hour (last 24h): []".to_string());
        }
        Some(cutoff) => {
            lines.push(format!("- Unique IPs: {}", stats.recent_ip_counts.len()));
            let hour_data: Vec<String> = (0..WINDOW_HOURS)
                .map(|h| format!("[{}: {}]", hour_label(cutoff + h as i64 * HOUR_SECS), stats.requests_per_hour[h]))
                .collect();
            lines.push(format!("- Requests per hour (last 24h): {}", hour_data.join(", ")));
        }
    }

    lines.join("\n")
}

/// Table variant of the text report: same scalar sections, but the ranked
/// lists and the hourly histogram come out as tables.
pub fn render_table(stats: &TrafficStats, filter: &FilterConfig, cutoff: Option<i64>) -> String {
    let mut out = String::new();
    out.push_str("====== TRAFFIC ANALYSIS REPORT ======\n\n");
    out.push_str("Filter settings:\n");
    out.push_str(&time_range_line(filter));
    out.push('\n');
    out.push_str(&format!("- Method filter: {}\n", filter.method.as_deref().unwrap_or("all methods")));
    out.push_str(&status_filter_line(filter));
    out.push_str("\n\n");

    out.push_str("Basic statistics:\n");
    out.push_str(&format!("Total requests: {}\n", stats.total_requests));
    out.push_str(&format!("Unique IPs: {}\n", stats.unique_ips.len()));
    out.push_str(&format!(
        "Total data transferred: {} ({})\n\n",
        stats.total_data_bytes,
        human_readable_bytes(stats.total_data_bytes)
    ));

    out.push_str("Request distribution:\n");
    if stats.total_requests == 0 {
        out.push_str("(no data)\n");
    } else {
        let rows: Vec<(String, String)> = stats
            .method_distribution()
            .into_iter()
            .map(|(m, c)| (m, format!("{:.1}%", c as f64 / stats.total_requests as f64 * 100.0)))
            .collect();
        out.push_str(&ranking_table("Method", "Share", &rows));
        out.push('\n');
    }
    out.push('\n');

    out.push_str("Performance metrics:\n");
    out.push_str(&format!("- Successful requests (2xx): {}\n", stats.success_count));
    out.push_str(&format!("- Client errors (4xx): {}\n", stats.client_error_count));
    out.push_str(&format!("- Server errors (5xx): {}\n", stats.server_error_count));
    out.push_str(&format!("- Average response size (2xx): {:.2} bytes\n\n", avg_success_size(stats)));

    out.push_str(&format!("Top {} active IPs:\n", filter.top_n));
    let ip_rows: Vec<(String, String)> = stats.top_ips(filter.top_n).into_iter().map(|(k, c)| (k, c.to_string())).collect();
    if ip_rows.is_empty() { out.push_str("(no data)\n"); } else { out.push_str(&ranking_table("IP", "Requests", &ip_rows)); out.push('\n'); }
    out.push('\n');

    out.push_str(&format!("Top {} requested URLs:\n", filter.top_urls));
    let url_rows: Vec<(String, String)> = stats.top_urls(filter.top_urls).into_iter().map(|(k, c)| (k, c.to_string())).collect();
    if url_rows.is_empty() { out.push_str("(no data)\n"); } else { out.push_str(&ranking_table("URL", "Requests", &url_rows)); out.push('\n'); }
    out.push('\n');

    out.push_str("Recent activity (last 24h):\n");
    match cutoff {
        None => {
            out.push_str("- Unique IPs: 0\n");
            out.push_str("- Requests per hour (last 24h): []");
        }
        Some(cutoff) => {
            out.push_str(&format!("- Unique IPs: {}\n", stats.recent_ip_counts.len()));
            let rows: Vec<(String, String)> = (0..WINDOW_HOURS)
                .map(|h| (hour_label(cutoff + h as i64 * HOUR_SECS), stats.requests_per_hour[h].to_string()))
                .collect();
            out.push_str(&ranking_table("Hour (UTC)", "Requests", &rows));
        }
    }
    out
}

fn ranking_table(key_header: &str, value_header: &str, rows: &[(String, String)]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![key_header, value_header]);
    for (k, v) in rows {
        table.add_row(vec![k.clone(), v.clone()]);
    }
    table.to_string()
}

/// Machine-readable snapshot of everything the text report shows, for
/// `--output json` and `--json-path`.
#[derive(Clone, Debug, Serialize)]
pub struct ReportSummary {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub method_filter: Option<String>,
    pub status_filter: Option<(i64, i64)>,
    pub cutoff: Option<i64>,
    pub total_requests: u64,
    pub unique_ips: usize,
    pub total_data_bytes: u64,
    pub total_data_human: String,
    pub success_count: u64,
    pub client_error_count: u64,
    pub server_error_count: u64,
    pub avg_success_size: f64,
    pub method_distribution: Vec<(String, u64)>,
    pub top_ips: Vec<(String, u64)>,
    pub top_urls: Vec<(String, u64)>,
    pub recent_unique_ips: usize,
    pub requests_per_hour: Vec<(String, u64)>,
}

pub fn build_summary(stats: &TrafficStats, filter: &FilterConfig, cutoff: Option<i64>) -> ReportSummary {
    let requests_per_hour = match cutoff {
        None => Vec::new(),
        Some(cutoff) => (0..WINDOW_HOURS)
            .map(|h| (hour_label(cutoff + h as i64 * HOUR_SECS), stats.requests_per_hour[h]))
            .collect(),
    };
    ReportSummary {
        start: filter.start,
        end: filter.end,
        method_filter: filter.method.clone(),
        status_filter: filter.status_range,
        cutoff,
        total_requests: stats.total_requests,
        unique_ips: stats.unique_ips.len(),
        total_data_bytes: stats.total_data_bytes,
        total_data_human: human_readable_bytes(stats.total_data_bytes),
        success_count: stats.success_count,
        client_error_count: stats.client_error_count,
        server_error_count: stats.server_error_count,
        avg_success_size: avg_success_size(stats),
        method_distribution: stats.method_distribution(),
        top_ips: stats.top_ips(filter.top_n),
        top_urls: stats.top_urls(filter.top_urls),
        recent_unique_ips: if cutoff.is_some() { stats.recent_ip_counts.len() } else { 0 },
        requests_per_hour,
    }
}

pub fn write_csv(path: &str, rep: &ReportSummary) -> Result<(), std::io::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["section", "key", "value"])?;
    wtr.write_record(["totals", "total_requests", &rep.total_requests.to_string()])?;
    wtr.write_record(["totals", "unique_ips", &rep.unique_ips.to_string()])?;
    wtr.write_record(["totals", "total_data_bytes", &rep.total_data_bytes.to_string()])?;
    wtr.write_record(["totals", "success_count", &rep.success_count.to_string()])?;
    wtr.write_record(["totals", "client_error_count", &rep.client_error_count.to_string()])?;
    wtr.write_record(["totals", "server_error_count", &rep.server_error_count.to_string()])?;
    wtr.write_record(["totals", "avg_success_size", &format!("{:.2}", rep.avg_success_size)])?;
    for (m, c) in &rep.method_distribution {
        wtr.write_record(["method", m, &c.to_string()])?;
    }
    for (ip, c) in &rep.top_ips {
        wtr.write_record(["top_ip", ip, &c.to_string()])?;
    }
    for (url, c) in &rep.top_urls {
        wtr.write_record(["top_url", url, &c.to_string()])?;
    }
    for (hour, c) in &rep.requests_per_hour {
        wtr.write_record(["hour", hour, &c.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
