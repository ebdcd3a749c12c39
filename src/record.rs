use serde::{Deserialize, Serialize};

/// One parsed access-log line:
/// `<unix_timestamp> <client_ip> <method> <url> <status> <size>`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: i64,
    pub client_ip: String,
    pub method: String,
    pub url: String,
    pub status: i64,
    pub response_size: u64,
}

/// Parses one raw line into a record, or None when the line is malformed
/// (wrong field count or a non-integer numeric field). The caller decides
/// whether a malformed line deserves a warning. Status is not range-checked
/// here; out-of-range values simply never land in a 2xx/4xx/5xx bucket.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 6 { return None; }
    let timestamp = parts[0].parse::<i64>().ok()?;
    let status = parts[4].parse::<i64>().ok()?;
    let response_size = parts[5].parse::<u64>().ok()?;
    Some(LogRecord {
        timestamp,
        client_ip: parts[1].to_string(),
        method: parts[2].to_uppercase(),
        url: parts[3].to_string(),
        status,
        response_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_line() {
        let rec = parse_line("1700000000 10.0.0.1 GET /index.html 200 512").unwrap();
        assert_eq!(rec.timestamp, 1700000000);
        assert_eq!(rec.client_ip, "10.0.0.1");
        assert_eq!(rec.method, "GET");
        assert_eq!(rec.url, "/index.html");
        assert_eq!(rec.status, 200);
        assert_eq!(rec.response_size, 512);
    }

    #[test]
    fn parse_uppercases_method() {
        let rec = parse_line("1700000000 10.0.0.1 get /a 200 0").unwrap();
        assert_eq!(rec.method, "GET");
        let rec = parse_line("1700000000 10.0.0.1 pOsT /a 201 0").unwrap();
        assert_eq!(rec.method, "POST");
    }

    #[test]
    fn parse_tolerates_whitespace_runs() {
        let rec = parse_line("  1000\t10.0.0.1   GET\t/a  200   500 \n").unwrap();
        assert_eq!(rec.timestamp, 1000);
        assert_eq!(rec.response_size, 500);
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        assert!(parse_line("1000 10.0.0.1 GET /a 200").is_none());
        assert!(parse_line("1000 10.0.0.1 GET /a 200 500 extra").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn parse_rejects_non_integer_fields() {
        assert!(parse_line("soon 10.0.0.1 GET /a 200 500").is_none());
        assert!(parse_line("1000 10.0.0.1 GET /a OK 500").is_none());
        assert!(parse_line("1000 10.0.0.1 GET /a 200 lots").is_none());
        // sizes are non-negative by contract
        assert!(parse_line("1000 10.0.0.1 GET /a 200 -5").is_none());
    }

    #[test]
    fn parse_passes_garbage_status_through() {
        let rec = parse_line("1000 10.0.0.1 GET /a 9999 0").unwrap();
        assert_eq!(rec.status, 9999);
        let rec = parse_line("1000 10.0.0.1 GET /a -1 0").unwrap();
        assert_eq!(rec.status, -1);
    }

    #[test]
    fn parse_accepts_negative_and_zero_timestamps() {
        assert_eq!(parse_line("0 10.0.0.1 GET /a 200 0").unwrap().timestamp, 0);
        assert_eq!(parse_line("-60 10.0.0.1 GET /a 200 0").unwrap().timestamp, -60);
    }
}
