use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, bail};
use clap::{ArgAction, ColorChoice, CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use is_terminal::IsTerminal;
use regex::Regex;
use serde::{Deserialize, Serialize};

mod analyzer;
mod filter;
mod record;
mod report;
mod scan;

use filter::FilterConfig;

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TextFormat { Lines, Table }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Parser, Debug)]
#[command(
    name = "logpulse",
    about = "Web access-log traffic analyzer and reporter",
    long_about = "Web access-log traffic analyzer that streams a 6-field access log, filters by method/status/time, and reports volume, status classes, top clients and URLs, and an hourly histogram over the last 24 hours of observed traffic.",
    after_long_help = "Examples:\n  logpulse access.log\n  logpulse access.log --method get --top 10\n  logpulse access.log --status 400-499 --start 1700000000 --end 1700086400\n  logpulse access.log --url-pattern '^/api/' --output json\n  logpulse access.log --text-format table --csv-path report.csv",
    color = ColorChoice::Auto
)]
struct Args {
    /// Path to the access log file
    #[arg(required_unless_present = "completions")]
    logfile: Option<PathBuf>,
    /// Filter by HTTP method (case-insensitive)
    #[arg(long, short = 'm')]
    method: Option<String>,
    /// Filter by status code or inclusive range (e.g. 404 or 400-499)
    #[arg(long, short = 's')]
    status: Option<String>,
    /// Start timestamp (unix seconds, inclusive)
    #[arg(long)]
    start: Option<i64>,
    /// End timestamp (unix seconds, inclusive)
    #[arg(long)]
    end: Option<i64>,
    /// Top N active IPs (default 3)
    #[arg(long, short = 'n', default_value_t = 3)]
    top: usize,
    /// Top N requested URLs (default 5)
    #[arg(long, default_value_t = 5)]
    top_urls: usize,
    /// Filter by URL regex
    #[arg(long, short = 'u')]
    url_pattern: Option<String>,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long, value_enum, default_value = "lines")]
    text_format: TextFormat,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long)]
    config: Option<String>,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long, default_value_t = false)]
    progress: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            logfile: None,
            method: None,
            status: None,
            start: None,
            end: None,
            top: 3,
            top_urls: 5,
            url_pattern: None,
            output: OutputFmt::Text,
            text_format: TextFormat::Lines,
            json_path: None,
            csv_path: None,
            config: None,
            completions: None,
            log_level: None,
            verbose: 0,
            quiet: false,
            no_color: false,
            force_color: false,
            progress: false,
        }
    }
}

#[derive(Deserialize)]
struct AppConfig {
    method: Option<String>,
    status: Option<String>,
    start: Option<i64>,
    end: Option<i64>,
    top: Option<usize>,
    top_urls: Option<usize>,
    url_pattern: Option<String>,
    output: Option<OutputFmt>,
    text_format: Option<TextFormat>,
    json_path: Option<String>,
    csv_path: Option<String>,
    force_color: Option<bool>,
    progress: Option<bool>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        clap_complete::generate(sh, &mut cmd, "logpulse", &mut std::io::stdout());
        return;
    }
    if let Some(p) = args.config.as_ref()
        && let Ok(s) = std::fs::read_to_string(p)
        && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    else {
        let def = "LogPulse.toml";
        if let Ok(s) = std::fs::read_to_string(def)
            && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    }
    init_logging(&args);
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);
    if let Err(e) = run(&args) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let filter = build_filter(args)?;
    let path = args.logfile.as_ref().context("missing logfile argument")?;
    if !path.is_file() { bail!("file not found: {}", path.display()); }
    let max_ts = scan::find_max_timestamp(path, &filter)?;
    let (stats, cutoff) = match max_ts {
        Some(max_ts) => {
            let cutoff = max_ts - analyzer::WINDOW_SECS;
            (scan::aggregate(path, &filter, cutoff, args.progress)?, Some(cutoff))
        }
        None => {
            log::warn!("no valid records matched the filters");
            (analyzer::TrafficStats::new(), None)
        }
    };
    let summary = report::build_summary(&stats, &filter, cutoff);
    match args.output {
        OutputFmt::Text => {
            let text = match args.text_format {
                TextFormat::Lines => report::render_text(&stats, &filter, cutoff),
                TextFormat::Table => report::render_table(&stats, &filter, cutoff),
            };
            println!("{}", text);
        }
        OutputFmt::Json => match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{}", s),
            Err(e) => log::error!("JSON encode failed: {}", e),
        },
    }
    if let Some(p) = args.json_path.as_ref() {
        match serde_json::to_vec_pretty(&summary) {
            Ok(bytes) => match std::fs::write(p, bytes) {
                Ok(_) => { if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); } }
                Err(e) => log::error!("JSON write failed for {}: {}", p, e),
            },
            Err(e) => log::error!("JSON encode failed: {}", e),
        }
    }
    if let Some(p) = args.csv_path.as_ref() {
        match report::write_csv(p, &summary) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("CSV written: {}", p), "1;36")); } }
            Err(e) => log::error!("CSV write failed for {}: {}", p, e),
        }
    }
    Ok(())
}

/// Validates the raw CLI values and builds the immutable filter shared by
/// both passes. Every failure here exits before any processing starts.
fn build_filter(args: &Args) -> anyhow::Result<FilterConfig> {
    let method = match args.method.as_deref() {
        Some(m) => Some(filter::normalize_method(m)?),
        None => None,
    };
    let status_range = match args.status.as_deref() {
        Some(s) => Some(filter::parse_status_filter(s)?),
        None => None,
    };
    if let (Some(s), Some(e)) = (args.start, args.end) && s > e { bail!("--start must be <= --end"); }
    if args.top == 0 { bail!("--top must be positive"); }
    if args.top_urls == 0 { bail!("--top-urls must be positive"); }
    let url_pattern = match args.url_pattern.as_deref() {
        Some(p) => Some(Regex::new(p).with_context(|| format!("invalid --url-pattern: {}", p))?),
        None => None,
    };
    Ok(FilterConfig {
        method,
        status_range,
        start: args.start,
        end: args.end,
        url_pattern,
        top_n: args.top,
        top_urls: args.top_urls,
    })
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.method.is_none() && let Some(v) = cfg.method { args.method = Some(v); }
    if args.status.is_none() && let Some(v) = cfg.status { args.status = Some(v); }
    if args.start.is_none() && let Some(v) = cfg.start { args.start = Some(v); }
    if args.end.is_none() && let Some(v) = cfg.end { args.end = Some(v); }
    if args.top == 3 && let Some(v) = cfg.top { args.top = v; }
    if args.top_urls == 5 && let Some(v) = cfg.top_urls { args.top_urls = v; }
    if args.url_pattern.is_none() && let Some(v) = cfg.url_pattern { args.url_pattern = Some(v); }
    if let Some(v) = cfg.output { args.output = v; }
    if let Some(v) = cfg.text_format { args.text_format = v; }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if let Some(v) = cfg.force_color { args.force_color = v; }
    if let Some(v) = cfg.progress { args.progress = v; }
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if args.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if let Some(lvl) = args.log_level {
        let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
        builder.filter_level(f);
    } else if args.verbose > 0 {
        let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    builder.init();
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}


#[cfg(test)]
mod tests_config {
    use super::*;

    #[test]
    fn config_fills_gaps_but_cli_wins() {
        let mut args = Args { method: Some("GET".to_string()), ..Default::default() };
        let cfg: AppConfig =
            toml::from_str("method = \"POST\"\nstatus = \"400-499\"\ntop = 7\nprogress = true\n").unwrap();
        apply_config(&mut args, cfg);
        assert_eq!(args.method.as_deref(), Some("GET"));
        assert_eq!(args.status.as_deref(), Some("400-499"));
        assert_eq!(args.top, 7);
        assert!(args.progress);
    }

    #[test]
    fn config_enums_use_cli_spellings() {
        let mut args = Args::default();
        let cfg: AppConfig = toml::from_str("output = \"json\"\ntext_format = \"table\"\n").unwrap();
        apply_config(&mut args, cfg);
        assert!(matches!(args.output, OutputFmt::Json));
        assert!(matches!(args.text_format, TextFormat::Table));
    }

    #[test]
    fn config_respects_explicit_top() {
        let mut args = Args { top: 10, ..Default::default() };
        let cfg: AppConfig = toml::from_str("top = 7\n").unwrap();
        apply_config(&mut args, cfg);
        assert_eq!(args.top, 10);
    }
}
