// src/config.rs
//! Command-line / environment configuration.
//!
//! Every flag can also come from a `FEEDFLUX_*` variable (a local `.env` is
//! loaded first by the binary). Defaults match a stock local InfluxDB.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::config::{load_feeds_default, load_feeds_from, merge_feeds};
use crate::ingest::scheduler::SchedulerCfg;
use crate::sink::{InfluxConfig, TextPlacement};
use crate::telemetry::LogFormat;

#[derive(Debug, Clone, Parser)]
#[command(name = "feedflux", version, about = "Poll Atom/RSS feeds into InfluxDB")]
pub struct Cli {
    /// InfluxDB hostname
    #[arg(long, env = "FEEDFLUX_HOST", default_value = "localhost")]
    pub host: String,

    /// InfluxDB port
    #[arg(long, env = "FEEDFLUX_PORT", default_value_t = 8086)]
    pub port: u16,

    /// InfluxDB database, created on startup if missing
    #[arg(long, env = "FEEDFLUX_DATABASE", default_value = "rss")]
    pub database: String,

    /// InfluxDB username
    #[arg(long, env = "FEEDFLUX_USERNAME", default_value = "")]
    pub username: String,

    /// InfluxDB password
    #[arg(long, env = "FEEDFLUX_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Feeds to process (atom or rss), can pass multiple
    #[arg(long = "feed", env = "FEEDFLUX_FEEDS", value_delimiter = ',')]
    pub feeds: Vec<String>,

    /// TOML (`feeds = [..]`) or JSON array of feed URLs, appended to --feed
    #[arg(long, env = "FEEDFLUX_FEEDS_FILE")]
    pub feeds_file: Option<PathBuf>,

    /// Milliseconds to wait between cycles
    #[arg(long = "time", env = "FEEDFLUX_INTERVAL_MS", default_value_t = 60_000)]
    pub interval_ms: u64,

    /// Timeout for every feed fetch and store request
    #[arg(long, env = "FEEDFLUX_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Store the entry body as a tag (identity-compatible) or a field
    #[arg(long, env = "FEEDFLUX_TEXT_PLACEMENT", value_enum, default_value_t = TextPlacement::Tag)]
    pub text_placement: TextPlacement,

    /// Keep points in memory and log them instead of writing to InfluxDB
    #[arg(long, env = "FEEDFLUX_DRY_RUN")]
    pub dry_run: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "FEEDFLUX_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    #[arg(long, env = "FEEDFLUX_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Fully resolved settings the binary runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub influx: InfluxConfig,
    pub scheduler: SchedulerCfg,
    pub text_placement: TextPlacement,
    pub dry_run: bool,
    pub metrics_addr: Option<SocketAddr>,
    pub log_format: LogFormat,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings> {
        let from_file = match &self.feeds_file {
            Some(p) => load_feeds_from(p)?,
            None => load_feeds_default().context("loading default feed list")?,
        };
        let sources = merge_feeds([self.feeds, from_file]);
        if sources.is_empty() {
            bail!("no feeds configured: pass --feed <url> or --feeds-file <path>");
        }
        if self.interval_ms == 0 {
            bail!("--time must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("--request-timeout-secs must be greater than zero");
        }

        let timeout = Duration::from_secs(self.request_timeout_secs);
        Ok(Settings {
            influx: InfluxConfig {
                host: self.host,
                port: self.port,
                database: self.database,
                username: self.username,
                password: self.password,
                timeout,
            },
            scheduler: SchedulerCfg {
                sources,
                interval: Duration::from_millis(self.interval_ms),
            },
            text_placement: self.text_placement,
            dry_run: self.dry_run,
            metrics_addr: self.metrics_addr,
            log_format: self.log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["feedflux"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[serial_test::serial]
    #[test]
    fn defaults_match_local_influx() {
        let cli = parse(&["--feed", "https://a.test/rss"]);
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 8086);
        assert_eq!(cli.database, "rss");
        assert_eq!(cli.interval_ms, 60_000);
        assert_eq!(cli.text_placement, TextPlacement::Tag);
        assert!(!cli.dry_run);
    }

    #[serial_test::serial]
    #[test]
    fn repeated_feed_flags_keep_order() {
        let s = parse(&[
            "--feed",
            "https://b.test/rss",
            "--feed",
            "https://a.test/atom",
            "--feed",
            "https://b.test/rss",
            "--time",
            "500",
        ])
        .into_settings()
        .unwrap();
        assert_eq!(
            s.scheduler.sources,
            vec!["https://b.test/rss", "https://a.test/atom"]
        );
        assert_eq!(s.scheduler.interval, Duration::from_millis(500));
        assert_eq!(s.influx.timeout, Duration::from_secs(30));
    }

    #[serial_test::serial]
    #[test]
    fn feeds_file_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("feeds.toml");
        std::fs::write(&p, r#"feeds = ["https://c.test/feed", "https://a.test/rss"]"#).unwrap();
        let s = parse(&[
            "--feed",
            "https://a.test/rss",
            "--feeds-file",
            p.to_str().unwrap(),
        ])
        .into_settings()
        .unwrap();
        assert_eq!(
            s.scheduler.sources,
            vec!["https://a.test/rss", "https://c.test/feed"]
        );
    }

    #[serial_test::serial]
    #[test]
    fn zero_interval_is_rejected() {
        let err = parse(&["--feed", "https://a.test/rss", "--time", "0"])
            .into_settings()
            .unwrap_err();
        assert!(err.to_string().contains("--time"));
    }
}
